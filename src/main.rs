use std::error::Error;

use adstract::{AdRequestConfiguration, Adstract, AdstractConfig};
use tracing_subscriber::EnvFilter;

const DEMO_PROMPT: &str = "Recommend a lightweight tent for a two-night hike";
const DEMO_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36";
const DEMO_FORWARDED_FOR: &str = "203.0.113.7";

/// Usage: `adstract [config.yaml] [prompt]`
///
/// Reads the API key from the config file or `ADSTRACT_API_KEY`. Set
/// `RUST_LOG=adstract=debug` to see request and acknowledgment events.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => AdstractConfig::from_file(path)?,
        None => AdstractConfig::default(),
    };
    let prompt = args.next().unwrap_or_else(|| DEMO_PROMPT.to_string());

    let client = Adstract::new(config)?;
    let context = AdRequestConfiguration::for_session(
        format!("demo-{}", std::process::id()),
        DEMO_USER_AGENT,
        DEMO_FORWARDED_FOR,
    );

    let result = client.request_ad_or_default_async(&prompt, &context).await;
    match result.error() {
        Some(err) => println!("fallback ({}): {err}", err.code()),
        None => println!("enhanced prompt:\n{}", result.prompt()),
    }

    client.close();
    Ok(())
}
