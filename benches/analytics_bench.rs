use adstract::{
    analyze, build_ad_ack, checksum_text, AdMarkers, AdResponse, AepiData, Conversation, EnhancementResult,
    WrappingType,
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

const FILLER: &[&str] = &[
    "choose", "a", "tent", "that", "packs", "small", "and", "handles", "wind", "well", "for",
    "most", "three", "season", "trips",
];

const MARKERS: AdMarkers<'static> = AdMarkers {
    tracking_identifier: "trk-bench",
    tracking_url: "https://t.adstract.ai/c/bench",
    sponsored_label: "Sponsored",
};

/// Model output of roughly `words` words with one ad block a third of the way in.
fn llm_output(words: usize, wrapping: WrappingType) -> String {
    let mut out = String::new();
    for i in 0..words {
        if i == words / 3 {
            match wrapping {
                WrappingType::Xml => out.push_str(
                    "<ADS>Sponsored trk-bench Trail Tent https://t.adstract.ai/c/bench</ADS> ",
                ),
                WrappingType::Plain => out.push_str(
                    "Sponsored trk-bench Trail Tent https://t.adstract.ai/c/bench ˼ ",
                ),
            }
        }
        out.push_str(FILLER[i % FILLER.len()]);
        out.push(' ');
    }
    out
}

fn bench_analyze_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");

    for words in [100, 1_000, 10_000] {
        for wrapping in [WrappingType::Xml, WrappingType::Plain] {
            let text = llm_output(words, wrapping);
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_function(format!("{}_{words}_words", wrapping.as_str()), |b| {
                b.iter(|| {
                    analyze(black_box(&MARKERS), black_box(&text), wrapping)
                        .expect("analysis should succeed")
                });
            });
        }
    }

    group.finish();
}

fn bench_build_ack(c: &mut Criterion) {
    let response = AdResponse {
        ad_response_id: Some("resp-bench".into()),
        success: Some(true),
        execution_time_ms: Some(240.0),
        aepi: Some(AepiData {
            status: "ok".into(),
            aepi_text: "enhanced prompt for the benchmark".into(),
            checksum: checksum_text("enhanced prompt for the benchmark"),
            size_bytes: 33,
            extra: Default::default(),
        }),
        tracking_url: Some(MARKERS.tracking_url.into()),
        tracking_identifier: Some(MARKERS.tracking_identifier.into()),
        sponsored_label: Some(MARKERS.sponsored_label.into()),
        ..AdResponse::default()
    };
    let result = EnhancementResult::enhanced(
        "enhanced prompt for the benchmark".into(),
        Conversation::from_session_at("bench-session", 1_700_000_000_000),
        response,
    );
    let text = llm_output(1_000, WrappingType::Xml);

    c.bench_function("build_ad_ack_1000_words", |b| {
        b.iter(|| {
            build_ad_ack(black_box(&result), black_box(&text), WrappingType::Xml)
                .expect("ack should build")
        });
    });
}

criterion_group!(benches, bench_analyze_sizes, bench_build_ack);
criterion_main!(benches);
