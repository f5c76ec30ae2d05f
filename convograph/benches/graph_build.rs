use criterion::{black_box, criterion_group, criterion_main, Criterion};

use convograph::builder::{ConversationInput, GraphModelBuilder};
use convograph::identity;
use convograph::transcript::Segment;

fn conversation(segments: usize) -> ConversationInput {
    let lines = [
        "Let's review the budget for the marketing campaign",
        "Send the invoice to billing@example.com before Friday",
        "The meeting with Acme Corp moved to 2024-03-15",
        "Call me at 555-111-2222 if the deployment fails",
    ];
    ConversationInput {
        conversation_id: "bench".to_string(),
        audio_file_id: "bench".to_string(),
        language: "en".to_string(),
        duration: None,
        segments: (0..segments)
            .map(|i| {
                let start = i as f64 * 4.0;
                Segment::new(
                    start,
                    start + 3.5,
                    lines[i % lines.len()],
                    if i % 3 == 0 { "0" } else { "1" },
                )
            })
            .collect(),
    }
}

fn identity_benchmarks(c: &mut Criterion) {
    c.bench_function("entity_id", |b| {
        b.iter(|| identity::entity_id(black_box("EMAIL"), black_box("  Billing@Example.com ")))
    });
    c.bench_function("topic_id", |b| {
        b.iter(|| identity::topic_id(black_box("Project Management")))
    });
}

fn build_benchmarks(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let builder = GraphModelBuilder::default();

    for size in [10usize, 200] {
        let input = conversation(size);
        c.bench_function(&format!("build_model_{size}_segments"), |b| {
            b.to_async(&runtime)
                .iter(|| async { builder.build(black_box(&input)).await })
        });
    }
}

criterion_group!(benches, identity_benchmarks, build_benchmarks);
criterion_main!(benches);
