use std::collections::HashMap;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use practica_core::catalog::BankSnapshot;
use practica_core::parser::parse_bank_str;
use practica_core::planner::{
    apportion, apportion_with_capacity, plan_allocation, PlanRequest, ShortfallPolicy,
};
use practica_core::sampler::{sample, ExclusionPolicy};

fn bench_apportion(c: &mut Criterion) {
    let mut group = c.benchmark_group("apportion");

    let few: Vec<f64> = vec![0.5, 0.3, 0.2];
    let many: Vec<f64> = (1..=60).map(|i| i as f64).collect();
    let capacities: Vec<Option<usize>> = (0..60)
        .map(|i| if i % 3 == 0 { Some(i / 3) } else { None })
        .collect();

    group.bench_function("3_topics", |b| {
        b.iter(|| apportion(black_box(&few), black_box(100)))
    });

    group.bench_function("60_topics", |b| {
        b.iter(|| apportion(black_box(&many), black_box(100)))
    });

    group.bench_function("60_topics_capped", |b| {
        b.iter(|| apportion_with_capacity(black_box(&many), black_box(&capacities), black_box(100)))
    });

    group.finish();
}

fn bench_plan_and_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_and_sample");

    let snapshot = generate_snapshot(40, 50);
    let request = PlanRequest {
        position_id: "bench".into(),
        total: 100,
        restriction: None,
        policy: ShortfallPolicy::BestEffort,
    };
    let plan = plan_allocation(&snapshot, &request).unwrap();
    let history = HashMap::new();

    group.bench_function("plan_40_topics", |b| {
        b.iter(|| plan_allocation(black_box(&snapshot), black_box(&request)))
    });

    group.bench_function("sample_100_of_2000", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| {
            sample(
                black_box(&snapshot),
                black_box(&plan),
                &history,
                ExclusionPolicy::PreferUnseen,
                &mut rng,
            )
        })
    });

    group.finish();
}

/// One law per topic, `per_topic` approved questions each.
fn generate_snapshot(topics: usize, per_topic: usize) -> BankSnapshot {
    let mut s = String::new();
    for t in 0..topics {
        let articles: Vec<String> = (1..=per_topic).map(|a| format!("\"{a}\"")).collect();
        s.push_str(&format!(
            "[[laws]]\nid = \"L{t}\"\ntitle = \"Law {t}\"\narticles = [{}]\n\n",
            articles.join(", ")
        ));
    }
    s.push_str("[[positions]]\nid = \"bench\"\nname = \"Bench\"\n\n");
    s.push_str("[[positions.blocks]]\nid = \"all\"\nname = \"All\"\n\n");
    for t in 0..topics {
        s.push_str(&format!(
            "[[positions.blocks.topics]]\nid = \"t{t}\"\nname = \"Topic {t}\"\nweight = {}.0\nscopes = [{{ law = \"L{t}\" }}]\n\n",
            1 + t % 5
        ));
    }
    for t in 0..topics {
        for a in 1..=per_topic {
            s.push_str(&format!(
                "[[questions]]\nid = \"q-{t}-{a}\"\nlaw = \"L{t}\"\narticle = \"{a}\"\ntext = \"Question {a}\"\noptions = [\"a\", \"b\", \"c\", \"d\"]\ncorrect = \"a\"\nreview_status = \"perfect\"\n\n"
            ));
        }
    }
    let bank = parse_bank_str(&s, Path::new("bench.toml")).unwrap();
    bank.snapshot("bench").unwrap()
}

criterion_group!(benches, bench_apportion, bench_plan_and_sample);
criterion_main!(benches);
