use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use practica_core::parser::{parse_bank_str, validate_bank};

fn bench_bank_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bank_parsing");

    let small = generate_bank_toml(20);
    let medium = generate_bank_toml(500);
    let large = generate_bank_toml(5000);

    group.bench_function("20_questions", |b| {
        b.iter(|| parse_bank_str(black_box(&small), black_box(Path::new("bench.toml"))))
    });

    group.bench_function("500_questions", |b| {
        b.iter(|| parse_bank_str(black_box(&medium), black_box(Path::new("bench.toml"))))
    });

    group.bench_function("5000_questions", |b| {
        b.iter(|| parse_bank_str(black_box(&large), black_box(Path::new("bench.toml"))))
    });

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let bank = parse_bank_str(&generate_bank_toml(5000), Path::new("bench.toml")).unwrap();
    c.bench_function("validate_5000_questions", |b| {
        b.iter(|| validate_bank(black_box(&bank)))
    });
}

fn generate_bank_toml(n: usize) -> String {
    let articles: Vec<String> = (1..=100).map(|a| format!("\"{a}\"")).collect();
    let mut s = format!(
        r#"[[laws]]
id = "CE"
title = "Constitución Española"
articles = [{}]

[[positions]]
id = "bench"
name = "Bench"

[[positions.blocks]]
id = "general"
name = "General"

[[positions.blocks.topics]]
id = "low"
name = "Articles 1-50"
scopes = [{{ law = "CE", articles = [{}] }}]

[[positions.blocks.topics]]
id = "all"
name = "Whole law"
scopes = [{{ law = "CE" }}]
"#,
        articles.join(", "),
        articles[..50].join(", ")
    );
    for i in 0..n {
        s.push_str(&format!(
            r#"
[[questions]]
id = "q{i}"
law = "CE"
article = "{}"
text = "Question number {i}?"
options = ["one", "two", "three", "four"]
correct = "b"
explanation = "See the article."
review_status = "perfect"
"#,
            i % 100 + 1
        ));
    }
    s
}

criterion_group!(benches, bench_bank_parsing, bench_validation);
criterion_main!(benches);
