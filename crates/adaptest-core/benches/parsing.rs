use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::parser::{parse_item_bank_str, validate_item_bank};

fn make_bank(items: usize) -> String {
    let mut s = String::from(
        "[item_bank]\nid = \"bench\"\nname = \"Bench bank\"\ndescription = \"generated\"\n",
    );
    let categories = ["Spelling", "Grammar", "Pronunciation", "Syntax"];
    for i in 0..items {
        let b = -2.5 + 5.0 * i as f64 / items as f64;
        s.push_str(&format!(
            "\n[[items]]\nid = \"item-{i}\"\ncategory = \"{}\"\na = 1.1\nb = {b:.3}\nc = 0.2\nprompt = \"Question {i}\"\n",
            categories[i % categories.len()]
        ));
    }
    s
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_item_bank");
    let source = PathBuf::from("bench.toml");

    for n in [10, 100, 1000] {
        let content = make_bank(n);
        group.bench_function(format!("items/{n}"), |b| {
            b.iter(|| parse_item_bank_str(black_box(&content), &source))
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_item_bank");
    let source = PathBuf::from("bench.toml");

    for n in [100, 1000] {
        let catalog = match parse_item_bank_str(&make_bank(n), &source) {
            Ok(catalog) => catalog,
            Err(e) => panic!("bench bank failed to parse: {e}"),
        };
        group.bench_function(format!("items/{n}"), |b| {
            b.iter(|| validate_item_bank(black_box(&catalog)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_validate);
criterion_main!(benches);
