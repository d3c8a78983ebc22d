// benches/normalize.rs
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

use housing_scrape::csv::to_export_string;
use housing_scrape::dataset::Missingness;
use housing_scrape::normalize::Normalizer;

fn listing(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "houseId": format!("H{i:06}"),
                "address": format!("Street {i}, building {}", i % 17),
                "stats": {"floors": i % 25, "year": 1900 + i % 120, "share": (i % 100) as f64 / 100.0},
                "management": {"inn": format!("77{i:08}"), "name": null},
                "tags": ["a", "b"],
            })
        })
        .collect()
}

fn details(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"guid": format!("H{i:06}"), "management": {"name": "MC"}, "wallMaterial": "panel"}))
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let items = listing(10_000);
    let houses = Normalizer::houses();

    c.bench_function("normalize_batch_10k", |b| {
        b.iter(|| {
            let ds = houses.normalize_batch(black_box(&items)).unwrap();
            black_box(ds.len())
        })
    });

    let base = houses.normalize_batch(&items).unwrap();
    let detail = Normalizer::house_detail("guid").with_key_column(base.key_column());
    let records: Vec<_> = details(10_000).iter().map(|d| detail.normalize(d).unwrap()).collect();

    c.bench_function("combine_first_10k", |b| {
        b.iter(|| {
            let mut ds = base.clone();
            for rec in &records {
                ds.combine_first(&rec.key, rec, Missingness::NullOnly).unwrap();
            }
            black_box(ds.columns().len())
        })
    });

    c.bench_function("export_csv_10k", |b| {
        b.iter(|| black_box(to_export_string(black_box(&base), true, ',').len()))
    });
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
