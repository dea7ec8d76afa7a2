#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fluentxml::nodes::Fetcher;
use fluentxml::{FetchOptions, NodeId, Nodes};
use std::fmt::Write;

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a catalog with `sections` sections of 20 records each.
fn make_catalog(sections: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog>\n");
    for s in 0..sections {
        let _ = writeln!(xml, "  <section id=\"s{s}\">");
        for r in 0..20 {
            let _ = writeln!(
                xml,
                "    <record id=\"{s}-{r}\"><name>Record {r}</name><value>{}</value></record>",
                r * 7
            );
        }
        xml.push_str("  </section>\n");
    }
    xml.push_str("</catalog>\n");
    xml
}

fn load(sections: usize) -> Nodes {
    Nodes::load(&make_catalog(sections), "text/xml").expect("catalog should parse")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_fetch_relative(c: &mut Criterion) {
    let doc = load(50);
    let sections = doc.find("/catalog/section").expect("sections");
    c.bench_function("fetch_relative", |b| {
        b.iter(|| {
            Fetcher::new(black_box(&sections))
                .fetch("record/name", None, None, FetchOptions::default().unique())
                .expect("fetch")
        });
    });
}

fn bench_fetch_filtered(c: &mut Criterion) {
    let doc = load(50);
    let sections = doc.find("/catalog/section").expect("sections");
    let even = |_: &fluentxml::Node, index: usize| index % 2 == 0;
    c.bench_function("fetch_filtered_reverse", |b| {
        b.iter(|| {
            Fetcher::new(black_box(&sections))
                .fetch(
                    "record",
                    Some(&even),
                    None,
                    FetchOptions::default().reverse().unique(),
                )
                .expect("fetch")
        });
    });
}

fn bench_unique(c: &mut Criterion) {
    let doc = load(20);
    let records = doc.find("//record").expect("records");
    let mut scrambled: Vec<NodeId> = records.ids().iter().rev().copied().collect();
    scrambled.extend_from_slice(records.ids());
    c.bench_function("unique_reversed_duplicates", |b| {
        b.iter(|| doc.unique(black_box(&scrambled)).expect("unique"));
    });
}

fn bench_find_and_append(c: &mut Criterion) {
    c.bench_function("find_and_append", |b| {
        b.iter(|| {
            let doc = load(10);
            doc.find("//record")
                .expect("records")
                .append("<flag/>")
                .expect("append")
        });
    });
}

criterion_group!(
    benches,
    bench_fetch_relative,
    bench_fetch_filtered,
    bench_unique,
    bench_find_and_append
);
criterion_main!(benches);
