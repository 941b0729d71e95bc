use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::path::Path;

use mailsift::parser::Parser;

fn load(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_parse_plain(c: &mut Criterion) {
    let raw = load("text_plain_latin1.eml");
    let parser = Parser::default();

    c.bench_function("parse_text_plain_latin1", |b| {
        b.iter(|| parser.parse(black_box(&raw)).unwrap())
    });
}

fn bench_parse_alternative(c: &mut Criterion) {
    let raw = load("multipart_alternative_nested.eml");
    let parser = Parser::default();

    c.bench_function("parse_multipart_alternative_nested", |b| {
        b.iter(|| parser.parse(black_box(&raw)).unwrap())
    });
}

fn bench_parse_attachments(c: &mut Criterion) {
    let raw = load("text_html_image_inline.eml");
    let parser = Parser::default();

    c.bench_function("parse_html_with_inline_image", |b| {
        b.iter(|| parser.parse(black_box(&raw)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parse_plain,
    bench_parse_alternative,
    bench_parse_attachments
);
criterion_main!(benches);
