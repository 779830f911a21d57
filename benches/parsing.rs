use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use imapdump::model::MessageId;

fn fixture_bytes() -> Vec<u8> {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("with_attachments.eml");
    std::fs::read(fixture_path).unwrap()
}

fn bench_parse_message(c: &mut Criterion) {
    let raw = fixture_bytes();

    c.bench_function("parse_multipart_message", |b| {
        b.iter(|| imapdump::parser::parse_message(&raw).unwrap().parts.len())
    });
}

fn bench_sanitize(c: &mut Criterion) {
    let subject = "Re: [project/alpha] Weekly report: <draft> \"final\" *v2*?".repeat(8);

    c.bench_function("sanitize_long_subject", |b| {
        b.iter(|| imapdump::export::sanitize::sanitize(&subject))
    });
}

fn bench_persist(c: &mut Criterion) {
    let raw = fixture_bytes();
    let tmp = tempfile::tempdir().unwrap();
    let emails = tmp.path().join("emails");
    let attachments = tmp.path().join("attachments");
    std::fs::create_dir_all(&emails).unwrap();

    c.bench_function("persist_with_attachments", |b| {
        b.iter(|| {
            imapdump::export::eml::persist(MessageId(1), &raw, &emails, &attachments)
                .unwrap()
                .attachments
                .len()
        })
    });
}

criterion_group!(benches, bench_parse_message, bench_sanitize, bench_persist);
criterion_main!(benches);
