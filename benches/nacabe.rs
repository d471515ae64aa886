extern crate nacabe;
extern crate criterion;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nacabe::{
    schemes::bsw,
    utils::{aes::{encrypt_aead, generate_key}, policy::pest::PolicyLanguage},
};

fn attributes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("attr{}", i)).collect()
}

fn and_policy(n: usize) -> String {
    attributes(n).join(" and ")
}

fn criterion_bsw_setup(c: &mut Criterion) {
    let mut group = c.benchmark_group("setup");
    group.bench_function("BSW", |b| b.iter(bsw::setup));
    group.finish();
}

fn criterion_bsw_keygen(c: &mut Criterion) {
    let (pk, msk) = bsw::setup();
    let mut group = c.benchmark_group("keygen");
    for n in [1_usize, 4, 16] {
        let attrs = attributes(n);
        group.bench_with_input(BenchmarkId::new("BSW", n), &attrs, |b, attrs| {
            b.iter(|| bsw::keygen(&pk, &msk, attrs))
        });
    }
    group.finish();
}

fn criterion_wrap_content_key(c: &mut Criterion) {
    let (pk, msk) = bsw::setup();
    let content_key = generate_key();
    let mut group = c.benchmark_group("wrap");
    for n in [1_usize, 4, 16] {
        let policy = and_policy(n);
        let sk = bsw::keygen(&pk, &msk, &attributes(n)).unwrap();
        let ct = bsw::encrypt(&pk, &policy, PolicyLanguage::HumanPolicy, &content_key).unwrap();
        group.bench_with_input(BenchmarkId::new("encrypt", n), &policy, |b, policy| {
            b.iter(|| bsw::encrypt(&pk, policy, PolicyLanguage::HumanPolicy, &content_key))
        });
        group.bench_with_input(BenchmarkId::new("decrypt", n), &ct, |b, ct| {
            b.iter(|| bsw::decrypt(&sk, ct))
        });
    }
    group.finish();
}

fn criterion_content_encryption(c: &mut Criterion) {
    let key = generate_key();
    let plaintext = vec![1u8; 1 << 16];
    let mut group = c.benchmark_group("content");
    group.throughput(Throughput::Bytes(plaintext.len() as u64));
    group.bench_function("aes-256-gcm", |b| b.iter(|| encrypt_aead(&key, &plaintext, b"/producer/data")));
    group.finish();
}

criterion_group!(benches,
    criterion_bsw_setup,
    criterion_bsw_keygen,
    criterion_wrap_content_key,
    criterion_content_encryption,
);

criterion_main!(benches);
