//! Criterion benchmarks for the chat frame codec and flag decoder.
//!
//! Run with:
//! ```bash
//! cargo bench --package soop-chat-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use soop_chat_core::protocol::codec::{decode_frame, encode_chat};
use soop_chat_core::protocol::flags::{StatusFlags, UserFlags};

fn chat_frame() -> String {
    let fields = ["안녕하세요 반갑습니다", "viewer1", "0", "0", "0", "시청자", "5|16384", "12"];
    let mut raw = String::from("\u{1b}\t000500000000");
    for field in fields {
        raw.push('\u{0c}');
        raw.push_str(field);
    }
    raw.push('\u{0c}');
    raw
}

fn bench_decode_frame(c: &mut Criterion) {
    let raw = chat_frame();
    c.bench_function("decode_frame/chat", |b| {
        b.iter(|| decode_frame(black_box(&raw)))
    });
}

fn bench_encode_chat(c: &mut Criterion) {
    c.bench_function("encode_chat/korean", |b| {
        b.iter(|| encode_chat(black_box("안녕하세요 반갑습니다")))
    });
}

fn bench_flags(c: &mut Criterion) {
    c.bench_function("flags/user", |b| {
        b.iter(|| UserFlags::from_decimal(black_box("2684354565")))
    });
    c.bench_function("flags/status", |b| {
        b.iter(|| StatusFlags::from_decimal(black_box("16384")))
    });
}

criterion_group!(benches, bench_decode_frame, bench_encode_chat, bench_flags);
criterion_main!(benches);
