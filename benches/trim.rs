// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for history trimming and message handling.
//!
//! These benchmark the hot path of every turn without network calls:
//! - Trimming histories of various sizes against a tight budget
//! - Wire-shape conversion
//! - Message normalization
//!
//! Run with: `cargo bench --bench trim`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use async_trait::async_trait;
use parley::error::ProviderError;
use parley::message::{self, WireShape};
use parley::session::{trim_history, TokenCounter};
use parley::types::{ChatMessage, MessageContent};

/// Counter with a fixed per-message cost, no I/O.
struct FlatCounter;

#[async_trait]
impl TokenCounter for FlatCounter {
    async fn count(&self, messages: &[ChatMessage]) -> Result<u32, ProviderError> {
        Ok(messages.len() as u32 * 30)
    }
}

fn history(turns: usize) -> Vec<ChatMessage> {
    (0..turns)
        .flat_map(|i| {
            [
                ChatMessage::user(format!("question number {i}")),
                ChatMessage::assistant(format!("answer number {i}")),
            ]
        })
        .collect()
}

/// Benchmark trimming against a budget that forces drops.
fn bench_trim(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("trim_history");

    for turns in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(turns as u64));
        group.bench_with_input(BenchmarkId::from_parameter(turns), &turns, |b, &turns| {
            b.to_async(&runtime).iter(|| async move {
                let outcome = trim_history(
                    history(turns),
                    ChatMessage::user("one more question"),
                    300,
                    &FlatCounter,
                )
                .await;
                black_box(outcome)
            });
        });
    }

    group.finish();
}

/// Benchmark wire conversion for both shapes.
fn bench_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_wire");
    let messages = history(50);

    group.bench_function("flat_text", |b| {
        b.iter(|| black_box(message::to_wire(WireShape::FlatText, &messages)));
    });

    group.bench_function("rich_parts", |b| {
        b.iter(|| black_box(message::to_wire(WireShape::RichParts, &messages)));
    });

    group.finish();
}

/// Benchmark normalization of inbound text.
fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_text", |b| {
        b.iter(|| {
            black_box(message::normalize(
                "user",
                MessageContent::Text("  a message with some whitespace to trim  ".to_string()),
            ))
        });
    });
}

criterion_group!(benches, bench_trim, bench_wire, bench_normalize);
criterion_main!(benches);
