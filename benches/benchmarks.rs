use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use tagstore::*;

fn setup_registry() -> Arc<TagTypeRegistry> {
    let registry = TagTypeRegistry::new(Config::default())
        .with_tagtype(TagTypeBuilder::extent("WORD", "W"))
        .unwrap()
        .with_tagtype(TagTypeBuilder::extent("NOTE", "N").with_nonconsuming(true))
        .unwrap()
        .with_tagtype(
            TagTypeBuilder::link("NEXT", "L")
                .with_argument("from")
                .with_argument("to"),
        )
        .unwrap();
    Arc::new(registry)
}

/// Generates a text of pseudo-words of varying length
fn generate_text(count: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        if i > 0 {
            text.push(if i % 12 == 0 { '\n' } else { ' ' });
        }
        for j in 0..(i % 7 + 2) {
            text.push((b'a' + ((i + j) % 26) as u8) as char);
        }
    }
    text
}

/// Returns the offsets of all whitespace-delimited words in the text
fn words(text: &str) -> Vec<(usize, usize)> {
    let mut words = Vec::new();
    let mut begin = None;
    for (i, c) in text.chars().enumerate() {
        match (c.is_whitespace(), begin) {
            (true, Some(b)) => {
                words.push((b, i));
                begin = None;
            }
            (false, None) => begin = Some(i),
            _ => {}
        }
    }
    if let Some(b) = begin {
        words.push((b, text.chars().count()));
    }
    words
}

fn build_store(text: &str, words: &[(usize, usize)]) -> AnnotationStore {
    let mut store = AnnotationStore::new(setup_registry(), Config::default())
        .with_text(text)
        .unwrap();
    store.begin_batch().unwrap();
    for (begin, end) in words {
        store
            .create_extent_tag(
                ExtentTagBuilder::new("WORD").with_span(Span::single(*begin, *end).unwrap()),
            )
            .unwrap();
    }
    for i in 1..words.len() {
        store
            .create_link_tag(
                LinkTagBuilder::new("NEXT")
                    .with_argument("from", format!("W{}", i - 1))
                    .with_argument("to", format!("W{}", i)),
            )
            .unwrap();
    }
    store.commit_batch().unwrap();
    store
}

pub fn bench_store(c: &mut Criterion) {
    let text = generate_text(20_000);
    let words = words(&text);
    let textlen = text.chars().count();

    let mut group = c.benchmark_group("load");
    group.throughput(Throughput::Elements(words.len() as u64));
    group.bench_function("batch", |b| {
        b.iter(|| black_box(build_store(&text, &words)))
    });
    group.finish();

    let store = build_store(&text, &words);

    c.bench_function("tags_at", |b| {
        b.iter(|| {
            let mut count = 0;
            for offset in (0..textlen).step_by(97) {
                count += black_box(store.tags_at(offset)).len();
            }
            assert!(count > 0);
        })
    });

    let mut group = c.benchmark_group("tags_in_range");
    for width in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, width| {
            b.iter(|| {
                let result = store.tags_in_range(black_box(textlen / 2), textlen / 2 + width);
                assert!(!result.is_empty());
            })
        });
    }
    group.finish();

    c.bench_function("links_referencing", |b| {
        b.iter(|| {
            let links = store.links_referencing(black_box("W100")).unwrap();
            assert_eq!(links.len(), 2);
        })
    });

    c.bench_function("create_delete", |b| {
        let mut store = build_store(&text, &words);
        b.iter(|| {
            let handle = store
                .create_extent_tag(ExtentTagBuilder::new("WORD").with_span(Span::single(0, 5).unwrap()))
                .unwrap();
            let id = store
                .extent_tag_by_handle(handle)
                .map(|tag| tag.as_str().to_string())
                .unwrap();
            store.delete_extent_tag(&id).unwrap();
        })
    });
}

criterion_group!(benches, bench_store);
criterion_main!(benches);
