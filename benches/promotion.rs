//! Benchmarks for table detection and promotion.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use notesync::document::Node;
use notesync::editor::{EditorHandle, MemoryEngine};
use notesync::table::{find_run, parse_table, promote_at_cursor};

fn table_doc(rows: usize) -> Node {
    let mut blocks = vec![
        Node::plain_paragraph("Intro text"),
        Node::plain_paragraph("| Name | Score | Team |"),
        Node::plain_paragraph("| --- | ---: | --- |"),
    ];
    for i in 0..rows {
        blocks.push(Node::plain_paragraph(&format!("| row {i} | {} | blue |", i * 3)));
    }
    blocks.push(Node::plain_paragraph("Outro text"));
    Node::doc(blocks)
}

fn bench_find_run(c: &mut Criterion) {
    let doc = table_doc(200);
    c.bench_function("find_run_200", |b| b.iter(|| find_run(black_box(&doc), 40).unwrap()));
}

fn bench_parse_table(c: &mut Criterion) {
    let mut text = String::from("| a | b | c |\n| --- | --- | --- |\n");
    for i in 0..200 {
        text.push_str(&format!("| {i} | x | y |\n"));
    }
    c.bench_function("parse_table_200", |b| b.iter(|| parse_table(black_box(&text)).unwrap()));
}

fn bench_promote(c: &mut Criterion) {
    c.bench_function("promote_at_cursor_50", |b| {
        b.iter_batched(
            || {
                let engine = MemoryEngine::new();
                let mut handle = EditorHandle::new();
                handle.mount(Box::new(engine.clone()));
                handle.set_structured(table_doc(50)).unwrap();
                engine.select_block(2);
                handle
            },
            |mut handle| promote_at_cursor(&mut handle).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_find_run, bench_parse_table, bench_promote);
criterion_main!(benches);
