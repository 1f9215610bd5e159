use criterion::{black_box, criterion_group, criterion_main, Criterion};

use framegraph::{
    DependencyGraph, DummyAllocator, FrameGraph, FrameGraphId, Texture, TextureDescriptor,
    TextureUsage,
};

#[derive(Default, Clone)]
struct PassData {
    output: Option<FrameGraphId<Texture>>,
}

struct NoopDriver;

fn declare_chain(fg: &mut FrameGraph, length: usize) -> PassData {
    let mut prev = fg.add_pass::<PassData, _, _>(
        "pass 0",
        |builder, data| {
            let mut color = builder.create::<Texture>("buffer 0", TextureDescriptor::new_2d(64, 64));
            builder.use_as_color_target(&mut color).unwrap();
            data.output = Some(color);
        },
        |_, _, _| {},
    );
    for i in 1..length {
        let carried = prev.clone();
        prev = fg.add_pass::<PassData, _, _>(
            &format!("pass {i}"),
            move |builder, data| {
                builder
                    .read(carried.output.unwrap(), TextureUsage::SAMPLEABLE)
                    .unwrap();
                let mut color =
                    builder.create::<Texture>("buffer", TextureDescriptor::new_2d(64, 64));
                builder.use_as_color_target(&mut color).unwrap();
                data.output = Some(color);
            },
            |_, _, _| {},
        );
    }
    prev
}

// ---------------------------------------------------------------------------
// Dependency graph culling
// ---------------------------------------------------------------------------

fn bench_cull_chain(c: &mut Criterion) {
    c.bench_function("dependency_graph_cull_1024_nodes", |b| {
        b.iter_with_setup(
            || {
                let mut graph = DependencyGraph::new();
                let mut prev = graph.add_node();
                for _ in 1..1024 {
                    let node = graph.add_node();
                    graph.add_edge(prev, node);
                    prev = node;
                }
                graph.make_target(prev);
                graph
            },
            |mut graph| {
                black_box(graph.cull());
            },
        );
    });
}

// ---------------------------------------------------------------------------
// Frame graph declaration
// ---------------------------------------------------------------------------

fn bench_declare_small(c: &mut Criterion) {
    c.bench_function("framegraph_declare_8_passes", |b| {
        b.iter(|| {
            let mut fg = FrameGraph::new();
            declare_chain(&mut fg, 8);
            black_box(&fg);
        });
    });
}

fn bench_declare_large(c: &mut Criterion) {
    c.bench_function("framegraph_declare_64_passes", |b| {
        b.iter(|| {
            let mut fg = FrameGraph::new();
            declare_chain(&mut fg, 64);
            black_box(&fg);
        });
    });
}

// ---------------------------------------------------------------------------
// Compile and execute
// ---------------------------------------------------------------------------

fn bench_compile(c: &mut Criterion) {
    c.bench_function("framegraph_compile_32_passes", |b| {
        b.iter_with_setup(
            || {
                let mut fg = FrameGraph::new();
                let last = declare_chain(&mut fg, 32);
                fg.present(last.output.unwrap()).unwrap();
                fg
            },
            |mut fg| {
                fg.compile().unwrap();
                black_box(&fg);
            },
        );
    });
}

fn bench_compile_execute(c: &mut Criterion) {
    c.bench_function("framegraph_compile_execute_32_passes", |b| {
        b.iter_with_setup(
            || {
                let mut fg = FrameGraph::new();
                let last = declare_chain(&mut fg, 32);
                fg.present(last.output.unwrap()).unwrap();
                fg
            },
            |mut fg| {
                let mut allocator = DummyAllocator::new();
                let mut driver = NoopDriver;
                fg.compile().unwrap();
                fg.execute(&mut allocator, &mut driver).unwrap();
                black_box(allocator.textures_created);
            },
        );
    });
}

criterion_group!(
    benches,
    bench_cull_chain,
    bench_declare_small,
    bench_declare_large,
    bench_compile,
    bench_compile_execute
);
criterion_main!(benches);
