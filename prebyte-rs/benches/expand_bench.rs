use criterion::{black_box, criterion_group, criterion_main, Criterion};
use prebyte::Prebyte;

fn make_plain(repeats: usize) -> String {
    let chunk = "The quick brown fox jumps over the lazy dog. 100% literal.\n";
    chunk.repeat(repeats)
}

fn make_vars(repeats: usize) -> String {
    let chunk = "%%NAME%% is %%AGE%% and lives at %%ADDR[1]%%.\n";
    chunk.repeat(repeats)
}

fn engine() -> Prebyte {
    let mut p = Prebyte::new();
    p.set_variable("NAME", "Ada").unwrap();
    p.set_variable("AGE", "36").unwrap();
    p.set_variable_list("ADDR", vec!["1 Main St".into(), "London".into()]).unwrap();
    p.set_variable_list("ITEMS", (0..100).map(|i| i.to_string()).collect()).unwrap();
    p
}

fn bench_expand(c: &mut Criterion) {
    let plain = make_plain(1000); // ~60k
    let vars = make_vars(1000); // ~45k
    let loops = "%%for i in ITEMS%%%%for j in ITEMS%%%%i%%.%%j%% %%endfor%%%%endfor%%";

    let mut g = c.benchmark_group("expand");

    g.bench_function("plain_text", |b| {
        let mut p = engine();
        b.iter(|| p.process(black_box(&plain)).unwrap())
    });
    g.bench_function("variable_heavy", |b| {
        let mut p = engine();
        b.iter(|| p.process(black_box(&vars)).unwrap())
    });
    g.bench_function("nested_loops", |b| {
        let mut p = engine();
        b.iter(|| p.process(black_box(loops)).unwrap())
    });

    g.finish();
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);
