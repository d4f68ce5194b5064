//! Benchmarks for the binding pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft_core::expr::Scope;
use weft_core::{App, Component, Effect, Runtime, Scheduler, Signal, Store, Value};

fn signal_fan_out(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let source = Signal::new(&scheduler, 0);
    let _effects: Vec<Effect> = (0..100)
        .map(|_| {
            let source = source.clone();
            Effect::new(&scheduler, move || {
                black_box(source.get());
            })
        })
        .collect();

    let mut n = 0;
    c.bench_function("signal_write_flush_100_effects", |b| {
        b.iter(|| {
            n += 1;
            source.set(n);
            scheduler.flush()
        })
    });
}

fn cached_evaluation(c: &mut Criterion) {
    let runtime = Runtime::new();
    let store = Store::reactive(
        runtime.scheduler(),
        [("a", Value::from(3)), ("b", Value::from(4))],
    );
    let scope = Scope::new(&store);
    c.bench_function("evaluate_cached_expression", |b| {
        b.iter(|| runtime.evaluator().evaluate(black_box("a * a + b * b > 20 ? 'far' : 'near'"), &scope))
    });
}

fn mount_component(c: &mut Criterion) {
    let runtime = Runtime::new();
    let app = App::builder()
        .field("count", 0)
        .field("items", Value::array([Value::from("a"), Value::from("b")]))
        .component("Row", |_| {
            Component::new().template(
                r#"<li :data-count="count"><span x-text="items.join(', ')"></span>{{count}}</li>"#,
            )
        })
        .build()
        .expect("app builds");
    app.mount(&runtime).expect("app mounts");
    let document = runtime.document().clone();

    c.bench_function("construct_and_dispose_component", |b| {
        b.iter(|| {
            let row = document.create_element("x-row");
            document.append_child(document.body(), row).expect("append");
            document.remove(row).expect("remove");
        })
    });
}

criterion_group!(benches, signal_fan_out, cached_evaluation, mount_component);
criterion_main!(benches);
