//! Integration Tests
//!
//! End-to-end checks across the store, the walker, the directives and the
//! component runtime.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weft_core::component::tag_name;
use weft_core::error::ReactiveError;
use weft_core::expr::Scope;
use weft_core::{
    App, AppConfig, Component, Effect, Event, NodeId, Runtime, Scheduler, SetupError, Signal,
    Store, Value,
};

/// Mount a single-component app and place one instance in the body.
fn mount_one(
    fields: impl IntoIterator<Item = (&'static str, Value)>,
    template: &'static str,
) -> (Runtime, Store, NodeId) {
    let runtime = Runtime::new();
    let mut builder = App::builder();
    for (name, value) in fields {
        builder = builder.field(name, value);
    }
    let app = builder
        .component("Widget", move |_| Component::new().template(template))
        .build()
        .unwrap();
    let store = app.mount(&runtime).unwrap();

    let document = runtime.document();
    let element = document.create_element("x-widget");
    document.append_child(document.body(), element).unwrap();
    (runtime, store, element)
}

// ---- Reactivity ----

/// Writing a signal the effect no longer reads does not re-run it.
#[test]
fn effects_depend_only_on_what_they_read() {
    let scheduler = Scheduler::new();
    let use_a = Signal::new(&scheduler, true);
    let a = Signal::new(&scheduler, 1);
    let b = Signal::new(&scheduler, 2);
    let runs = Arc::new(AtomicI32::new(0));

    let effect = Effect::new(&scheduler, {
        let (use_a, a, b, runs) = (use_a.clone(), a.clone(), b.clone(), runs.clone());
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
            if use_a.get() {
                a.get();
            } else {
                b.get();
            }
        }
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    b.set(20);
    scheduler.flush();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    use_a.set(false);
    scheduler.flush();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    a.set(10);
    scheduler.flush();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(effect.dependency_count(), 2);
}

/// Many writes in one span produce one re-run.
#[test]
fn writes_in_one_span_are_batched() {
    let scheduler = Scheduler::new();
    let count = Signal::new(&scheduler, 0);
    let runs = Arc::new(AtomicI32::new(0));
    let _effect = Effect::new(&scheduler, {
        let (count, runs) = (count.clone(), runs.clone());
        move || {
            count.get();
            runs.fetch_add(1, Ordering::SeqCst);
        }
    });

    for i in 1..=10 {
        count.set(i);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.pending_count(), 1);

    let report = scheduler.flush();
    assert_eq!(report.recomputed, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(scheduler.tick().is_none());
}

/// One failing effect does not stop the rest of the flush.
#[test]
fn flush_isolates_failures() {
    let scheduler = Scheduler::new();
    let count = Signal::new(&scheduler, 0);
    let seen = Arc::new(AtomicI32::new(0));

    let failing = Effect::new(&scheduler, {
        let count = count.clone();
        move || -> Result<(), ReactiveError> {
            if count.get() > 0 {
                return Err(ReactiveError::EffectFailed("too big".into()));
            }
            Ok(())
        }
    });
    let _healthy = Effect::new(&scheduler, {
        let (count, seen) = (count.clone(), seen.clone());
        move || seen.store(count.get(), Ordering::SeqCst)
    });

    count.set(3);
    let report = scheduler.flush();
    assert_eq!(report.recomputed, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, failing.subscriber_id());
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

/// The async driver flushes after the writing span yields.
#[tokio::test]
async fn driver_flushes_queued_work() {
    let scheduler = Scheduler::new();
    let driver = scheduler.start();
    let mut flushes = scheduler.subscribe();

    let store = Store::reactive(&scheduler, [("count", Value::from(0))]);
    let seen = Arc::new(AtomicI32::new(0));
    let _effect = Effect::new(&scheduler, {
        let (store, seen) = (store.clone(), seen.clone());
        move || seen.store(store.get("count").to_number() as i32, Ordering::SeqCst)
    });

    store.set("count", 5).unwrap();
    store.set("count", 7).unwrap();
    tokio::time::timeout(Duration::from_secs(1), flushes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 7);
    assert_eq!(scheduler.flush_count(), 1);

    scheduler.dispose();
    driver.await.unwrap();
}

// ---- Binding ----

#[test]
fn text_interpolation_round_trip() {
    let (runtime, store, element) = mount_one([("name", Value::from("World"))], "<p>Hello {{name}}</p>");
    let document = runtime.document();
    assert_eq!(document.text_content(element), "Hello World");

    store.set("name", "Weft").unwrap();
    assert_eq!(document.text_content(element), "Hello World");
    runtime.scheduler().flush();
    assert_eq!(document.text_content(element), "Hello Weft");
}

#[test]
fn counter_scenario() {
    let (runtime, store, element) = mount_one(
        [("count", Value::from(0))],
        r#"<div :data-count="count">{{count}}</div><button @click="count += 1">+</button>"#,
    );
    let document = runtime.document();
    assert_eq!(
        document.inner_html(element),
        r#"<div data-count="0">0</div><button>+</button>"#
    );

    let button = document.children(element)[1];
    document.dispatch_event(Event::new("click", button));
    document.dispatch_event(Event::new("click", button));
    assert_eq!(store.get_untracked("count"), Value::from(2));

    runtime.scheduler().flush();
    assert_eq!(
        document.inner_html(element),
        r#"<div data-count="2">2</div><button>+</button>"#
    );
}

#[test]
fn model_round_trip() {
    let (runtime, store, element) = mount_one(
        [("name", Value::from("Ada"))],
        r#"<input x-model="name"><span x-text="name"></span>"#,
    );
    let document = runtime.document();
    let input = document.children(element)[0];
    let span = document.children(element)[1];
    assert_eq!(document.property(input, "value"), Value::from("Ada"));

    document.set_property(input, "value", "Grace").unwrap();
    document.dispatch_event(Event::new("input", input));
    runtime.scheduler().flush();
    assert_eq!(store.get_untracked("name"), Value::from("Grace"));
    assert_eq!(document.text_content(span), "Grace");
}

/// Nested components bind their own subtree; the parent's walk never
/// binds inside them.
#[test]
fn component_boundaries_isolate_bindings() {
    let runtime = Runtime::new();
    let app = App::builder()
        .field("label", "x")
        .component("Outer", |_| {
            Component::new().template("<p>{{label}}</p><inner-part></inner-part><p>{{label}}</p>")
        })
        .component("InnerPart", |_| {
            Component::new().template(r#"<b :title="label">{{label}}</b>"#)
        })
        .build()
        .unwrap();
    app.mount(&runtime).unwrap();

    let document = runtime.document();
    let outer = document.create_element("x-outer");
    document.append_child(document.body(), outer).unwrap();

    let outer_ctx = runtime.instance(outer).unwrap();
    let inner = document.children(outer)[1];
    let inner_ctx = runtime.instance(inner).unwrap();
    assert_eq!(outer_ctx.effect_count(), 2);
    assert_eq!(inner_ctx.effect_count(), 2);
    assert_eq!(inner_ctx.parent().unwrap().element(), outer);
    assert_eq!(runtime.instance_count(), 2);
}

// ---- Expressions ----

#[test]
fn evaluator_compiles_each_source_once() {
    let runtime = Runtime::new();
    let store = Store::reactive(runtime.scheduler(), [("n", Value::from(2))]);
    let scope = Scope::new(&store);
    let evaluator = runtime.evaluator();

    for _ in 0..5 {
        assert_eq!(evaluator.evaluate("n * 21", &scope), Value::from(42));
    }
    assert_eq!(evaluator.compile_count(), 1);

    evaluator.evaluate("n + 1", &scope);
    assert_eq!(evaluator.compile_count(), 2);
}

// ---- Components ----

#[test]
fn tag_name_derivation() {
    assert_eq!(tag_name("MyElement", None), "my-element");
    assert_eq!(tag_name("Button", None), "x-button");
    assert_eq!(tag_name("Button", Some("ui")), "ui-button");
}

#[test]
fn duplicate_tags_fail_setup() {
    let runtime = Runtime::new();
    let first = App::builder()
        .component("Card", |_| Component::new())
        .build()
        .unwrap();
    let second = App::builder()
        .component("Card", |_| Component::new())
        .build()
        .unwrap();
    first.mount(&runtime).unwrap();
    let err = second.mount(&runtime).unwrap_err();
    assert!(matches!(err, SetupError::DuplicateTag(tag) if tag == "x-card"));
}

#[test]
fn disconnect_removes_listeners_and_runs_cleanup_once() {
    let disconnected = Arc::new(AtomicI32::new(0));
    let runtime = Runtime::new();
    let app = App::builder()
        .field("count", 0)
        .component("Clicker", {
            let disconnected = disconnected.clone();
            move |_| {
                let disconnected = disconnected.clone();
                Component::new()
                    .template(r#"<button @click="count += 1">{{count}}</button>"#)
                    .on_disconnected(move |_| {
                        disconnected.fetch_add(1, Ordering::SeqCst);
                    })
            }
        })
        .build()
        .unwrap();
    let store = app.mount(&runtime).unwrap();

    let document = runtime.document();
    let element = document.create_element("x-clicker");
    document.append_child(document.body(), element).unwrap();
    let button = document.children(element)[0];
    assert_eq!(document.listener_count(button), 1);
    let context = runtime.instance(element).unwrap();

    document.remove(element).unwrap();
    assert_eq!(document.listener_count(button), 0);
    assert!(context.is_disposed());
    assert_eq!(context.effect_count(), 0);
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);

    // Re-attaching neither reconstructs nor disposes twice.
    document.append_child(document.body(), element).unwrap();
    document.remove(element).unwrap();
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);

    store.set("count", 9).unwrap();
    runtime.scheduler().flush();
    assert_eq!(document.text_content(button), "0");
}

#[test]
fn template_selector_falls_back_to_markup() {
    let runtime = Runtime::new();
    let document = runtime.document();
    let shared = document
        .parse_fragment(r#"<template id="row"><li>{{item}}</li></template>"#)
        .unwrap();
    document.append_child(document.body(), shared).unwrap();

    let app = App::builder()
        .field("item", "apple")
        .component("Row", |_| Component::new().template("#row"))
        .component("Plain", |_| Component::new().template("just text"))
        .config(AppConfig {
            prefix: None,
            dev_warnings: false,
        })
        .build()
        .unwrap();
    app.mount(&runtime).unwrap();

    let row = document.create_element("x-row");
    let plain = document.create_element("x-plain");
    document.append_child(document.body(), row).unwrap();
    document.append_child(document.body(), plain).unwrap();
    assert_eq!(document.inner_html(row), "<li>apple</li>");
    assert_eq!(document.inner_html(plain), "just text");
}

#[test]
fn scope_attribute_reaches_the_factory() {
    let runtime = Runtime::new();
    let document = runtime.document();
    let existing = document
        .parse_fragment(r#"<x-greeting x-scope="{ who: 'Ada' }"></x-greeting>"#)
        .unwrap();
    document.append_child(document.body(), existing).unwrap();

    let app = App::builder()
        .component("Greeting", |args| {
            Component::new()
                .member("who", args.prop("who"))
                .template("<em>{{who}}</em>")
        })
        .build()
        .unwrap();
    app.mount(&runtime).unwrap();

    let element = document.children(document.body())[0];
    assert_eq!(document.inner_html(element), "<em>Ada</em>");
}

#[test]
fn runtime_dispose_tears_everything_down() {
    let (runtime, store, element) = mount_one([("n", Value::from(1))], "<i>{{n}}</i>");
    let context = runtime.instance(element).unwrap();
    runtime.dispose();
    assert!(context.is_disposed());
    assert_eq!(runtime.instance_count(), 0);

    store.set("n", 2).unwrap();
    runtime.scheduler().flush();
    assert_eq!(runtime.document().text_content(element), "1");
}
