//! Transition manager benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use indexmap::IndexSet;
use std::sync::Arc;
use stmgr_core::{
    Catalog, Condition, DefinitionModel, Entity, StateTransitionModel, Transition,
    TransitionDefinition, TransitionManager,
};

/// A linear lifecycle of `states` steps, each guarded by an owner check,
/// plus a wildcard cancel.
fn linear_model(states: usize) -> DefinitionModel {
    let mut model = StateTransitionModel::new();
    for i in 0..states {
        model = model
            .with_transition(
                Transition::new(
                    format!("state_{}", i),
                    format!("next_{}", i),
                    format!("state_{}", i + 1),
                )
                .with_condition(Condition::property("owner", "alice"))
                .with_condition(Condition::required_fields(
                    "req",
                    format!("[field_{}][title]", i),
                )),
            )
            .with_definition(TransitionDefinition::new(format!("next_{}", i)));
    }
    model = model
        .with_transition(Transition::new("*", "cancel", "cancelled"))
        .with_definition(TransitionDefinition::new("cancel"));
    DefinitionModel::managed("linear", model)
}

fn entity() -> Entity {
    Entity::new("bench-1", "linear")
        .with_category("bench")
        .with_property("owner", serde_json::json!(["bob", "alice"]))
        .with_property("status", "state_0")
}

fn manager(states: usize) -> TransitionManager {
    Arc::new(
        Catalog::new()
            .with_definition(linear_model(states))
            .with_initial_state("bench", "state_0"),
    )
    .manager()
}

fn bench_next_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_next_state");
    let e = entity();

    for states in [4usize, 32, 256] {
        let m = manager(states);
        let last = format!("state_{}", states - 1);
        let op = format!("next_{}", states - 1);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("exact", states), &states, |b, _| {
            b.iter(|| black_box(m.next_state(&e, Some(&last), Some(&op)).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("wildcard", states), &states, |b, _| {
            b.iter(|| black_box(m.next_state(&e, Some(&last), Some("cancel")).unwrap()))
        });
    }

    group.finish();
}

fn bench_allowed_actions(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_allowed_actions");
    let e = entity();

    let plain = manager(64);
    group.bench_function("static", |b| {
        b.iter(|| black_box(plain.allowed_actions(&e, Some("state_10")).unwrap()))
    });

    let dynamic = manager(64).with_provider(Arc::new(|_: &Entity| {
        (0..16)
            .map(|i| Transition::new("state_10", format!("extra_{}", i), "extra"))
            .collect()
    }));
    group.bench_function("with_provider", |b| {
        b.iter(|| black_box(dynamic.allowed_actions(&e, Some("state_10")).unwrap()))
    });

    let restrict: IndexSet<String> = ["next_10".to_string(), "cancel".to_string()].into();
    group.bench_function("restricted", |b| {
        b.iter(|| {
            black_box(
                plain
                    .allowed_actions_restricted(&e, Some("state_10"), &restrict)
                    .unwrap(),
            )
        })
    });

    group.finish();
}

fn bench_required_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_required_fields");
    let e = entity();
    let m = manager(64);

    group.bench_function("matched", |b| {
        b.iter(|| black_box(m.required_fields(&e, Some("state_10"), "next_10").unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_next_state,
    bench_allowed_actions,
    bench_required_fields
);
criterion_main!(benches);
