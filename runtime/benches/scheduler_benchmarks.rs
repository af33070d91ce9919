//! Scheduler and Store Benchmarks
//!
//! Measures the cost of the hot paths:
//! - Store `send` for an action with no effects
//! - Re-arming a debounce under a busy key
//! - Cancelling keyed work
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs

use cadence_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use cadence_runtime::{EffectScheduler, Feedback, Store, StoreConfig};
use cadence_testing::{ManualExecutor, VirtualClock};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum BenchId {
    Search,
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    Typed,
    Search,
}

#[derive(Clone, Debug, Default)]
struct BenchState {
    counter: i64,
    searches: u64,
}

struct BenchEnv;

struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;
    type Environment = BenchEnv;
    type CancelId = BenchId;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action, Self::CancelId>; 4]> {
        match action {
            BenchAction::Increment => {
                state.counter += 1;
                SmallVec::new()
            },
            BenchAction::Typed => smallvec![Effect::Debounce {
                id: BenchId::Search,
                duration: Duration::from_millis(300),
                action: Box::new(BenchAction::Search),
            }],
            BenchAction::Search => {
                state.searches += 1;
                SmallVec::new()
            },
        }
    }
}

fn virtual_config(clock: &VirtualClock) -> StoreConfig {
    StoreConfig::default()
        .with_clock(clock.clone())
        .with_executor(ManualExecutor::new())
}

/// Store throughput with no effects
fn benchmark_store_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    let clock = VirtualClock::new();
    let store = Store::with_config(BenchState::default(), BenchReducer, BenchEnv, virtual_config(&clock));

    group.bench_function("send_action", |b| {
        b.iter(|| {
            let _ = store.send(black_box(BenchAction::Increment));
        });
    });

    group.finish();
}

/// Debounce re-arm: every keystroke cancels the pending search
fn benchmark_debounce_rearm(c: &mut Criterion) {
    let mut group = c.benchmark_group("debounce");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rearm_through_store", |b| {
        let clock = VirtualClock::new();
        let store = Store::with_config(BenchState::default(), BenchReducer, BenchEnv, virtual_config(&clock));

        b.iter(|| {
            let _ = store.send(black_box(BenchAction::Typed));
        });

        // Drop the stale callbacks the iterations left on the clock
        clock.run();
    });

    group.finish();
}

/// Scheduling and cancelling keyed work directly on the scheduler
fn benchmark_scheduler_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");

    let clock = VirtualClock::new();
    let scheduler: EffectScheduler<BenchId> =
        EffectScheduler::new(Arc::new(clock.clone()), Arc::new(ManualExecutor::new()));
    let feedback: Feedback<BenchAction> = Arc::new(|_action, _task| {});

    for keyed in [1_usize, 16, 256] {
        group.throughput(Throughput::Elements(keyed as u64));
        group.bench_function(format!("cancel_{keyed}_tasks"), |b| {
            b.iter(|| {
                for _ in 0..keyed {
                    scheduler.run(
                        Effect::Delay {
                            duration: Duration::from_secs(1),
                            action: Box::new(BenchAction::Search),
                        }
                        .cancellable(BenchId::Search),
                        &feedback,
                    );
                }
                black_box(scheduler.cancel(BenchId::Search));
            });
            clock.run();
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_store_send,
    benchmark_debounce_rearm,
    benchmark_scheduler_cancel
);
criterion_main!(benches);
