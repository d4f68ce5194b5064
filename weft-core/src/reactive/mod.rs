//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, effects and the
//! scheduler that batches effect re-runs.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal registers that effect as a dependent.
//! When the value changes, the dependents are queued with the scheduler.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever its
//! dependencies change. Effects keep the DOM in sync with the store.
//!
//! ## Scheduler
//!
//! Writes never re-run effects synchronously. The scheduler coalesces every
//! dirty mark of one synchronous span into a single flush in which each
//! dirty effect runs exactly once.
//!
//! # Implementation Notes
//!
//! Dependency tracking uses a thread-local stack of running computations.
//! When a signal is read we check for an active entry and, if there is one,
//! record the edge in both directions.

mod context;
mod effect;
mod scheduler;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::{Cleanup, Effect, EffectOutput};
pub use scheduler::{FlushReport, Scheduler};
pub use signal::Signal;
pub use subscriber::{Computation, SignalId, Source, SubscriberId};
