//! Questmap Core -- the progression engine for stage-map exercises.
//!
//! This crate provides the stage graph, path set, exercise bindings,
//! session budgets, deferred presentation effects, and serialization that
//! a stage-map runtime depends on. It decides *what is true* about the
//! map -- which stages exist, which are reachable, what state each stage
//! and path is in, how much budget remains -- and hands off *when*
//! observable side effects may run. Rendering, audio, and dialogs live
//! entirely in the host shell.
//!
//! # Apply-Then-Notify
//!
//! Every operation on [`controller::ProgressionController`] commits its
//! state mutations first, then records the signals and deferred effects
//! describing them. Observers never see an effect referencing a state
//! that has not been committed yet.
//!
//! # Injected Time
//!
//! The engine never starts real timers. The host advances time with
//! [`controller::ProgressionController::advance_time`], which drives the
//! global countdown, the open exercise's countdown, and the deferred
//! effect schedule. Tests inject any clock they like.
//!
//! # Key Types
//!
//! - [`controller::ProgressionController`] -- orchestrates a whole map
//!   session: activation requests, scoring, budgets, end-of-game.
//! - [`graph::StageGraph`] -- flat id-keyed store of stages with BFS
//!   reachability and unlock propagation.
//! - [`path::PathSet`] -- one deduplicated undirected path per neighbor
//!   pair, mirroring stage transitions.
//! - [`exercise::ExerciseBinding`] -- per-stage embedded-activity
//!   progress, independent of presentation.
//! - [`budget::BudgetTracker`] -- lives, global time, aggregate score vs
//!   the finish threshold.
//! - [`schedule::DeferredQueue`] -- immediate-or-queued delivery of
//!   presentation effects with an insertion-order replay guarantee.
//! - [`snapshot::SessionSnapshot`] -- versioned resumable-session state.

pub mod budget;
pub mod config;
pub mod controller;
pub mod event;
pub mod exercise;
pub mod graph;
pub mod id;
pub mod path;
pub mod schedule;
pub mod snapshot;
pub mod stage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
