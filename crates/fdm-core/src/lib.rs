// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Node Framework
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Declarative derived-parameter nodes, the dependency graph built from
//! them, and the executor that evaluates the graph for one recording.
//!
//! # Invariants
//!
//! 1. **Dependencies first**: a node runs only after every node it
//!    consumes has reached a terminal state, and it sees only outputs
//!    that were actually derived.
//!
//! 2. **Recorded data wins**: a node whose output the recording already
//!    carries is never evaluated.
//!
//! 3. **Failures stay local**: a failing or panicking formula marks its
//!    node `Failed`; dependants fall back to other operational
//!    combinations or are skipped. The run itself succeeds.
//!
//! 4. **Common grid**: unless a node opts out, every input a formula sees
//!    shares one frequency and offset.

pub mod executor;
pub mod graph;
pub mod node;
pub mod recording;
pub mod registry;

pub use executor::{Derivation, Executor, NodeState};
pub use graph::{DerivationGraph, SkipReason};
pub use node::{
    AlignMode, Dependency, DependencyKind, DeriveFn, Derived, NodeInputs, NodeSpec, Output,
    Requirement,
};
pub use recording::{ExternalSource, InMemoryRecording, ParameterSource};
pub use registry::Registry;
