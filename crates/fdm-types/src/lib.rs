// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! flight data monitor kernel.
//!
//! Every recorded channel is a [`Parameter`]: a masked sample array
//! stamped with its sample rate and phase offset. Reading a sample always
//! goes through its validity bit, so a masked value can never leak into
//! arithmetic.

pub mod attributes;
pub mod config;
pub mod error;
pub mod masked;
pub mod parameter;

pub use attributes::{AttributeName, Attributes};
pub use config::{BlendConfig, EngineConfig};
pub use error::{FdmError, FdmResult};
pub use masked::{MaskedArray, SampleArray, StateArray};
pub use parameter::{Parameter, Samples, Timebase, ValuesMapping};
