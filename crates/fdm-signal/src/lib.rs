// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Signal Library
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Numeric routines over masked flight data: gap repair, alignment of
//! one parameter onto another's timebase, and blending of redundant
//! sensors.
//!
//! # Invariants
//!
//! 1. **No fabricated samples**: a result sample is valid only if every
//!    input sample it was computed from is valid. Repairs fill gaps only
//!    within their stated limits.
//!
//! 2. **Inputs are never mutated**: every routine returns a new array or
//!    parameter. Aligning onto an identical timebase returns the input's
//!    own buffer.
//!
//! 3. **Degraded data is not an error**: masked and fully masked inputs
//!    produce masked outputs. Errors are reserved for broken contracts
//!    (mismatched rates or lengths) and unsupported timebases.

pub mod align;
pub mod blend;
pub mod repair;

pub use align::{align, align_slice, align_slices, IndexSlice, ResampleMethod, Resampler};
pub use blend::{
    blend_equispaced_sensors, blend_nonequispaced_sensors, blend_parameters,
    blend_parameters_weighting, blend_two_parameters, concatenate, merge_sources, Padding,
};
pub use repair::{
    hysteresis, interpolate, nearest_neighbour_mask_repair, repair_mask, RepairDirection,
    RepairOptions,
};
