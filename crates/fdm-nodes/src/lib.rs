// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Standard Nodes
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Reference derived-parameter formulas and the registry that carries
//! them.
//!
//! Each module exposes one constructor per node returning its
//! [`NodeSpec`](fdm_core::NodeSpec); [`standard_registry`] collects them.

pub mod acceleration;
pub mod airspeed;
pub mod altitude;
pub mod gear;

use fdm_core::Registry;
use fdm_types::FdmResult;

pub use acceleration::{acceleration_vertical, ACCELERATION_VERTICAL};
pub use airspeed::{airspeed_minus_v2, AIRSPEED_MINUS_V2};
pub use altitude::{altitude_radio, altitude_std_smoothed, ALTITUDE_RADIO, ALTITUDE_STD_SMOOTHED};
pub use gear::{gear_on_ground, gear_on_ground_mapping, GEAR_ON_GROUND};

/// Registry of every node in this crate.
pub fn standard_registry() -> FdmResult<Registry> {
    Registry::from_specs([
        acceleration_vertical()?,
        airspeed_minus_v2(),
        altitude_radio(),
        altitude_std_smoothed(),
        gear_on_ground(),
    ])
}
