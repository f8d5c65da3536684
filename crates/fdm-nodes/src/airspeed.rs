// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Airspeed Nodes
// ─────────────────────────────────────────────────────────────────────

use fdm_core::{Derived, NodeInputs, NodeSpec, Requirement};
use fdm_types::{FdmError, FdmResult};

pub const AIRSPEED_MINUS_V2: &str = "Airspeed Minus V2";

/// Airspeed relative to the takeoff safety speed. A recorded V2 is used
/// in preference to the lookup whenever both are present.
pub fn airspeed_minus_v2() -> NodeSpec {
    NodeSpec::new(AIRSPEED_MINUS_V2, derive_airspeed_minus_v2)
        .parameter("Airspeed")
        .parameter("V2")
        .parameter("V2 Lookup")
        .requires(Requirement::available("Airspeed").and(Requirement::any_of(["V2", "V2 Lookup"])))
}

fn derive_airspeed_minus_v2(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let airspeed = inputs.require_values("Airspeed")?;
    let v2 = inputs
        .first_of(&["V2", "V2 Lookup"])
        .ok_or_else(|| FdmError::Contract(format!("{}: no V2 source", inputs.node_name())))?
        .require_values()?;
    Ok(Derived::values(airspeed.zip_with(v2, |a, b| a - b)?))
}
