// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Landing Gear Nodes
// ─────────────────────────────────────────────────────────────────────

use fdm_core::{AlignMode, Derived, NodeInputs, NodeSpec, Requirement};
use fdm_signal::{
    align::align_with_tolerance, merge_sources, nearest_neighbour_mask_repair, RepairDirection,
    RepairOptions,
};
use fdm_types::{EngineConfig, FdmError, FdmResult, Parameter, StateArray, ValuesMapping};

pub const GEAR_ON_GROUND: &str = "Gear On Ground";

const LEFT: &str = "Gear (L) On Ground";
const RIGHT: &str = "Gear (R) On Ground";

const AIR: i64 = 0;
const GROUND: i64 = 1;

pub fn gear_on_ground_mapping() -> ValuesMapping {
    ValuesMapping::from([(AIR, "Air".to_string()), (GROUND, "Ground".to_string())])
}

/// Either main gear on the ground. Switches are combined on their own
/// timebases.
pub fn gear_on_ground() -> NodeSpec {
    NodeSpec::new(GEAR_ON_GROUND, derive_gear_on_ground)
        .multistate(LEFT)
        .multistate(RIGHT)
        .requires(Requirement::any_of([LEFT, RIGHT]))
        .align(AlignMode::Off)
        .values_mapping(gear_on_ground_mapping())
}

fn derive_gear_on_ground(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let config = inputs.config();
    let gear = match (inputs.get(LEFT), inputs.get(RIGHT)) {
        (Some(left), Some(right)) => combine(&normalise(left)?, &normalise(right)?, config)?,
        (Some(one), None) | (None, Some(one)) => normalise(one)?,
        (None, None) => {
            return Err(FdmError::Contract(format!(
                "{}: no gear switch recorded",
                inputs.node_name()
            )))
        }
    };

    let states = gear
        .states()
        .ok_or_else(|| FdmError::Contract(format!("{}: expected gear states", inputs.node_name())))?;
    let gap = RepairOptions::from_config(config, gear.frequency()).max_gap;
    let repaired = nearest_neighbour_mask_repair(states, RepairDirection::Both, gap)?;
    Ok(Derived::states(repaired).at(gear.timebase()))
}

/// Re-code a switch onto `Air`/`Ground` by its state labels.
fn normalise(switch: &Parameter) -> FdmResult<Parameter> {
    let (Some(states), Some(mapping)) = (switch.states(), switch.values_mapping()) else {
        return Err(FdmError::Contract(format!(
            "{} is not a multi-state parameter",
            switch.name()
        )));
    };
    let codes = states.map(|code| match mapping.get(&code).map(String::as_str) {
        Some("Ground") => GROUND,
        _ => AIR,
    });
    Parameter::multistate(
        switch.name(),
        codes,
        gear_on_ground_mapping(),
        switch.frequency(),
        switch.offset(),
    )
}

/// Combine left and right switches.
///
/// Samples less than a quarter period apart are treated as simultaneous
/// and OR-ed on the left timebase; staggered samples are interleaved in
/// time order at twice the rate.
fn combine(left: &Parameter, right: &Parameter, config: &EngineConfig) -> FdmResult<Parameter> {
    let phase = ((left.offset() - right.offset()) * left.frequency()).abs();
    if phase < 0.25 || phase > 0.75 {
        let right = align_with_tolerance(right, left.timebase(), false, config.snap_tolerance)?;
        let (Some(l), Some(r)) = (left.states(), right.states()) else {
            return Err(FdmError::Contract("gear switches lost their states".into()));
        };
        let either: StateArray = l.zip_with(r, |a, b| if a == GROUND || b == GROUND { GROUND } else { AIR })?;
        return Parameter::multistate(
            left.name(),
            either,
            gear_on_ground_mapping(),
            left.frequency(),
            left.offset(),
        );
    }

    let ordered = if left.offset() <= right.offset() {
        [left, right]
    } else {
        [right, left]
    };
    log::debug!(
        "gear switches staggered by {phase:.2} of a sample; merging {} and {}",
        ordered[0].name(),
        ordered[1].name()
    );
    merge_sources(&ordered)
}
