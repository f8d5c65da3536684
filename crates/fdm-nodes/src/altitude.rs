// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Altitude Nodes
// ─────────────────────────────────────────────────────────────────────
//! Radio altitude from redundant sensors, and a smoothed pressure
//! altitude.

use fdm_core::{AlignMode, Derived, NodeInputs, NodeSpec, Requirement};
use fdm_signal::{blend_parameters, blend_two_parameters, hysteresis, repair_mask, RepairOptions};
use fdm_types::{FdmError, FdmResult, Parameter};

pub const ALTITUDE_RADIO: &str = "Altitude Radio";
pub const ALTITUDE_STD_SMOOTHED: &str = "Altitude STD Smoothed";

const RADIO_SOURCES: [&str; 3] = [
    "Altitude Radio (A)",
    "Altitude Radio (B)",
    "Altitude Radio (C)",
];
const ALTITUDE_STD: &str = "Altitude STD";

/// Pressure altitude oscillations within this band (ft) are removed.
pub const HYSTERESIS_FPALT: f64 = 16.0;

/// Radio altitude blended from whichever sensors were recorded. Sensors
/// keep their own timebases until the blend.
pub fn altitude_radio() -> NodeSpec {
    RADIO_SOURCES
        .iter()
        .fold(NodeSpec::new(ALTITUDE_RADIO, derive_altitude_radio), |spec, s| {
            spec.parameter(*s)
        })
        .requires(Requirement::any_of(RADIO_SOURCES))
        .align(AlignMode::Off)
}

fn derive_altitude_radio(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let blend = &inputs.config().blend;
    let sources: Vec<&Parameter> = inputs.present().collect();
    let blended = match sources.as_slice() {
        [] => {
            return Err(FdmError::Contract(format!(
                "{}: no radio altimeter recorded",
                inputs.node_name()
            )))
        }
        [only] => (*only).clone(),
        [a, b] if a.frequency() == b.frequency() && a.len() == b.len() => {
            blend_two_parameters(a, b, blend).or_else(|e| {
                log::debug!("{}: pairwise blend unavailable ({e})", inputs.node_name());
                blend_parameters(&[Some(*a), Some(*b)], None, None, blend)
            })?
        }
        many => {
            let slots: Vec<Option<&Parameter>> = many.iter().copied().map(Some).collect();
            blend_parameters(&slots, None, None, blend)?
        }
    };
    Ok(Derived::parameter(blended))
}

/// Pressure altitude with short dropouts repaired and transducer noise
/// removed.
pub fn altitude_std_smoothed() -> NodeSpec {
    NodeSpec::new(ALTITUDE_STD_SMOOTHED, derive_altitude_std_smoothed).parameter(ALTITUDE_STD)
}

fn derive_altitude_std_smoothed(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let alt = inputs.require(ALTITUDE_STD)?;
    let options = RepairOptions::from_config(inputs.config(), alt.frequency()).zero_if_masked(true);
    let repaired = repair_mask(alt.require_values()?, options)?;
    Ok(Derived::values(hysteresis(&repaired, HYSTERESIS_FPALT)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use fdm_types::{Attributes, EngineConfig, SampleArray};

    fn p(name: &str, values: Vec<f64>, frequency: f64, offset: f64) -> Parameter {
        Parameter::new(name, SampleArray::from_values(values), frequency, offset).unwrap()
    }

    fn derive_radio(args: Vec<Option<Parameter>>) -> Parameter {
        altitude_radio()
            .get_derived(args, &Attributes::default(), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_single_sensor_passes_through() {
        let b = p(RADIO_SOURCES[1], vec![5.0, 4.0, 3.0], 2.0, 0.25);
        let out = derive_radio(vec![None, Some(b.clone()), None]);
        assert_eq!(out.name(), ALTITUDE_RADIO);
        assert_eq!(out.timebase(), b.timebase());
        assert!(out.shares_buffer_with(&b));
    }

    #[test]
    fn test_two_equal_rate_sensors_blend_to_double_rate() {
        let a = p(RADIO_SOURCES[0], vec![0.0, 1.0, 2.0, 3.0], 1.0, 0.0);
        let b = p(RADIO_SOURCES[1], vec![0.5, 1.5, 2.5, 3.5], 1.0, 0.5);
        let out = derive_radio(vec![Some(a), Some(b), None]);
        assert_eq!(out.frequency(), 2.0);
        assert_eq!(out.offset(), 0.0);
        assert_eq!(out.len(), 8);
        let values = out.values().unwrap();
        for i in 1..7 {
            let v = values.get(i).unwrap();
            assert!((v - i as f64 * 0.5).abs() < 1e-9, "sample {i}: {v}");
        }
    }

    #[test]
    fn test_three_sensors_use_weighted_blend() {
        let a = p(RADIO_SOURCES[0], [10.0, 10.0, 10.0, 10.0, 10.1].repeat(2), 0.5, 0.0);
        let b = p(RADIO_SOURCES[1], vec![20.0, 20.0, 20.0, 20.0, 20.2], 0.25, 1.0);
        let c = p(RADIO_SOURCES[2], vec![30.0, 30.0, 30.0, 30.0, 30.3], 0.25, 3.0);
        let out = derive_radio(vec![Some(a), Some(b), Some(c)]);
        assert_eq!(out.frequency(), 0.5);
        assert_eq!(out.offset(), 0.0);
        assert_eq!(out.len(), 10);
        let values = out.values().unwrap();
        assert!(values.count_valid() > 0);
        assert!(values.iter().flatten().all(|v| (9.99..=30.31).contains(&v)));
    }

    #[test]
    fn test_requires_any_sensor() {
        let spec = altitude_radio();
        let attrs = Attributes::default();
        let available =
            |names: &[&str]| -> BTreeSet<String> { names.iter().map(|s| s.to_string()).collect() };
        assert!(spec.can_operate(&available(&["Altitude Radio (C)"]), &attrs));
        assert!(!spec.can_operate(&available(&["Altitude STD"]), &attrs));
        assert_eq!(spec.operational_combinations(&attrs).len(), 7);
    }

    #[test]
    fn test_altitude_std_smoothed_repairs_and_flattens_noise() {
        let mut alt = SampleArray::from_values(
            (0..20).map(|i| if i % 2 == 0 { 1000.0 } else { 1002.0 }).collect(),
        );
        for i in 6..9 {
            alt.mask(i);
        }
        let alt = Parameter::new(ALTITUDE_STD, alt, 1.0, 0.0).unwrap();
        let out = altitude_std_smoothed()
            .get_derived(vec![Some(alt)], &Attributes::default(), &EngineConfig::default())
            .unwrap();
        let values = out.values().unwrap();
        assert!(values.is_fully_valid());
        assert!(values.iter().flatten().all(|v| v == 1000.0));
    }

    #[test]
    fn test_altitude_std_smoothed_keeps_long_gaps() {
        let mut alt = SampleArray::from_values((0..40).map(|i| 1000.0 + 100.0 * i as f64).collect());
        for i in 5..25 {
            alt.mask(i);
        }
        let alt = Parameter::new(ALTITUDE_STD, alt, 1.0, 0.0).unwrap();
        let out = altitude_std_smoothed()
            .get_derived(vec![Some(alt)], &Attributes::default(), &EngineConfig::default())
            .unwrap();
        assert_eq!(out.values().unwrap().masked_runs(), vec![5..25]);
    }

    #[test]
    fn test_altitude_std_smoothed_fully_masked() {
        let alt = Parameter::new(ALTITUDE_STD, SampleArray::masked(8), 1.0, 0.0).unwrap();
        let out = altitude_std_smoothed()
            .get_derived(vec![Some(alt)], &Attributes::default(), &EngineConfig::default())
            .unwrap();
        assert!(out.is_fully_masked());
    }
}
