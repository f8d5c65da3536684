// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Acceleration Nodes
// ─────────────────────────────────────────────────────────────────────
//! Body-axis accelerations resolved into the earth frame.

use fdm_core::{AlignMode, Derived, NodeInputs, NodeSpec};
use fdm_types::{FdmResult, MaskedArray, SampleArray, Timebase};

pub const ACCELERATION_VERTICAL: &str = "Acceleration Vertical";

const NORMAL: &str = "Acceleration Normal Offset Removed";
const LATERAL: &str = "Acceleration Lateral Offset Removed";
const LONGITUDINAL: &str = "Acceleration Longitudinal";
const PITCH: &str = "Pitch";
const ROLL: &str = "Roll";

/// Output grid for resolved accelerations.
const ACCELERATION_HZ: f64 = 8.0;

/// Vertical acceleration (g) from the three body axes, pitch and roll
/// (degrees), on a fixed 8 Hz grid.
pub fn acceleration_vertical() -> FdmResult<NodeSpec> {
    Ok(NodeSpec::new(ACCELERATION_VERTICAL, derive_acceleration_vertical)
        .parameter(NORMAL)
        .parameter(LATERAL)
        .parameter(LONGITUDINAL)
        .parameter(PITCH)
        .parameter(ROLL)
        .align(AlignMode::Fixed(Timebase::new(ACCELERATION_HZ, 0.0)?)))
}

fn derive_acceleration_vertical(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let norm = inputs.require_values(NORMAL)?;
    let lat = inputs.require_values(LATERAL)?;
    let long = inputs.require_values(LONGITUDINAL)?;
    let pitch = inputs.require_values(PITCH)?;
    let roll = inputs.require_values(ROLL)?;

    // Roll resolves normal and lateral into the pitch plane, pitch then
    // resolves that and longitudinal onto the vertical.
    let in_pitch_plane = zip3(norm, lat, roll, |n, l, r| {
        let r = r.to_radians();
        n * r.cos() - l * r.sin()
    })?;
    let vertical = zip3(&in_pitch_plane, long, pitch, |resolved, lg, p| {
        let p = p.to_radians();
        resolved * p.cos() + lg * p.sin()
    })?;
    Ok(Derived::values(vertical))
}

fn zip3<F>(a: &SampleArray, b: &SampleArray, c: &SampleArray, mut f: F) -> FdmResult<SampleArray>
where
    F: FnMut(f64, f64, f64) -> f64,
{
    let ab: MaskedArray<(f64, f64)> = a.zip_with(b, |x, y| (x, y))?;
    ab.zip_with(c, |(x, y), z| f(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdm_types::{Attributes, EngineConfig, Parameter};

    fn p(name: &str, value: f64, len: usize, frequency: f64) -> Option<Parameter> {
        Some(Parameter::new(name, SampleArray::from_values(vec![value; len]), frequency, 0.0).unwrap())
    }

    fn derive(norm: f64, lat: f64, long: f64, pitch: f64, roll: f64) -> Parameter {
        acceleration_vertical()
            .unwrap()
            .get_derived(
                vec![
                    p(NORMAL, norm, 8, 8.0),
                    p(LATERAL, lat, 4, 4.0),
                    p(LONGITUDINAL, long, 4, 4.0),
                    p(PITCH, pitch, 2, 2.0),
                    p(ROLL, roll, 2, 2.0),
                ],
                &Attributes::default(),
                &EngineConfig::default(),
            )
            .unwrap()
    }

    fn assert_vertical(out: &Parameter, expected: f64) {
        assert_eq!(out.frequency(), 8.0);
        assert_eq!(out.offset(), 0.0);
        let values = out.values().unwrap();
        assert_eq!(values.len(), 8);
        // The tail lies beyond the last bracketed pitch/roll sample.
        assert_eq!(values.validity(), [true, true, true, true, true, false, false, false]);
        for v in values.iter().flatten() {
            assert!((v - expected).abs() < 1e-6, "{v} != {expected}");
        }
    }

    #[test]
    fn test_operational_combinations() {
        let combos = acceleration_vertical()
            .unwrap()
            .operational_combinations(&Attributes::default());
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0], [NORMAL, LATERAL, LONGITUDINAL, PITCH, ROLL]);
    }

    #[test]
    fn test_level_on_ground() {
        assert_vertical(&derive(1.0, 0.0, 0.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn test_pitch_up() {
        assert_vertical(&derive(0.866_025_4, 0.0, 0.5, 30.0, 0.0), 1.0);
    }

    #[test]
    fn test_roll_right() {
        assert_vertical(&derive(0.707_106_8, -0.707_106_8, 0.0, 0.0, 45.0), 1.0);
    }

    #[test]
    fn test_pitch_up_roll_right() {
        assert_vertical(&derive(0.8, -0.2, 0.3, 30.0, 20.0), 0.860_277_77);
    }
}
