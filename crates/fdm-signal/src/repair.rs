// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Interpolation and Mask Repair
// ─────────────────────────────────────────────────────────────────────
//! Gap filling for masked sample arrays.
//!
//! Masked runs bounded by valid samples on both sides are filled
//! linearly. Runs touching either end of the array can only be filled
//! flat from their single neighbour, and only when extrapolation is
//! requested. Nothing is invented beyond the stated limits.

use std::fmt;
use std::str::FromStr;

use fdm_types::{EngineConfig, FdmError, FdmResult, MaskedArray, SampleArray};

fn ensure_not_empty(len: usize, op: &str) -> FdmResult<()> {
    if len == 0 {
        return Err(FdmError::Contract(format!("{op}: empty array")));
    }
    Ok(())
}

/// Fill every masked run linearly, optionally extrapolating the edges flat.
///
/// A fully valid array comes back unchanged. A fully masked one comes
/// back zeroed and still masked.
pub fn interpolate(array: &SampleArray, extrapolate: bool) -> FdmResult<SampleArray> {
    ensure_not_empty(array.len(), "interpolate")?;
    if array.is_fully_masked() {
        return Ok(SampleArray::masked(array.len()));
    }
    Ok(fill_runs(array, None, extrapolate))
}

/// Options for [`repair_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RepairOptions {
    /// Longest masked run (samples) that is filled; `None` fills any length.
    pub max_gap: Option<usize>,
    /// Fill runs at either end flat from the nearest valid sample.
    pub extrapolate: bool,
    /// Return zeros (still masked) instead of failing on fully masked input.
    pub zero_if_masked: bool,
}

impl RepairOptions {
    /// Limit repairs to gaps of at most `duration_s` seconds at `frequency`.
    pub fn within(duration_s: f64, frequency: f64) -> Self {
        let samples = (duration_s * frequency + 1e-9).floor().max(0.0) as usize;
        Self {
            max_gap: Some(samples),
            ..Self::default()
        }
    }

    /// Engine default gap limit at `frequency`.
    pub fn from_config(config: &EngineConfig, frequency: f64) -> Self {
        Self::within(config.repair_duration_s, frequency)
    }

    pub fn extrapolate(mut self, yes: bool) -> Self {
        self.extrapolate = yes;
        self
    }

    pub fn zero_if_masked(mut self, yes: bool) -> Self {
        self.zero_if_masked = yes;
        self
    }
}

/// Fill masked runs no longer than `options.max_gap`.
///
/// Fails with [`FdmError::InvalidData`] when nothing is valid, unless
/// `zero_if_masked` asks for an all-zero, all-masked result instead.
pub fn repair_mask(array: &SampleArray, options: RepairOptions) -> FdmResult<SampleArray> {
    ensure_not_empty(array.len(), "repair_mask")?;
    if array.is_fully_masked() {
        if options.zero_if_masked {
            return Ok(SampleArray::masked(array.len()));
        }
        return Err(FdmError::InvalidData(
            "repair_mask: no valid samples to repair from".into(),
        ));
    }
    Ok(fill_runs(array, options.max_gap, options.extrapolate))
}

fn fill_runs(array: &SampleArray, max_gap: Option<usize>, extrapolate: bool) -> SampleArray {
    let mut out = array.clone();
    for run in array.masked_runs() {
        if max_gap.is_some_and(|g| run.len() > g) {
            continue;
        }
        // Runs are maximal, so any neighbour that exists is valid.
        let before = run.start.checked_sub(1).and_then(|i| array.get(i));
        let after = array.get(run.end);
        match (before, after) {
            (Some(a), Some(b)) => {
                let span = (run.len() + 1) as f64;
                for (k, i) in run.enumerate() {
                    let t = (k + 1) as f64 / span;
                    out.set(i, a + (b - a) * t);
                }
            }
            (Some(v), None) | (None, Some(v)) if extrapolate => {
                for i in run {
                    out.set(i, v);
                }
            }
            _ => {}
        }
    }
    out
}

/// Two-pass clip-to-band smoothing.
///
/// The tracked value only moves when the input leaves a window of
/// ±`band_width / 4` around it, first scanning forward and then backward
/// over the forward result. Masked samples are skipped and stay masked.
pub fn hysteresis(array: &SampleArray, band_width: f64) -> FdmResult<SampleArray> {
    ensure_not_empty(array.len(), "hysteresis")?;
    if !band_width.is_finite() || band_width < 0.0 {
        return Err(FdmError::Contract(format!(
            "hysteresis: band width must be finite and >= 0, got {band_width}"
        )));
    }
    if band_width == 0.0 {
        return Ok(array.clone());
    }
    let Some((_, first)) = array.first_valid() else {
        return Ok(array.clone());
    };

    let quarter = band_width / 4.0;
    let valid: Vec<usize> = (0..array.len()).filter(|&i| array.is_valid(i)).collect();
    let mut out = array.clone();

    let mut held = first;
    for &i in &valid {
        if let Some(v) = out.get(i) {
            held = track(held, v, quarter);
            out.set(i, held);
        }
    }

    if let Some(&last) = valid.last() {
        if let Some(v) = out.get(last) {
            held = v;
        }
    }
    for &i in valid.iter().rev() {
        if let Some(v) = out.get(i) {
            held = track(held, v, quarter);
            out.set(i, held);
        }
    }
    Ok(out)
}

#[inline]
fn track(held: f64, new: f64, quarter: f64) -> f64 {
    let delta = new - held;
    if delta > quarter {
        new - quarter
    } else if delta < -quarter {
        new + quarter
    } else {
        held
    }
}

/// Which neighbours [`nearest_neighbour_mask_repair`] may copy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairDirection {
    #[default]
    Both,
    /// Copy the last valid value forward in time.
    Forward,
    /// Copy the next valid value backward in time.
    Backward,
}

impl FromStr for RepairDirection {
    type Err = FdmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both" => Ok(RepairDirection::Both),
            "forward" => Ok(RepairDirection::Forward),
            "backward" => Ok(RepairDirection::Backward),
            other => Err(FdmError::Contract(format!(
                "unknown repair direction '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RepairDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepairDirection::Both => "both",
            RepairDirection::Forward => "forward",
            RepairDirection::Backward => "backward",
        })
    }
}

/// Fill masked samples by copying the nearest valid neighbour.
///
/// `repair_gap_size` caps how many samples one neighbour's value may
/// spread into a gap; with [`RepairDirection::Both`] the cap is split
/// evenly between the two sides. Ties go to the earlier neighbour.
/// Works on continuous values and on state codes alike.
pub fn nearest_neighbour_mask_repair<T: Copy + Default>(
    array: &MaskedArray<T>,
    direction: RepairDirection,
    repair_gap_size: Option<usize>,
) -> FdmResult<MaskedArray<T>> {
    ensure_not_empty(array.len(), "nearest_neighbour_mask_repair")?;
    if array.is_fully_masked() {
        return Ok(array.clone());
    }

    let reach = match (direction, repair_gap_size) {
        (_, None) => usize::MAX,
        (RepairDirection::Both, Some(g)) => g / 2,
        (_, Some(g)) => g,
    };

    let mut out = array.clone();
    for run in array.masked_runs() {
        let before = run.start.checked_sub(1).and_then(|i| array.get(i));
        let after = array.get(run.end);
        let (before, after) = match direction {
            RepairDirection::Both => (before, after),
            RepairDirection::Forward => (before, None),
            RepairDirection::Backward => (None, after),
        };
        for i in run.clone() {
            let from_before = i - run.start + 1;
            let from_after = run.end - i;
            let pick = match (before, after) {
                (Some(b), Some(_)) if from_before <= from_after => Some((b, from_before)),
                (_, Some(a)) => Some((a, from_after)),
                (Some(b), None) => Some((b, from_before)),
                (None, None) => None,
            };
            if let Some((value, distance)) = pick {
                if distance <= reach {
                    out.set(i, value);
                }
            }
        }
    }
    Ok(out)
}
