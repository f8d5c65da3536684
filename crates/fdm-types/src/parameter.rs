// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Parameters and Timebases
// ─────────────────────────────────────────────────────────────────────
//! A parameter is one named channel: masked samples plus the timebase
//! that places sample `i` at `offset + i / frequency` seconds from the
//! start of the recording.
//!
//! Sample buffers are reference counted. Cloning a parameter, or
//! aligning it onto its own timebase, shares the buffer instead of
//! copying it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FdmError, FdmResult};
use crate::masked::{SampleArray, StateArray};

/// Integer state code → label (e.g. `0 → "Air"`, `1 → "Ground"`).
pub type ValuesMapping = BTreeMap<i64, String>;

/// Sample rate and phase of a regular sample grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimebaseRepr")]
pub struct Timebase {
    /// Hz; fractional for superframe parameters.
    pub frequency: f64,
    /// Seconds from recording start to the first sample.
    pub offset: f64,
}

impl Timebase {
    pub fn new(frequency: f64, offset: f64) -> FdmResult<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(FdmError::Contract(format!(
                "frequency must be positive and finite, got {frequency}"
            )));
        }
        if !offset.is_finite() {
            return Err(FdmError::Contract(format!(
                "offset must be finite, got {offset}"
            )));
        }
        Ok(Self { frequency, offset })
    }

    /// Seconds between samples.
    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Time of sample `index` relative to recording start.
    pub fn time_of(&self, index: usize) -> f64 {
        self.offset + index as f64 / self.frequency
    }
}

#[derive(Deserialize)]
struct TimebaseRepr {
    frequency: f64,
    offset: f64,
}

impl TryFrom<TimebaseRepr> for Timebase {
    type Error = FdmError;

    fn try_from(repr: TimebaseRepr) -> FdmResult<Self> {
        Timebase::new(repr.frequency, repr.offset)
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz@{}s", self.frequency, self.offset)
    }
}

impl From<&Parameter> for Timebase {
    fn from(p: &Parameter) -> Self {
        p.timebase
    }
}

/// Continuous values or discrete state codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SamplesRepr")]
pub enum Samples {
    Values(Arc<SampleArray>),
    States {
        states: Arc<StateArray>,
        mapping: Arc<ValuesMapping>,
    },
}

#[derive(Deserialize)]
enum SamplesRepr {
    Values(Arc<SampleArray>),
    States {
        states: Arc<StateArray>,
        mapping: Arc<ValuesMapping>,
    },
}

impl TryFrom<SamplesRepr> for Samples {
    type Error = FdmError;

    fn try_from(repr: SamplesRepr) -> FdmResult<Self> {
        match repr {
            SamplesRepr::Values(values) => Ok(Samples::Values(values)),
            SamplesRepr::States { states, mapping } => {
                check_mapping("samples", &states, &mapping)?;
                Ok(Samples::States { states, mapping })
            }
        }
    }
}

/// Every valid code in `states` must have a label.
fn check_mapping(name: &str, states: &StateArray, mapping: &ValuesMapping) -> FdmResult<()> {
    match states.iter().flatten().find(|c| !mapping.contains_key(c)) {
        Some(code) => Err(FdmError::Contract(format!(
            "{name}: state {code} missing from values mapping"
        ))),
        None => Ok(()),
    }
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Values(v) => v.len(),
            Samples::States { states, .. } => states.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validity(&self) -> &[bool] {
        match self {
            Samples::Values(v) => v.validity(),
            Samples::States { states, .. } => states.validity(),
        }
    }
}

/// One named channel on a fixed timebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    samples: Samples,
    timebase: Timebase,
}

impl Parameter {
    /// Continuous parameter.
    pub fn new(
        name: impl Into<String>,
        values: SampleArray,
        frequency: f64,
        offset: f64,
    ) -> FdmResult<Self> {
        Ok(Self {
            name: name.into(),
            samples: Samples::Values(Arc::new(values)),
            timebase: Timebase::new(frequency, offset)?,
        })
    }

    /// Multi-state parameter. Every valid code must appear in `mapping`.
    pub fn multistate(
        name: impl Into<String>,
        states: StateArray,
        mapping: ValuesMapping,
        frequency: f64,
        offset: f64,
    ) -> FdmResult<Self> {
        let name = name.into();
        check_mapping(&name, &states, &mapping)?;
        Ok(Self {
            name,
            samples: Samples::States {
                states: Arc::new(states),
                mapping: Arc::new(mapping),
            },
            timebase: Timebase::new(frequency, offset)?,
        })
    }

    /// Assemble from parts already known to be consistent.
    pub fn from_samples(name: impl Into<String>, samples: Samples, timebase: Timebase) -> Self {
        Self {
            name: name.into(),
            samples,
            timebase,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> f64 {
        self.timebase.frequency
    }

    pub fn offset(&self) -> f64 {
        self.timebase.offset
    }

    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recorded span in seconds.
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.timebase.frequency
    }

    pub fn is_multistate(&self) -> bool {
        matches!(self.samples, Samples::States { .. })
    }

    /// Continuous values; `None` for a multi-state parameter.
    pub fn values(&self) -> Option<&SampleArray> {
        match &self.samples {
            Samples::Values(v) => Some(v),
            Samples::States { .. } => None,
        }
    }

    /// Continuous values, or a contract error naming the parameter.
    pub fn require_values(&self) -> FdmResult<&SampleArray> {
        self.values().ok_or_else(|| {
            FdmError::Contract(format!("{} is multi-state, expected values", self.name))
        })
    }

    pub fn states(&self) -> Option<&StateArray> {
        match &self.samples {
            Samples::States { states, .. } => Some(states),
            Samples::Values(_) => None,
        }
    }

    pub fn values_mapping(&self) -> Option<&ValuesMapping> {
        match &self.samples {
            Samples::States { mapping, .. } => Some(mapping),
            Samples::Values(_) => None,
        }
    }

    /// Label of the state at `index`, if valid and mapped.
    pub fn state_label(&self, index: usize) -> Option<&str> {
        let code = self.states()?.get(index)?;
        self.values_mapping()?.get(&code).map(String::as_str)
    }

    pub fn validity(&self) -> &[bool] {
        self.samples.validity()
    }

    pub fn count_valid(&self) -> usize {
        self.validity().iter().filter(|&&v| v).count()
    }

    pub fn is_fully_masked(&self) -> bool {
        !self.validity().iter().any(|&v| v)
    }

    /// Same samples and timebase under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: self.samples.clone(),
            timebase: self.timebase,
        }
    }

    /// True when both parameters share one sample buffer.
    pub fn shares_buffer_with(&self, other: &Parameter) -> bool {
        match (&self.samples, &other.samples) {
            (Samples::Values(a), Samples::Values(b)) => Arc::ptr_eq(a, b),
            (Samples::States { states: a, .. }, Samples::States { states: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}
