// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Timebase Alignment
// ─────────────────────────────────────────────────────────────────────
//! Resampling of one parameter (the slave) onto another's timebase (the
//! master).
//!
//! For master sample `j` the slave position is
//!
//! ```text
//! x = (master.offset - slave.offset) * f_slave + j * f_slave / f_master
//! ```
//!
//! A result sample is valid only if every slave sample it was computed
//! from is valid; positions outside the slave array are masked. Nothing
//! is extrapolated.
//!
//! Supported rates follow recorder frame layouts: once the slowest rate
//! is scaled to one sample per frame (one second, or a superframe for
//! rates below 1 Hz), every rate must be a power of two or a multiple of
//! five.

use fdm_types::{FdmError, FdmResult, MaskedArray, Parameter, SampleArray, Samples, Timebase};

/// Positions within this distance of an integer land exactly on a sample.
pub const DEFAULT_SNAP_TOLERANCE: f64 = 1e-9;

const RATE_TOLERANCE: f64 = 1e-9; // relative, for frequency family checks

/// How a resampled value is built from the bracketing slave samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMethod {
    /// Weighted mean of the two bracketing samples.
    Linear,
    /// The time-closer bracketing sample.
    Nearest,
}

/// Maps output sample indices to fractional source positions.
///
/// Performs no compatibility checks; [`align`] validates the timebases
/// before using it, the blending engine uses it directly.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    start: f64,
    from_frequency: f64,
    to_frequency: f64,
    snap: f64,
}

impl Resampler {
    pub fn new(from: Timebase, to: Timebase) -> Self {
        Self {
            start: (to.offset - from.offset) * from.frequency,
            from_frequency: from.frequency,
            to_frequency: to.frequency,
            snap: DEFAULT_SNAP_TOLERANCE,
        }
    }

    pub fn with_snap_tolerance(mut self, tolerance: f64) -> Self {
        self.snap = tolerance;
        self
    }

    /// Source position of output sample `j`.
    #[inline]
    pub fn position(&self, j: usize) -> f64 {
        let x = self.start + (j as f64 * self.from_frequency) / self.to_frequency;
        let nearest = x.round();
        if (x - nearest).abs() <= self.snap {
            nearest
        } else {
            x
        }
    }

    /// Source samples per output sample.
    pub fn step(&self) -> f64 {
        self.from_frequency / self.to_frequency
    }

    /// Linear resample of `source` into `len` output samples.
    pub fn linear(&self, source: &SampleArray, len: usize) -> SampleArray {
        (0..len)
            .map(|j| linear_at(source, self.position(j)))
            .collect()
    }

    /// Nearest-sample resample of `source` into `len` output samples.
    pub fn nearest<T: Copy + Default>(&self, source: &MaskedArray<T>, len: usize) -> MaskedArray<T> {
        (0..len)
            .map(|j| nearest_at(source, self.position(j)))
            .collect()
    }

    /// Resample continuous values with the given method.
    pub fn values(&self, source: &SampleArray, len: usize, method: ResampleMethod) -> SampleArray {
        match method {
            ResampleMethod::Linear => self.linear(source, len),
            ResampleMethod::Nearest => self.nearest(source, len),
        }
    }
}

/// Linear value of `source` at fractional position `x`.
///
/// On an exact sample only that sample is needed; between samples both
/// neighbours must be valid.
pub fn linear_at(source: &SampleArray, x: f64) -> Option<f64> {
    let h = x.floor();
    if h < 0.0 {
        return None;
    }
    let b = x - h;
    let hi = h as usize;
    if b == 0.0 {
        return source.get(hi);
    }
    let lo_value = source.get(hi)?;
    let hi_value = source.get(hi + 1)?;
    Some((1.0 - b) * lo_value + b * hi_value)
}

/// Nearest value of `source` at fractional position `x`.
///
/// Both bracketing samples must exist, even when `x` is exact; only the
/// chosen one has to be valid.
pub fn nearest_at<T: Copy + Default>(source: &MaskedArray<T>, x: f64) -> Option<T> {
    let h = x.floor();
    if h < 0.0 {
        return None;
    }
    let hi = h as usize;
    if hi + 1 >= source.len() {
        return None;
    }
    if x - h < 0.5 {
        source.get(hi)
    } else {
        source.get(hi + 1)
    }
}

fn is_power_of_two(x: f64) -> bool {
    if x <= 0.0 || !x.is_finite() {
        return false;
    }
    let exp = x.log2();
    (exp - exp.round()).abs() < RATE_TOLERANCE
}

fn is_multiple_of_five(x: f64) -> bool {
    let q = x / 5.0;
    q >= 1.0 - RATE_TOLERANCE && (q - q.round()).abs() < RATE_TOLERANCE * q.max(1.0)
}

/// Length of `slave` once aligned onto `master`, after checking that the
/// two timebases can be aligned at all.
pub fn aligned_length(slave: Timebase, master: Timebase, slave_len: usize) -> FdmResult<usize> {
    for tb in [slave, master] {
        if !tb.frequency.is_finite() || tb.frequency <= 0.0 {
            return Err(FdmError::Contract(format!(
                "frequency must be positive and finite, got {}",
                tb.frequency
            )));
        }
    }

    let slowest = slave.frequency.min(master.frequency);
    let frame = if slowest < 1.0 { 1.0 / slowest } else { 1.0 };
    for f in [slave.frequency, master.frequency] {
        let scaled = f * frame;
        if !is_power_of_two(scaled) && !is_multiple_of_five(scaled) {
            return Err(FdmError::Alignment(format!(
                "unsupported rate {f} Hz (must be a power of two or a multiple of five per frame)"
            )));
        }
    }

    let ratio = master.frequency / slave.frequency;
    if !is_power_of_two(ratio) && (slave.offset != 0.0 || master.offset != 0.0) {
        return Err(FdmError::Alignment(format!(
            "offsets must be zero to align {} Hz onto {} Hz",
            slave.frequency, master.frequency
        )));
    }

    let lag = (master.offset - slave.offset).abs();
    if lag > frame + RATE_TOLERANCE {
        return Err(FdmError::Alignment(format!(
            "timing mismatch of {lag}s between {slave} and {master} exceeds one {frame}s frame"
        )));
    }

    let exact = slave_len as f64 * ratio;
    let len = exact.round();
    if (exact - len).abs() > 1e-6 {
        return Err(FdmError::Alignment(format!(
            "aligned length {exact} is not whole; recording not cut on a superframe boundary"
        )));
    }
    Ok(len as usize)
}

/// Resample `slave` onto the `master` timebase.
///
/// Returns `slave` itself (same buffer) when the timebases already match.
/// Multi-state parameters always use the nearest sample and keep their
/// values mapping; continuous ones interpolate unless `interpolate` is
/// false.
pub fn align(slave: &Parameter, master: impl Into<Timebase>, interpolate: bool) -> FdmResult<Parameter> {
    align_with_tolerance(slave, master.into(), interpolate, DEFAULT_SNAP_TOLERANCE)
}

/// [`align`] with an explicit position snap tolerance.
pub fn align_with_tolerance(
    slave: &Parameter,
    master: Timebase,
    interpolate: bool,
    snap_tolerance: f64,
) -> FdmResult<Parameter> {
    let from = slave.timebase();
    if from == master {
        return Ok(slave.clone());
    }

    let len = aligned_length(from, master, slave.len())?;
    let resampler = Resampler::new(from, master).with_snap_tolerance(snap_tolerance);
    log::debug!(
        "align {} from {} onto {} ({} -> {} samples)",
        slave.name(),
        from,
        master,
        slave.len(),
        len
    );

    let method = if interpolate {
        ResampleMethod::Linear
    } else {
        ResampleMethod::Nearest
    };
    let samples = match slave.samples() {
        Samples::Values(values) => Samples::Values(resampler.values(values, len, method).into()),
        Samples::States { states, mapping } => Samples::States {
            states: resampler.nearest(states.as_ref(), len).into(),
            mapping: mapping.clone(),
        },
    };
    Ok(Parameter::from_samples(slave.name(), samples, master))
}

/// Optional half-open index range with optional step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexSlice {
    pub start: Option<usize>,
    pub stop: Option<usize>,
    pub step: Option<usize>,
}

impl IndexSlice {
    pub fn new(start: Option<usize>, stop: Option<usize>) -> Self {
        Self { start, stop, step: None }
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }
}

/// Rescale one index range from the master timebase onto the slave's.
pub fn align_slice(slave: Timebase, master: Timebase, slice: IndexSlice) -> IndexSlice {
    if slave == master {
        return slice;
    }
    let multiplier = slave.frequency / master.frequency;
    let shift = (master.offset - slave.offset) * slave.frequency;
    let rescale = |i: usize| ((i as f64 * multiplier + shift).round().max(0.0)) as usize;
    IndexSlice {
        start: slice.start.map(rescale),
        stop: slice.stop.map(rescale),
        step: slice.step,
    }
}

/// Rescale index ranges found on `master` so they address `slave` samples
/// covering the same time spans. `None` entries pass through.
pub fn align_slices(
    slave: impl Into<Timebase>,
    master: impl Into<Timebase>,
    slices: &[Option<IndexSlice>],
) -> Vec<Option<IndexSlice>> {
    let (slave, master) = (slave.into(), master.into());
    slices
        .iter()
        .map(|s| s.map(|s| align_slice(slave, master, s)))
        .collect()
}
