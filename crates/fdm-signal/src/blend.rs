// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Redundant Sensor Blending
// ─────────────────────────────────────────────────────────────────────
//! Fusion of redundant sensors measuring one quantity.
//!
//! Two sensors sampled at the same rate but different phases interleave
//! into a stream at twice the rate. Arbitrary sets of sensors at mixed
//! rates blend onto a common grid by weighted mean, where samples next to
//! a data gap and sensors sampled more slowly count for less.

use fdm_types::{
    BlendConfig, FdmError, FdmResult, MaskedArray, Parameter, SampleArray, Samples, StateArray,
    Timebase,
};

use crate::align::Resampler;

const TIME_TOLERANCE: f64 = 1e-9;

/// Where the masked filler sample goes in a non-equispaced blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Pad at the end; the first pair midpoint is the output offset.
    Follow,
    /// Pad at the start; the output grid begins one period earlier.
    Precede,
}

/// Round-robin interleave of equal-length arrays.
pub fn interleave<T: Copy + Default>(arrays: &[&MaskedArray<T>]) -> MaskedArray<T> {
    let len = arrays.first().map_or(0, |a| a.len());
    (0..len)
        .flat_map(|i| arrays.iter().map(move |a| a.get(i)))
        .collect()
}

fn mean_of(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

fn strict_mean(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some((a? + b?) / 2.0)
}

/// Blend two sensors sampled exactly half a period apart.
///
/// Each interleaved sample is averaged with the mean of its two
/// neighbours, which removes the offset between the sensors without
/// shifting the timebase. The ends use their single neighbour.
pub fn blend_equispaced_sensors(first: &SampleArray, second: &SampleArray) -> SampleArray {
    let both = interleave(&[first, second]);
    let n = both.len();
    (0..n)
        .map(|i| {
            let neighbours = match i {
                0 => both.get(1),
                _ if i == n - 1 => both.get(n - 2),
                _ => strict_mean(both.get(i - 1), both.get(i + 1)),
            };
            mean_of(both.get(i), neighbours)
        })
        .collect()
}

/// Blend two sensors whose phases are not half a period apart.
///
/// Consecutive interleaved samples are averaged, which places each
/// result at the pair midpoint. The one missing sample is padded masked
/// at the end (`Follow`) or the start (`Precede`).
pub fn blend_nonequispaced_sensors(
    first: &SampleArray,
    second: &SampleArray,
    padding: Padding,
) -> SampleArray {
    let both = interleave(&[first, second]);
    let pairs = (0..both.len().saturating_sub(1)).map(|i| strict_mean(both.get(i), both.get(i + 1)));
    match padding {
        Padding::Follow => pairs.chain(std::iter::once(None)).collect(),
        Padding::Precede => std::iter::once(None).chain(pairs).collect(),
    }
}

fn is_stalled(array: &SampleArray, config: &BlendConfig) -> bool {
    array.ptp().is_some_and(|r| r <= config.stall_epsilon)
}

fn same_frequency(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_TOLERANCE * a.abs().max(b.abs())
}

/// Linear resample of `p` onto twice its rate, keeping its phase.
fn upsample_double(p: &Parameter, values: &SampleArray) -> FdmResult<Parameter> {
    let from = p.timebase();
    let half = from.period() / 2.0;
    let to = Timebase::new(from.frequency * 2.0, from.offset.rem_euclid(half))?;
    let out = Resampler::new(from, to).linear(values, values.len() * 2);
    Parameter::new(p.name(), out, to.frequency, to.offset)
}

/// Blend two redundant sensors of equal rate and length into one stream
/// at twice the rate.
///
/// A fully masked sensor leaves the other unblended. A stalled sensor
/// (range within `config.stall_epsilon`) is dropped in favour of a
/// varying one, which is returned upsampled to the doubled rate.
pub fn blend_two_parameters(
    p1: &Parameter,
    p2: &Parameter,
    config: &BlendConfig,
) -> FdmResult<Parameter> {
    let a1 = p1.require_values()?;
    let a2 = p2.require_values()?;
    if !same_frequency(p1.frequency(), p2.frequency()) {
        return Err(FdmError::Contract(format!(
            "cannot blend {} at {} Hz with {} at {} Hz",
            p1.name(),
            p1.frequency(),
            p2.name(),
            p2.frequency()
        )));
    }
    if a1.len() != a2.len() {
        return Err(FdmError::Contract(format!(
            "cannot blend {} ({} samples) with {} ({} samples)",
            p1.name(),
            a1.len(),
            p2.name(),
            a2.len()
        )));
    }

    if a1.is_fully_masked() {
        return Ok(p2.clone());
    }
    if a2.is_fully_masked() {
        return Ok(p1.clone());
    }

    match (is_stalled(a1, config), is_stalled(a2, config)) {
        (true, false) => {
            log::debug!("blend: {} is stalled, using {}", p1.name(), p2.name());
            return upsample_double(p2, a2);
        }
        (false, true) => {
            log::debug!("blend: {} is stalled, using {}", p2.name(), p1.name());
            return upsample_double(p1, a1);
        }
        _ => {}
    }

    let frequency = p1.frequency();
    let period = 1.0 / frequency;
    let half = period / 2.0;
    let (first, second, o1, o2) = if p1.offset() <= p2.offset() {
        (a1, a2, p1.offset(), p2.offset())
    } else {
        (a2, a1, p2.offset(), p1.offset())
    };
    let gap = o2 - o1;
    if gap < TIME_TOLERANCE {
        return Err(FdmError::Contract(format!(
            "cannot blend {} and {}: sampled at the same instant",
            p1.name(),
            p2.name()
        )));
    }
    if gap >= period - TIME_TOLERANCE {
        return Err(FdmError::Alignment(format!(
            "cannot blend {} and {}: offsets {o1}s and {o2}s are a full period apart",
            p1.name(),
            p2.name()
        )));
    }

    let (array, offset) = if (gap - half).abs() < TIME_TOLERANCE {
        (blend_equispaced_sensors(first, second), o1)
    } else {
        let midpoint = (o1 + o2) / 2.0;
        if midpoint < half {
            (blend_nonequispaced_sensors(first, second, Padding::Follow), midpoint)
        } else {
            (blend_nonequispaced_sensors(first, second, Padding::Precede), midpoint - half)
        }
    };
    Parameter::new(p1.name(), array, frequency * 2.0, offset)
}

/// A valid sample with a masked neighbour.
fn is_boundary(valid: &[bool], i: usize) -> bool {
    valid[i] && ((i > 0 && !valid[i - 1]) || valid.get(i + 1) == Some(&false))
}

/// Per-sample trust of one sensor: 0 when masked, `boundary_weight` next
/// to a masked sample, otherwise 1.
fn source_weights(valid: &[bool], boundary_weight: f64) -> Vec<f64> {
    (0..valid.len())
        .map(|i| match (valid[i], is_boundary(valid, i)) {
            (false, _) => 0.0,
            (true, true) => boundary_weight,
            (true, false) => 1.0,
        })
        .collect()
}

/// Linear interpolation of `weights` at `x`, flat beyond either end.
fn weight_at(weights: &[f64], x: f64) -> f64 {
    let Some(last) = weights.len().checked_sub(1) else {
        return 0.0;
    };
    let x = x.clamp(0.0, last as f64);
    let h = x.floor() as usize;
    let b = x - h as f64;
    if h >= last {
        return weights[last];
    }
    (1.0 - b) * weights[h] + b * weights[h + 1]
}

/// Blend weights for one contributor resampled by `frequency_ratio`
/// (output rate / sensor rate), one per output sample.
///
/// Upsampling interpolates the sensor's weights linearly. Interior
/// samples weigh `1 / ratio`, so a sensor at half the output rate counts
/// half as much, while samples next to a gap weigh `boundary * ratio`.
/// Downsampling sums the weights of the sensor samples falling in each
/// output sample.
pub fn blend_parameters_weighting(
    valid: &[bool],
    frequency_ratio: f64,
    config: &BlendConfig,
) -> FdmResult<Vec<f64>> {
    if !frequency_ratio.is_finite() || frequency_ratio <= 0.0 {
        return Err(FdmError::Contract(format!(
            "frequency ratio must be positive and finite, got {frequency_ratio}"
        )));
    }
    let boundary = config.boundary_weight;
    let len = (valid.len() as f64 * frequency_ratio + TIME_TOLERANCE).floor() as usize;

    if frequency_ratio >= 1.0 {
        let scaled: Vec<f64> = (0..valid.len())
            .map(|i| match (valid[i], is_boundary(valid, i)) {
                (false, _) => 0.0,
                (true, true) => boundary * frequency_ratio,
                (true, false) => 1.0 / frequency_ratio,
            })
            .collect();
        return Ok((0..len)
            .map(|j| weight_at(&scaled, j as f64 / frequency_ratio))
            .collect());
    }

    let src = source_weights(valid, boundary);
    let window = frequency_ratio.recip();
    Ok((0..len)
        .map(|j| {
            let lo = (j as f64 * window + TIME_TOLERANCE).floor() as usize;
            let hi = ((((j + 1) as f64) * window + TIME_TOLERANCE).floor() as usize).min(src.len());
            src.get(lo..hi).map_or(0.0, |w| w.iter().sum())
        })
        .collect())
}

/// Natural cubic spline through one sensor's valid samples.
struct Spline {
    knots: Vec<f64>,
    values: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl Spline {
    /// `None` when the sensor has no valid sample.
    fn fit(p: &Parameter, values: &SampleArray) -> Option<Self> {
        let (knots, values): (Vec<f64>, Vec<f64>) = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (p.offset() + i as f64 / p.frequency(), v)))
            .unzip();
        let n = knots.len().checked_sub(1)?;
        let h: Vec<f64> = knots.windows(2).map(|k| k[1] - k[0]).collect();

        // Tridiagonal solve for the second-derivative terms, zero at both ends.
        let mut mu = vec![0.0; n + 1];
        let mut z = vec![0.0; n + 1];
        for i in 1..n {
            let alpha = 3.0 / h[i] * (values[i + 1] - values[i])
                - 3.0 / h[i - 1] * (values[i] - values[i - 1]);
            let l = 2.0 * (knots[i + 1] - knots[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l;
            z[i] = (alpha - h[i - 1] * z[i - 1]) / l;
        }
        let mut c = vec![0.0; n + 1];
        let mut b = vec![0.0; n];
        let mut d = vec![0.0; n];
        for i in (0..n).rev() {
            c[i] = z[i] - mu[i] * c[i + 1];
            b[i] = (values[i + 1] - values[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0;
            d[i] = (c[i + 1] - c[i]) / (3.0 * h[i]);
        }
        Some(Self { knots, values, b, c, d })
    }

    /// Value at time `t`; `None` outside the span of valid samples.
    fn at(&self, t: f64) -> Option<f64> {
        let (first, last) = (self.knots[0], self.knots[self.knots.len() - 1]);
        if t < first - TIME_TOLERANCE || t > last + TIME_TOLERANCE {
            return None;
        }
        if self.b.is_empty() {
            return Some(self.values[0]);
        }
        let i = self
            .knots
            .partition_point(|&k| k <= t)
            .saturating_sub(1)
            .min(self.b.len() - 1);
        let dx = t - self.knots[i];
        Some(self.values[i] + dx * (self.b[i] + dx * (self.c[i] + dx * self.d[i])))
    }
}

/// Blend any number of redundant sensors onto one grid.
///
/// `None` entries and fully masked sensors are ignored, and so are
/// stalled sensors while a varying one remains. The grid defaults to the
/// highest contributing rate at zero offset. Each sensor is interpolated
/// by a natural cubic spline through its valid samples and weighted per
/// output sample by [`blend_parameters_weighting`]. An output sample with
/// no weight is masked.
pub fn blend_parameters(
    params: &[Option<&Parameter>],
    offset: Option<f64>,
    frequency: Option<f64>,
    config: &BlendConfig,
) -> FdmResult<Parameter> {
    let present: Vec<&Parameter> = params.iter().flatten().copied().collect();
    let Some(&lead) = present.first() else {
        return Err(FdmError::Contract("blend_parameters: no parameters to blend".into()));
    };

    let mut candidates = Vec::with_capacity(present.len());
    for p in &present {
        let values = p.require_values()?;
        if values.is_fully_masked() {
            log::debug!("blend: dropping fully masked {}", p.name());
            continue;
        }
        candidates.push((*p, values, is_stalled(values, config)));
    }
    if candidates.iter().any(|(_, _, stalled)| !stalled) {
        candidates.retain(|(p, _, stalled)| {
            if *stalled {
                log::debug!("blend: dropping stalled {}", p.name());
            }
            !stalled
        });
    }

    let frequency = match frequency {
        Some(f) => f,
        None => present
            .iter()
            .map(|p| p.frequency())
            .fold(f64::NEG_INFINITY, f64::max),
    };
    let target = Timebase::new(frequency, offset.unwrap_or(0.0))?;
    if target.offset < 0.0 || target.offset >= target.period() {
        return Err(FdmError::Contract(format!(
            "blend offset {}s outside one {}s sample period",
            target.offset,
            target.period()
        )));
    }

    let len = present
        .iter()
        .map(|p| (p.len() as f64 * frequency / p.frequency() + TIME_TOLERANCE).floor() as usize)
        .max()
        .unwrap_or(0);

    let mut weighted = vec![0.0; len];
    let mut total = vec![0.0; len];
    for (p, values, _) in &candidates {
        let Some(spline) = Spline::fit(p, values) else {
            continue;
        };
        let weights =
            blend_parameters_weighting(values.validity(), frequency / p.frequency(), config)?;
        for (j, &w) in weights.iter().enumerate().take(len) {
            if w <= 0.0 {
                continue;
            }
            let Some(v) = spline.at(target.offset + j as f64 / frequency) else {
                continue;
            };
            weighted[j] += w * v;
            total[j] += w;
        }
    }

    let array: SampleArray = weighted
        .into_iter()
        .zip(total)
        .map(|(wv, w)| (w > 0.0).then(|| wv / w))
        .collect();
    Parameter::new(lead.name(), array, target.frequency, target.offset)
}

fn check_same_rate(params: &[&Parameter], op: &str) -> FdmResult<()> {
    let first = params[0];
    for p in &params[1..] {
        if !same_frequency(first.frequency(), p.frequency()) {
            return Err(FdmError::Contract(format!(
                "{op}: {} at {} Hz differs from {} at {} Hz",
                p.name(),
                p.frequency(),
                first.name(),
                first.frequency()
            )));
        }
    }
    Ok(())
}

enum Kind<'a> {
    Values(Vec<&'a SampleArray>),
    States(Vec<&'a StateArray>, &'a fdm_types::ValuesMapping),
}

/// All continuous, or all multi-state with one shared mapping.
fn classify<'a>(params: &[&'a Parameter], op: &str) -> FdmResult<Kind<'a>> {
    if params.iter().all(|p| !p.is_multistate()) {
        return Ok(Kind::Values(params.iter().filter_map(|&p| p.values()).collect()));
    }
    let mut states = Vec::with_capacity(params.len());
    let mut mapping = None;
    for &p in params {
        match p.samples() {
            Samples::States { states: s, mapping: m } => {
                match mapping {
                    None => mapping = Some(m.as_ref()),
                    Some(seen) if seen != m.as_ref() => {
                        return Err(FdmError::Contract(format!(
                            "{op}: values mapping of {} differs",
                            p.name()
                        )));
                    }
                    Some(_) => {}
                }
                states.push(s.as_ref());
            }
            Samples::Values(_) => {
                return Err(FdmError::Contract(format!(
                    "{op}: cannot mix multi-state and continuous parameters"
                )));
            }
        }
    }
    match mapping {
        Some(m) => Ok(Kind::States(states, m)),
        None => Err(FdmError::Contract(format!("{op}: no parameters"))),
    }
}

/// Interleave equal-rate, equal-length sensors that are already staggered
/// on a shared finer grid. The result runs at `n` times the rate with the
/// first sensor's offset.
pub fn merge_sources(params: &[&Parameter]) -> FdmResult<Parameter> {
    let Some(&first) = params.first() else {
        return Err(FdmError::Contract("merge_sources: no parameters".into()));
    };
    check_same_rate(params, "merge_sources")?;
    if let Some(p) = params.iter().find(|p| p.len() != first.len()) {
        return Err(FdmError::Contract(format!(
            "merge_sources: {} has {} samples, {} has {}",
            p.name(),
            p.len(),
            first.name(),
            first.len()
        )));
    }

    let timebase = Timebase::new(first.frequency() * params.len() as f64, first.offset())?;
    let samples = match classify(params, "merge_sources")? {
        Kind::Values(arrays) => Samples::Values(interleave(&arrays).into()),
        Kind::States(arrays, mapping) => Samples::States {
            states: interleave(&arrays).into(),
            mapping: mapping.clone().into(),
        },
    };
    Ok(Parameter::from_samples(first.name(), samples, timebase))
}

fn join<T: Copy + Default>(arrays: &[&MaskedArray<T>]) -> MaskedArray<T> {
    arrays.iter().flat_map(|a| a.iter()).collect()
}

/// Join parameters end to end; `None` for an empty list.
pub fn concatenate(params: &[&Parameter]) -> FdmResult<Option<Parameter>> {
    let Some(&first) = params.first() else {
        return Ok(None);
    };
    check_same_rate(params, "concatenate")?;
    let samples = match classify(params, "concatenate")? {
        Kind::Values(arrays) => Samples::Values(join(&arrays).into()),
        Kind::States(arrays, mapping) => Samples::States {
            states: join(&arrays).into(),
            mapping: mapping.clone().into(),
        },
    };
    Ok(Some(Parameter::from_samples(first.name(), samples, first.timebase())))
}
