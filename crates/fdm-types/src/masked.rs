// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Masked Sample Arrays
// ─────────────────────────────────────────────────────────────────────
//! Fixed-length value buffers with a parallel validity mask.
//!
//! A masked sample's stored value is meaningless. The API never returns
//! it: element reads yield `Option<T>`, and masking a sample resets the
//! stored value to `T::default()`.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{FdmError, FdmResult};

/// Continuous samples (engineering units).
pub type SampleArray = MaskedArray<f64>;

/// Discrete state codes, interpreted through a values mapping.
pub type StateArray = MaskedArray<i64>;

#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray<T> {
    data: Vec<T>,
    valid: Vec<bool>,
}

#[derive(Serialize, Deserialize)]
struct MaskedArrayRepr<T> {
    data: Vec<T>,
    valid: Vec<bool>,
}

impl<T: Copy + Default> MaskedArray<T> {
    /// Build from values and validity flags of equal length.
    pub fn new(data: Vec<T>, valid: Vec<bool>) -> FdmResult<Self> {
        if data.len() != valid.len() {
            return Err(FdmError::Contract(format!(
                "data length {} differs from mask length {}",
                data.len(),
                valid.len()
            )));
        }
        let mut array = Self { data, valid };
        array.scrub();
        Ok(array)
    }

    /// Every sample valid.
    pub fn from_values(data: Vec<T>) -> Self {
        let valid = vec![true; data.len()];
        Self { data, valid }
    }

    /// `None` entries become masked samples.
    pub fn from_options<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
    {
        let (data, valid) = samples
            .into_iter()
            .map(|s| match s {
                Some(v) => (v, true),
                None => (T::default(), false),
            })
            .unzip();
        Self { data, valid }
    }

    /// A fully masked array of `len` default values.
    pub fn masked(len: usize) -> Self {
        Self {
            data: vec![T::default(); len],
            valid: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `i`, or `None` when masked or out of range.
    #[inline]
    pub fn get(&self, i: usize) -> Option<T> {
        match self.valid.get(i) {
            Some(true) => Some(self.data[i]),
            _ => None,
        }
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.valid.get(i).copied().unwrap_or(false)
    }

    /// Store a valid value at `i`. Out-of-range indices are ignored.
    pub fn set(&mut self, i: usize, value: T) {
        if i < self.data.len() {
            self.data[i] = value;
            self.valid[i] = true;
        }
    }

    /// Write `Some(v)` as valid or `None` as masked.
    pub fn put(&mut self, i: usize, value: Option<T>) {
        match value {
            Some(v) => self.set(i, v),
            None => self.mask(i),
        }
    }

    pub fn mask(&mut self, i: usize) {
        if i < self.data.len() {
            self.data[i] = T::default();
            self.valid[i] = false;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        self.data
            .iter()
            .zip(&self.valid)
            .map(|(&v, &ok)| if ok { Some(v) } else { None })
    }

    /// Validity flags, one per sample.
    pub fn validity(&self) -> &[bool] {
        &self.valid
    }

    pub fn count_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    pub fn is_fully_masked(&self) -> bool {
        !self.valid.iter().any(|&v| v)
    }

    pub fn is_fully_valid(&self) -> bool {
        self.valid.iter().all(|&v| v)
    }

    /// Values with every masked sample replaced by `fill`.
    pub fn filled(&self, fill: T) -> Vec<T> {
        self.iter().map(|s| s.unwrap_or(fill)).collect()
    }

    pub fn first_valid(&self) -> Option<(usize, T)> {
        self.valid.iter().position(|&v| v).map(|i| (i, self.data[i]))
    }

    pub fn last_valid(&self) -> Option<(usize, T)> {
        self.valid.iter().rposition(|&v| v).map(|i| (i, self.data[i]))
    }

    /// Maximal runs of consecutive masked samples, in order.
    pub fn masked_runs(&self) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut start = None;
        for (i, &ok) in self.valid.iter().enumerate() {
            match (ok, start) {
                (false, None) => start = Some(i),
                (true, Some(s)) => {
                    runs.push(s..i);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push(s..self.valid.len());
        }
        runs
    }

    /// Apply `f` to every valid value; masked samples stay masked.
    pub fn map<U, F>(&self, mut f: F) -> MaskedArray<U>
    where
        U: Copy + Default,
        F: FnMut(T) -> U,
    {
        MaskedArray::from_options(self.iter().map(|s| s.map(&mut f)))
    }

    /// Element-wise combination; a sample is valid only where both are.
    pub fn zip_with<U, V, F>(&self, other: &MaskedArray<U>, mut f: F) -> FdmResult<MaskedArray<V>>
    where
        U: Copy + Default,
        V: Copy + Default,
        F: FnMut(T, U) -> V,
    {
        if self.len() != other.len() {
            return Err(FdmError::Contract(format!(
                "array lengths differ: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        Ok(MaskedArray::from_options(
            self.iter()
                .zip(other.iter())
                .map(|(a, b)| Some(f(a?, b?))),
        ))
    }

    /// Samples `range`, clamped to the array bounds.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            data: self.data[start..end].to_vec(),
            valid: self.valid[start..end].to_vec(),
        }
    }

    fn scrub(&mut self) {
        for (v, &ok) in self.data.iter_mut().zip(&self.valid) {
            if !ok {
                *v = T::default();
            }
        }
    }
}

impl MaskedArray<f64> {
    /// Peak-to-peak range of the valid samples.
    pub fn ptp(&self) -> Option<f64> {
        let mut valid = self.iter().flatten();
        let first = valid.next()?;
        let (lo, hi) = valid.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(hi - lo)
    }

    pub fn mean(&self) -> Option<f64> {
        let (sum, n) = self
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

impl<T: Copy + Default> FromIterator<Option<T>> for MaskedArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        Self::from_options(iter)
    }
}

impl<T: Copy + Default + Serialize> Serialize for MaskedArray<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MaskedArrayRepr {
            data: self.data.clone(),
            valid: self.valid.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: Copy + Default + Deserialize<'de>> Deserialize<'de> for MaskedArray<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = MaskedArrayRepr::<T>::deserialize(deserializer)?;
        MaskedArray::new(repr.data, repr.valid).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SampleArray {
        SampleArray::from_options([Some(1.0), None, None, Some(4.0), None])
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            SampleArray::new(vec![1.0, 2.0], vec![true]),
            Err(FdmError::Contract(_))
        ));
    }

    #[test]
    fn test_masked_values_are_scrubbed() {
        let a = SampleArray::new(vec![1.0, 99.0, 3.0], vec![true, false, true]).unwrap();
        assert_eq!(a.get(1), None);
        assert_eq!(a.filled(0.0), vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_get_out_of_range() {
        assert_eq!(sample().get(10), None);
        assert!(!sample().is_valid(10));
    }

    #[test]
    fn test_masked_runs() {
        assert_eq!(sample().masked_runs(), vec![1..3, 4..5]);
        assert!(SampleArray::from_values(vec![1.0]).masked_runs().is_empty());
        assert_eq!(SampleArray::masked(3).masked_runs(), vec![0..3]);
    }

    #[test]
    fn test_first_last_valid() {
        assert_eq!(sample().first_valid(), Some((0, 1.0)));
        assert_eq!(sample().last_valid(), Some((3, 4.0)));
        assert_eq!(SampleArray::masked(2).first_valid(), None);
    }

    #[test]
    fn test_zip_with_combines_masks() {
        let a = SampleArray::from_options([Some(1.0), Some(2.0), None]);
        let b = SampleArray::from_options([Some(10.0), None, Some(30.0)]);
        let c = a.zip_with(&b, |x, y| x + y).unwrap();
        assert_eq!(c.get(0), Some(11.0));
        assert_eq!(c.get(1), None);
        assert_eq!(c.get(2), None);
    }

    #[test]
    fn test_set_and_mask() {
        let mut a = SampleArray::masked(2);
        a.set(0, 5.0);
        assert_eq!(a.get(0), Some(5.0));
        a.mask(0);
        assert_eq!(a.get(0), None);
        assert_eq!(a.filled(-1.0), vec![-1.0, -1.0]);
    }

    #[test]
    fn test_ptp_ignores_masked() {
        let a = SampleArray::new(vec![1.0, 500.0, 3.0], vec![true, false, true]).unwrap();
        assert!((a.ptp().unwrap() - 2.0).abs() < 1e-12);
        assert!(SampleArray::masked(3).ptp().is_none());
    }

    #[test]
    fn test_serde_round_trip_checks_lengths() {
        let json = r#"{"data":[1.0,2.0],"valid":[true]}"#;
        assert!(serde_json::from_str::<SampleArray>(json).is_err());

        let a = sample();
        let text = serde_json::to_string(&a).unwrap();
        let back: SampleArray = serde_json::from_str(&text).unwrap();
        assert_eq!(a, back);
    }
}
