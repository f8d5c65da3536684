// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Recorded Parameter Sources
// ─────────────────────────────────────────────────────────────────────
//! Boundary to the flight archive.
//!
//! The in-memory backend serves tests and callers that have already
//! decoded a recording. Archive readers plug in through the
//! `ParameterSource` trait, or through `ExternalSource` when lookups are
//! delegated to a closure.

use std::collections::{BTreeSet, HashMap};

use fdm_types::{Attributes, Parameter};

/// Trait for recorded-parameter backends.
pub trait ParameterSource: Send + Sync {
    /// Recorded parameter by name.
    fn lookup(&self, name: &str) -> Option<Parameter>;

    /// Names of every recorded parameter.
    fn available_names(&self) -> BTreeSet<String>;

    /// Aircraft and recording attributes.
    fn attributes(&self) -> &Attributes;
}

/// Decoded recording held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecording {
    parameters: HashMap<String, Parameter>,
    attributes: Attributes,
}

impl InMemoryRecording {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            parameters: HashMap::new(),
            attributes,
        }
    }

    pub fn with_parameters(
        parameters: impl IntoIterator<Item = Parameter>,
        attributes: Attributes,
    ) -> Self {
        let mut recording = Self::new(attributes);
        for p in parameters {
            recording.insert(p);
        }
        recording
    }

    /// Add or replace a parameter, returning the one it replaced.
    pub fn insert(&mut self, parameter: Parameter) -> Option<Parameter> {
        self.parameters.insert(parameter.name().to_string(), parameter)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl ParameterSource for InMemoryRecording {
    fn lookup(&self, name: &str) -> Option<Parameter> {
        self.parameters.get(name).cloned()
    }

    fn available_names(&self) -> BTreeSet<String> {
        self.parameters.keys().cloned().collect()
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

type LookupFn = Box<dyn Fn(&str) -> Option<Parameter> + Send + Sync>;

/// Source that delegates lookups to a closure over a known name list.
pub struct ExternalSource {
    names: BTreeSet<String>,
    attributes: Attributes,
    lookup_fn: LookupFn,
}

impl ExternalSource {
    pub fn new(
        names: impl IntoIterator<Item = String>,
        attributes: Attributes,
        lookup_fn: impl Fn(&str) -> Option<Parameter> + Send + Sync + 'static,
    ) -> Self {
        Self {
            names: names.into_iter().collect(),
            attributes,
            lookup_fn: Box::new(lookup_fn),
        }
    }
}

impl ParameterSource for ExternalSource {
    fn lookup(&self, name: &str) -> Option<Parameter> {
        if !self.names.contains(name) {
            return None;
        }
        (self.lookup_fn)(name)
    }

    fn available_names(&self) -> BTreeSet<String> {
        self.names.clone()
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdm_types::SampleArray;

    fn param(name: &str) -> Parameter {
        Parameter::new(name, SampleArray::from_values(vec![1.0, 2.0]), 1.0, 0.0).unwrap()
    }

    #[test]
    fn test_in_memory_lookup() {
        let recording =
            InMemoryRecording::with_parameters([param("Pitch"), param("Roll")], Attributes::default());
        assert_eq!(recording.len(), 2);
        assert!(recording.lookup("Pitch").is_some());
        assert!(recording.lookup("Heading").is_none());
        let names: Vec<_> = recording.available_names().into_iter().collect();
        assert_eq!(names, vec!["Pitch".to_string(), "Roll".to_string()]);
    }

    #[test]
    fn test_insert_replaces() {
        let mut recording = InMemoryRecording::default();
        assert!(recording.insert(param("Pitch")).is_none());
        assert!(recording.insert(param("Pitch")).is_some());
        assert_eq!(recording.len(), 1);
    }

    #[test]
    fn test_lookup_shares_buffer() {
        let recording = InMemoryRecording::with_parameters([param("Pitch")], Attributes::default());
        let a = recording.lookup("Pitch").unwrap();
        let b = recording.lookup("Pitch").unwrap();
        assert!(a.shares_buffer_with(&b));
    }

    #[test]
    fn test_external_source() {
        let source = ExternalSource::new(
            ["Pitch".to_string()],
            Attributes::default(),
            |name| Some(param(name)),
        );
        assert!(source.lookup("Pitch").is_some());
        assert!(source.lookup("Roll").is_none());
        assert_eq!(source.available_names().len(), 1);
    }
}
