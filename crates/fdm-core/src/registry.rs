// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Node Registry
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;

use fdm_types::{FdmError, FdmResult};

use crate::node::NodeSpec;

/// Output name → node specification, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    nodes: BTreeMap<String, NodeSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = NodeSpec>) -> FdmResult<Self> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Add a node. Each output name may be registered once.
    pub fn register(&mut self, spec: NodeSpec) -> FdmResult<()> {
        if self.nodes.contains_key(spec.name()) {
            return Err(FdmError::Graph(format!(
                "node '{}' registered twice",
                spec.name()
            )));
        }
        self.nodes.insert(spec.name().to_string(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
