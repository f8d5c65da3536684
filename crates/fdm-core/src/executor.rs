// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Graph Executor
// ─────────────────────────────────────────────────────────────────────
//! Runs a [`DerivationGraph`] against one recording.
//!
//! Levels run in order. Nodes inside a level are independent and may run
//! on the executor's rayon pool. A failing node is recorded as `Failed`;
//! its dependants are re-checked against what actually exists and end up
//! `Skipped` when no operational combination survives.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use fdm_types::{Attributes, EngineConfig, FdmError, FdmResult, Parameter};

use crate::graph::{DerivationGraph, SkipReason};
use crate::node::NodeSpec;
use crate::recording::ParameterSource;
use crate::registry::Registry;

/// Lifecycle of one node within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeState {
    Unevaluated,
    Skipped(SkipReason),
    Aligning,
    Derived,
    Failed(String),
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeState::Unevaluated | NodeState::Aligning)
    }
}

/// Outcome of one run: derived parameters and the final state of every
/// registered node.
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    outputs: BTreeMap<String, Parameter>,
    states: BTreeMap<String, NodeState>,
}

impl Derivation {
    /// Derived parameter by name. Recorded parameters are not repeated here.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.outputs.get(name)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Parameter> {
        &self.outputs
    }

    pub fn state(&self, name: &str) -> Option<&NodeState> {
        self.states.get(name)
    }

    pub fn states(&self) -> &BTreeMap<String, NodeState> {
        &self.states
    }

    pub fn derived_count(&self) -> usize {
        self.outputs.len()
    }

    /// Failed nodes with their reasons.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.states.iter().filter_map(|(name, state)| match state {
            NodeState::Failed(reason) => Some((name.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, NodeState::Skipped(_)))
            .count()
    }

    pub fn into_outputs(self) -> BTreeMap<String, Parameter> {
        self.outputs
    }
}

/// Executes the registry's nodes for a recording.
pub struct Executor {
    registry: Arc<Registry>,
    config: EngineConfig,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("nodes", &self.registry.len())
            .field("config", &self.config)
            .field("workers", &self.pool.as_ref().map(rayon::ThreadPool::current_num_threads))
            .finish()
    }
}

/// Mutable state shared by the nodes of one run.
struct RunState<'s> {
    source: &'s dyn ParameterSource,
    recorded: BTreeSet<String>,
    store: RwLock<BTreeMap<String, Parameter>>,
    states: Mutex<BTreeMap<String, NodeState>>,
}

impl Executor {
    /// Validates `config` and builds the worker pool when running in
    /// parallel.
    pub fn new(registry: impl Into<Arc<Registry>>, config: EngineConfig) -> FdmResult<Self> {
        config.validate()?;
        let pool = if config.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.max_workers)
                .thread_name(|i| format!("fdm-worker-{i}"))
                .build()
                .map_err(|e| FdmError::Config(format!("thread pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            registry: registry.into(),
            config,
            pool,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Derive every node the recording can feed.
    pub fn run(&self, source: &dyn ParameterSource) -> FdmResult<Derivation> {
        self.execute(source, None)
    }

    /// Derive `required` outputs and whatever they depend on.
    pub fn run_for(&self, source: &dyn ParameterSource, required: &[&str]) -> FdmResult<Derivation> {
        self.execute(source, Some(required))
    }

    fn execute(
        &self,
        source: &dyn ParameterSource,
        required: Option<&[&str]>,
    ) -> FdmResult<Derivation> {
        let recorded = source.available_names();
        let attributes = source.attributes();
        let graph = DerivationGraph::build_for(&self.registry, &recorded, attributes, required)?;

        let mut states: BTreeMap<String, NodeState> = self
            .registry
            .names()
            .map(|n| (n.to_string(), NodeState::Unevaluated))
            .collect();
        for (name, reason) in graph.skipped() {
            states.insert(name.clone(), NodeState::Skipped(*reason));
        }

        let run = RunState {
            source,
            recorded,
            store: RwLock::new(BTreeMap::new()),
            states: Mutex::new(states),
        };

        for (depth, level) in graph.levels().iter().enumerate() {
            let available = run.available(attributes);
            log::debug!("level {depth}: {} node(s)", level.len());
            let specs: Vec<&NodeSpec> = level.iter().filter_map(|n| self.registry.get(n)).collect();
            match &self.pool {
                Some(pool) if specs.len() > 1 => pool.install(|| {
                    specs
                        .par_iter()
                        .for_each(|spec| self.evaluate(spec, &run, &available))
                }),
                _ => specs
                    .iter()
                    .for_each(|spec| self.evaluate(spec, &run, &available)),
            }
        }

        let derivation = Derivation {
            outputs: run.store.into_inner(),
            states: run.states.into_inner(),
        };
        log::info!(
            "derivation complete: {} derived, {} skipped, {} failed",
            derivation.derived_count(),
            derivation.skipped_count(),
            derivation.failed().count()
        );
        Ok(derivation)
    }

    fn evaluate(&self, spec: &NodeSpec, run: &RunState<'_>, available: &BTreeSet<String>) {
        let name = spec.name();
        let attributes = run.source.attributes();
        if !spec.can_operate(available, attributes) {
            log::debug!("node {name}: skipped ({})", SkipReason::UpstreamUnavailable);
            run.set_state(name, NodeState::Skipped(SkipReason::UpstreamUnavailable));
            return;
        }

        run.set_state(name, NodeState::Aligning);
        let args = spec
            .dependency_names()
            .map(|dep| run.fetch(dep))
            .collect::<Vec<_>>();

        let result = spec
            .get_derived(args, attributes, &self.config)
            .and_then(|p| self.check_duration(p, attributes));
        match result {
            Ok(parameter) => {
                run.store.write().insert(name.to_string(), parameter);
                run.set_state(name, NodeState::Derived);
            }
            Err(e) => {
                let err = FdmError::Derive {
                    node: name.to_string(),
                    reason: e.to_string(),
                };
                log::warn!("{err}");
                run.set_state(name, NodeState::Failed(e.to_string()));
            }
        }
    }

    /// Output length must cover the recording within one sample.
    fn check_duration(&self, parameter: Parameter, attributes: &Attributes) -> FdmResult<Parameter> {
        let Some(duration) = attributes.duration_s.filter(|_| self.config.check_duration) else {
            return Ok(parameter);
        };
        let expected = duration * parameter.frequency();
        if (parameter.len() as f64 - expected).abs() > 1.0 {
            return Err(FdmError::Contract(format!(
                "{} samples at {}Hz do not cover {duration}s",
                parameter.len(),
                parameter.frequency()
            )));
        }
        Ok(parameter)
    }
}

impl RunState<'_> {
    /// Names a node may depend on at this point in the run.
    fn available(&self, attributes: &Attributes) -> BTreeSet<String> {
        let mut names = self.recorded.clone();
        names.extend(self.store.read().keys().cloned());
        names.extend(attributes.present().map(|a| a.as_str().to_string()));
        names
    }

    fn fetch(&self, name: &str) -> Option<Parameter> {
        if self.recorded.contains(name) {
            return self.source.lookup(name);
        }
        self.store.read().get(name).cloned()
    }

    fn set_state(&self, name: &str, state: NodeState) {
        self.states.lock().insert(name.to_string(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Derived, NodeInputs, Requirement};
    use crate::recording::InMemoryRecording;
    use fdm_types::SampleArray;

    fn double(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
        let p = inputs
            .present()
            .next()
            .ok_or_else(|| FdmError::Contract("no input".into()))?;
        Ok(Derived::values(p.require_values()?.map(|v| v * 2.0)))
    }

    fn sum(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
        let a = inputs.require_values("A2")?;
        let b = inputs.require_values("B2")?;
        Ok(Derived::values(a.zip_with(b, |x, y| x + y)?))
    }

    fn broken(_: &NodeInputs<'_>) -> FdmResult<Derived> {
        Err(FdmError::InvalidData("sensor unusable".into()))
    }

    fn registry() -> Registry {
        Registry::from_specs([
            NodeSpec::new("A2", double).parameter("A"),
            NodeSpec::new("B2", double).parameter("B"),
            NodeSpec::new("Sum", sum).parameter("A2").parameter("B2"),
            NodeSpec::new("C2", double).parameter("C"),
        ])
        .unwrap()
    }

    fn recording(attributes: Attributes) -> InMemoryRecording {
        InMemoryRecording::with_parameters(
            [
                Parameter::new("A", SampleArray::from_values(vec![1.0, 2.0, 3.0, 4.0]), 1.0, 0.0)
                    .unwrap(),
                Parameter::new("B", SampleArray::from_values(vec![10.0, 20.0, 30.0, 40.0]), 1.0, 0.0)
                    .unwrap(),
            ],
            attributes,
        )
    }

    fn sequential() -> EngineConfig {
        EngineConfig {
            parallel: false,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_run_derives_chain() {
        let executor = Executor::new(registry(), sequential()).unwrap();
        let out = executor.run(&recording(Attributes::default())).unwrap();
        assert_eq!(
            out.get("Sum").unwrap().values().unwrap().filled(0.0),
            vec![22.0, 44.0, 66.0, 88.0]
        );
        assert_eq!(out.derived_count(), 3);
        assert_eq!(out.state("Sum"), Some(&NodeState::Derived));
        assert_eq!(out.state("C2"), Some(&NodeState::Skipped(SkipReason::Inoperable)));
        assert!(out.states().values().all(NodeState::is_terminal));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rec = recording(Attributes::default());
        let seq = Executor::new(registry(), sequential()).unwrap().run(&rec).unwrap();
        let config = EngineConfig {
            max_workers: 2,
            ..EngineConfig::default()
        };
        let par = Executor::new(registry(), config).unwrap().run(&rec).unwrap();
        assert_eq!(seq.outputs(), par.outputs());
        assert_eq!(seq.states(), par.states());
    }

    #[test]
    fn test_failed_upstream_skips_dependants() {
        let registry = Registry::from_specs([
            NodeSpec::new("A2", broken).parameter("A"),
            NodeSpec::new("B2", double).parameter("B"),
            NodeSpec::new("Sum", sum).parameter("A2").parameter("B2"),
            NodeSpec::new("Either", double)
                .parameter("A2")
                .parameter("B2")
                .requires(Requirement::any_of(["A2", "B2"])),
        ])
        .unwrap();
        let out = Executor::new(registry, sequential())
            .unwrap()
            .run(&recording(Attributes::default()))
            .unwrap();
        assert!(matches!(out.state("A2"), Some(NodeState::Failed(r)) if r.contains("sensor unusable")));
        assert_eq!(
            out.state("Sum"),
            Some(&NodeState::Skipped(SkipReason::UpstreamUnavailable))
        );
        assert_eq!(out.state("Either"), Some(&NodeState::Derived));
        assert_eq!(
            out.get("Either").unwrap().values().unwrap().filled(0.0),
            vec![40.0, 80.0, 120.0, 160.0]
        );
        assert_eq!(out.failed().count(), 1);
    }

    #[test]
    fn test_recorded_parameter_is_not_rederived() {
        let mut rec = recording(Attributes::default());
        rec.insert(
            Parameter::new("A2", SampleArray::from_values(vec![0.0; 4]), 1.0, 0.0).unwrap(),
        );
        let out = Executor::new(registry(), sequential()).unwrap().run(&rec).unwrap();
        assert_eq!(out.state("A2"), Some(&NodeState::Skipped(SkipReason::Recorded)));
        assert!(out.get("A2").is_none());
        assert_eq!(
            out.get("Sum").unwrap().values().unwrap().filled(0.0),
            vec![20.0, 40.0, 60.0, 80.0]
        );
    }

    #[test]
    fn test_duration_mismatch_fails_node() {
        let executor = Executor::new(registry(), sequential()).unwrap();
        let out = executor.run(&recording(Attributes::new().with_duration(4.0))).unwrap();
        assert_eq!(out.state("Sum"), Some(&NodeState::Derived));

        let out = executor.run(&recording(Attributes::new().with_duration(10.0))).unwrap();
        assert!(matches!(out.state("A2"), Some(NodeState::Failed(_))));
        assert!(out.get("Sum").is_none());

        let lenient = EngineConfig {
            check_duration: false,
            ..sequential()
        };
        let out = Executor::new(registry(), lenient)
            .unwrap()
            .run(&recording(Attributes::new().with_duration(10.0)))
            .unwrap();
        assert_eq!(out.derived_count(), 3);
    }

    #[test]
    fn test_run_for_limits_work() {
        let executor = Executor::new(registry(), sequential()).unwrap();
        let out = executor
            .run_for(&recording(Attributes::default()), &["B2"])
            .unwrap();
        assert_eq!(out.derived_count(), 1);
        assert_eq!(out.state("A2"), Some(&NodeState::Skipped(SkipReason::NotRequired)));
    }

    #[test]
    fn test_cycle_stays_local() {
        let registry = Registry::from_specs([
            NodeSpec::new("A2", double).parameter("A"),
            NodeSpec::new("Loop X", double)
                .parameter("Loop Y")
                .parameter("B")
                .requires(Requirement::any_of(["Loop Y", "B"])),
            NodeSpec::new("Loop Y", double).parameter("Loop X"),
        ])
        .unwrap();
        let out = Executor::new(registry, sequential())
            .unwrap()
            .run(&recording(Attributes::default()))
            .unwrap();
        assert_eq!(out.state("Loop X"), Some(&NodeState::Skipped(SkipReason::Cyclic)));
        assert_eq!(out.state("Loop Y"), Some(&NodeState::Skipped(SkipReason::Cyclic)));
        assert_eq!(out.state("A2"), Some(&NodeState::Derived));
        assert_eq!(
            out.get("A2").unwrap().values().unwrap().filled(0.0),
            vec![2.0, 4.0, 6.0, 8.0]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            snap_tolerance: 0.7,
            ..EngineConfig::default()
        };
        assert!(matches!(Executor::new(registry(), config), Err(FdmError::Config(_))));
    }
}
