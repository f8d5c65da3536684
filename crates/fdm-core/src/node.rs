// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Node Specifications
// ─────────────────────────────────────────────────────────────────────
//! A node derives one named parameter from ordered dependency slots.
//!
//! Which inputs a node can work from is declared as a [`Requirement`]
//! expression over available names and aircraft attributes. Before the
//! formula runs every present input is aligned onto one common timebase,
//! so formulas only ever see parameters sharing frequency and offset.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use fdm_signal::align::align_with_tolerance;
use fdm_types::{
    AttributeName, Attributes, EngineConfig, FdmError, FdmResult, Parameter, SampleArray, Samples,
    StateArray, Timebase, ValuesMapping,
};

/// Formula: aligned inputs in, derived samples out.
pub type DeriveFn = fn(&NodeInputs<'_>) -> FdmResult<Derived>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Continuous values.
    Parameter,
    /// Discrete state codes with a values mapping.
    MultiState,
}

/// One ordered input slot of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn parameter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Parameter,
        }
    }

    pub fn multistate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::MultiState,
        }
    }
}

/// Availability condition over names and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Requirement {
    /// The named parameter (or attribute) is available.
    Available(String),
    AllOf(Vec<Requirement>),
    AnyOf(Vec<Requirement>),
    /// The attribute is present and equals one of `values`.
    AttributeIs {
        attribute: AttributeName,
        values: Vec<String>,
    },
}

impl Requirement {
    pub fn available(name: impl Into<String>) -> Self {
        Requirement::Available(name.into())
    }

    /// Every one of `names` available.
    pub fn all_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::AllOf(names.into_iter().map(Requirement::available).collect())
    }

    /// At least one of `names` available.
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::AnyOf(names.into_iter().map(Requirement::available).collect())
    }

    pub fn attribute_is<I, S>(attribute: AttributeName, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::AttributeIs {
            attribute,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(self, other: Requirement) -> Self {
        match self {
            Requirement::AllOf(mut all) => {
                all.push(other);
                Requirement::AllOf(all)
            }
            this => Requirement::AllOf(vec![this, other]),
        }
    }

    pub fn is_met(&self, available: &BTreeSet<String>, attributes: &Attributes) -> bool {
        match self {
            Requirement::Available(name) => available.contains(name),
            Requirement::AllOf(all) => all.iter().all(|r| r.is_met(available, attributes)),
            Requirement::AnyOf(any) => any.iter().any(|r| r.is_met(available, attributes)),
            Requirement::AttributeIs { attribute, values } => attributes
                .get(*attribute)
                .is_some_and(|v| values.iter().any(|allowed| allowed == v)),
        }
    }
}

/// Where a node's inputs are aligned to before its formula runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AlignMode {
    /// The first present input (declaration order) holding any valid
    /// sample; the first present input when all are masked.
    #[default]
    Auto,
    /// A fixed timebase requested by the node.
    Fixed(Timebase),
    /// Inputs reach the formula on their own timebases.
    Off,
}

/// Samples produced by a formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Values(SampleArray),
    States(StateArray),
    /// A complete parameter, e.g. the result of a blend. Its timebase is
    /// used unless the formula overrides it.
    Parameter(Parameter),
}

/// Formula result with optional timebase and mapping overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub output: Output,
    pub timebase: Option<Timebase>,
    pub values_mapping: Option<ValuesMapping>,
}

impl Derived {
    pub fn values(array: SampleArray) -> Self {
        Self::from_output(Output::Values(array))
    }

    pub fn states(array: StateArray) -> Self {
        Self::from_output(Output::States(array))
    }

    pub fn parameter(p: Parameter) -> Self {
        Self::from_output(Output::Parameter(p))
    }

    fn from_output(output: Output) -> Self {
        Self {
            output,
            timebase: None,
            values_mapping: None,
        }
    }

    pub fn at(mut self, timebase: Timebase) -> Self {
        self.timebase = Some(timebase);
        self
    }

    pub fn with_mapping(mut self, mapping: ValuesMapping) -> Self {
        self.values_mapping = Some(mapping);
        self
    }
}

/// What a formula sees: aligned slots, attributes and configuration.
pub struct NodeInputs<'a> {
    spec: &'a NodeSpec,
    slots: Vec<Option<Parameter>>,
    timebase: Option<Timebase>,
    attributes: &'a Attributes,
    config: &'a EngineConfig,
}

impl NodeInputs<'_> {
    pub fn node_name(&self) -> &str {
        &self.spec.name
    }

    /// Input by dependency name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        let index = self.spec.dependencies.iter().position(|d| d.name == name)?;
        self.slot(index)
    }

    /// Input by slot index.
    pub fn slot(&self, index: usize) -> Option<&Parameter> {
        self.slots.get(index)?.as_ref()
    }

    /// Input by name, or a contract error when absent.
    pub fn require(&self, name: &str) -> FdmResult<&Parameter> {
        self.get(name).ok_or_else(|| {
            FdmError::Contract(format!("{}: input '{name}' not available", self.spec.name))
        })
    }

    pub fn require_values(&self, name: &str) -> FdmResult<&SampleArray> {
        self.require(name)?.require_values()
    }

    /// First present input among `names`, in the order given.
    pub fn first_of(&self, names: &[&str]) -> Option<&Parameter> {
        names.iter().find_map(|n| self.get(n))
    }

    /// Present inputs in declaration order.
    pub fn present(&self) -> impl Iterator<Item = &Parameter> {
        self.slots.iter().flatten()
    }

    /// Timebase every present input was aligned to, unless alignment is off.
    pub fn timebase(&self) -> Option<Timebase> {
        self.timebase
    }

    pub fn attribute(&self, name: AttributeName) -> Option<&str> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        self.attributes
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }
}

/// Declarative description of one derived parameter.
#[derive(Clone)]
pub struct NodeSpec {
    name: String,
    dependencies: Vec<Dependency>,
    attributes: Vec<AttributeName>,
    requirement: Option<Requirement>,
    align: AlignMode,
    values_mapping: Option<ValuesMapping>,
    derive: DeriveFn,
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("attributes", &self.attributes)
            .field("requirement", &self.requirement)
            .field("align", &self.align)
            .field("values_mapping", &self.values_mapping)
            .finish_non_exhaustive()
    }
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, derive: DeriveFn) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            attributes: Vec::new(),
            requirement: None,
            align: AlignMode::Auto,
            values_mapping: None,
            derive,
        }
    }

    pub fn parameter(self, name: impl Into<String>) -> Self {
        self.dependency(Dependency::parameter(name))
    }

    pub fn multistate(self, name: impl Into<String>) -> Self {
        self.dependency(Dependency::multistate(name))
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn attribute(mut self, attribute: AttributeName) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Replace the default "every dependency available" requirement.
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }

    pub fn align(mut self, mode: AlignMode) -> Self {
        self.align = mode;
        self
    }

    pub fn values_mapping(mut self, mapping: ValuesMapping) -> Self {
        self.values_mapping = Some(mapping);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.name.as_str())
    }

    pub fn attribute_dependencies(&self) -> &[AttributeName] {
        &self.attributes
    }

    pub fn align_mode(&self) -> AlignMode {
        self.align
    }

    pub fn output_mapping(&self) -> Option<&ValuesMapping> {
        self.values_mapping.as_ref()
    }

    /// Declared requirement, or every dependency and attribute available.
    pub fn requirement(&self) -> Requirement {
        match &self.requirement {
            Some(r) => r.clone(),
            None => Requirement::AllOf(
                self.dependency_names()
                    .chain(self.attributes.iter().map(|a| -> &str { a.as_str() }))
                    .map(Requirement::available)
                    .collect(),
            ),
        }
    }

    /// Whether the node can be derived from `available` names. Present
    /// attribute names count as available.
    pub fn can_operate(&self, available: &BTreeSet<String>, attributes: &Attributes) -> bool {
        match &self.requirement {
            Some(r) => r.is_met(available, attributes),
            None => self.requirement().is_met(available, attributes),
        }
    }

    /// Every non-empty subset of the dependency names that satisfies the
    /// requirement, smallest first, then in declaration order.
    pub fn operational_combinations(&self, attributes: &Attributes) -> Vec<Vec<String>> {
        let names: Vec<&str> = self.dependency_names().collect();
        let present_attrs: Vec<String> =
            attributes.present().map(|a| a.as_str().to_string()).collect();
        let mut found = Vec::new();
        for size in 1..=names.len() {
            for combo in combinations(names.len(), size) {
                let mut available: BTreeSet<String> =
                    combo.iter().map(|&i| names[i].to_string()).collect();
                available.extend(present_attrs.iter().cloned());
                if self.can_operate(&available, attributes) {
                    found.push(combo.iter().map(|&i| names[i].to_string()).collect());
                }
            }
        }
        found
    }

    fn alignment_target(&self, args: &[Option<Parameter>]) -> FdmResult<Option<Timebase>> {
        match self.align {
            AlignMode::Off => Ok(None),
            AlignMode::Fixed(tb) => Ok(Some(tb)),
            AlignMode::Auto => {
                let present = || args.iter().flatten();
                present()
                    .find(|p| !p.is_fully_masked())
                    .or_else(|| present().next())
                    .map(|p| Some(p.timebase()))
                    .ok_or_else(|| {
                        FdmError::Contract(format!("{}: no inputs to align to", self.name))
                    })
            }
        }
    }

    /// Align `args` (one per dependency slot, `None` when unavailable),
    /// run the formula, and name the result after this node.
    pub fn get_derived(
        &self,
        args: Vec<Option<Parameter>>,
        attributes: &Attributes,
        config: &EngineConfig,
    ) -> FdmResult<Parameter> {
        if args.len() != self.dependencies.len() {
            return Err(FdmError::Contract(format!(
                "{}: {} arguments for {} dependencies",
                self.name,
                args.len(),
                self.dependencies.len()
            )));
        }

        for (arg, dep) in args.iter().zip(&self.dependencies) {
            if let Some(p) = arg {
                if dep.kind == DependencyKind::MultiState && !p.is_multistate() {
                    return Err(FdmError::Contract(format!(
                        "{}: '{}' must be multi-state",
                        self.name, dep.name
                    )));
                }
            }
        }

        let target = self.alignment_target(&args)?;
        let slots = match target {
            Some(tb) => args
                .into_iter()
                .zip(&self.dependencies)
                .map(|(a, dep)| {
                    let interpolate = dep.kind == DependencyKind::Parameter;
                    a.map(|p| align_with_tolerance(&p, tb, interpolate, config.snap_tolerance))
                        .transpose()
                })
                .collect::<FdmResult<Vec<_>>>()?,
            None => args,
        };
        let fallback = slots.iter().flatten().next().map(Parameter::timebase);

        let inputs = NodeInputs {
            spec: self,
            slots,
            timebase: target,
            attributes,
            config,
        };
        let derived = catch_unwind(AssertUnwindSafe(|| (self.derive)(&inputs))).map_err(|_| {
            log::error!("{}: formula panicked", self.name);
            FdmError::Contract(format!("{}: formula panicked", self.name))
        })??;

        self.assemble(derived, target.or(fallback))
    }

    fn assemble(&self, derived: Derived, grid: Option<Timebase>) -> FdmResult<Parameter> {
        let Derived {
            output,
            timebase,
            values_mapping,
        } = derived;
        let mapping = values_mapping.or_else(|| self.values_mapping.clone());

        let (samples, own) = match output {
            Output::Values(values) => (Samples::Values(values.into()), None),
            Output::States(states) => {
                let mapping = mapping.ok_or_else(|| {
                    FdmError::Contract(format!("{}: multi-state output needs a values mapping", self.name))
                })?;
                (
                    Samples::States {
                        states: states.into(),
                        mapping: mapping.into(),
                    },
                    None,
                )
            }
            Output::Parameter(p) => {
                let samples = match (p.samples().clone(), mapping) {
                    (Samples::States { states, .. }, Some(m)) => Samples::States {
                        states,
                        mapping: m.into(),
                    },
                    (samples, _) => samples,
                };
                (samples, Some(p.timebase()))
            }
        };

        let timebase = timebase.or(own).or(grid).ok_or_else(|| {
            FdmError::Contract(format!("{}: no timebase for derived output", self.name))
        })?;
        let timebase = Timebase::new(timebase.frequency, timebase.offset)?;

        let result = match samples {
            Samples::Values(values) => Parameter::from_samples(&self.name, Samples::Values(values), timebase),
            Samples::States { states, mapping } => {
                if let Some(code) = states.iter().flatten().find(|c| !mapping.contains_key(c)) {
                    return Err(FdmError::Contract(format!(
                        "{}: state {code} missing from values mapping",
                        self.name
                    )));
                }
                Parameter::from_samples(&self.name, Samples::States { states, mapping }, timebase)
            }
        };
        Ok(result)
    }
}

/// Index combinations of `k` out of `n`, in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        let Some(i) = (0..k).rev().find(|&i| idx[i] != i + n - k) else {
            return out;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
