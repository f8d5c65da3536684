// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Derivation Graph
// ─────────────────────────────────────────────────────────────────────
//! Decides which registered nodes a recording can feed and in what order
//! they run.
//!
//! Operability is a fixpoint: a node that can operate makes its output
//! available, which may let further nodes operate. Operable nodes are
//! then layered topologically; every node in level `k` depends only on
//! recorded parameters and nodes in levels `< k`. Nodes caught in a
//! dependency cycle are skipped and the rest of the graph still runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use fdm_types::{Attributes, FdmResult};

use crate::registry::Registry;

/// Why a registered node is not derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The recording already carries a parameter of the same name.
    Recorded,
    /// No operational combination is available.
    Inoperable,
    /// Operable, but not needed for the requested outputs.
    NotRequired,
    /// An upstream node failed, leaving no operational combination.
    UpstreamUnavailable,
    /// Part of a dependency cycle.
    Cyclic,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Recorded => "recorded",
            SkipReason::Inoperable => "inoperable",
            SkipReason::NotRequired => "not required",
            SkipReason::UpstreamUnavailable => "upstream unavailable",
            SkipReason::Cyclic => "dependency cycle",
        })
    }
}

/// Evaluation schedule for one recording.
#[derive(Debug, Clone, Default)]
pub struct DerivationGraph {
    levels: Vec<Vec<String>>,
    producers: BTreeMap<String, Vec<String>>,
    skipped: BTreeMap<String, SkipReason>,
}

impl DerivationGraph {
    /// Schedule every node the recording can feed.
    pub fn build(
        registry: &Registry,
        available: &BTreeSet<String>,
        attributes: &Attributes,
    ) -> FdmResult<Self> {
        Self::build_for(registry, available, attributes, None)
    }

    /// Schedule only `required` outputs and the nodes they depend on.
    /// `None` schedules everything operable.
    pub fn build_for(
        registry: &Registry,
        available: &BTreeSet<String>,
        attributes: &Attributes,
        required: Option<&[&str]>,
    ) -> FdmResult<Self> {
        let mut names = available.clone();
        names.extend(attributes.present().map(|a| a.as_str().to_string()));

        let mut skipped = BTreeMap::new();
        for name in registry.names().filter(|n| available.contains(*n)) {
            skipped.insert(name.to_string(), SkipReason::Recorded);
        }

        let mut operable = BTreeSet::new();
        loop {
            let mut changed = false;
            for spec in registry.iter() {
                let name = spec.name();
                if skipped.contains_key(name) || operable.contains(name) {
                    continue;
                }
                if spec.can_operate(&names, attributes) {
                    operable.insert(name.to_string());
                    names.insert(name.to_string());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        for name in registry.names() {
            if !operable.contains(name) && !skipped.contains_key(name) {
                skipped.insert(name.to_string(), SkipReason::Inoperable);
            }
        }

        if let Some(required) = required {
            let mut keep = BTreeSet::new();
            let mut stack: Vec<String> = required
                .iter()
                .filter(|r| operable.contains(**r))
                .map(|r| r.to_string())
                .collect();
            while let Some(name) = stack.pop() {
                if keep.insert(name.clone()) {
                    stack.extend(producers_of(registry, &operable, &name));
                }
            }
            for name in operable.difference(&keep) {
                skipped.insert(name.clone(), SkipReason::NotRequired);
            }
            operable = keep;
        }

        let (levels, producers) = loop {
            let producers: BTreeMap<String, Vec<String>> = operable
                .iter()
                .map(|n| (n.clone(), producers_of(registry, &operable, n)))
                .collect();
            let (levels, stuck) = layer(&producers);
            if stuck.is_empty() {
                break (levels, producers);
            }

            let mut cyclic: Vec<String> = stuck
                .iter()
                .filter(|n| on_cycle(&producers, &stuck, n))
                .cloned()
                .collect();
            if cyclic.is_empty() {
                cyclic = stuck.into_iter().collect();
            }
            log::warn!("dependency cycle among: {}", cyclic.join(", "));
            for name in cyclic {
                operable.remove(&name);
                skipped.insert(name, SkipReason::Cyclic);
            }

            // Nodes fed only through the cycle lose their inputs.
            let mut names = available.clone();
            names.extend(attributes.present().map(|a| a.as_str().to_string()));
            names.extend(operable.iter().cloned());
            loop {
                let lost: Vec<String> = operable
                    .iter()
                    .filter(|n| {
                        registry
                            .get(n.as_str())
                            .map_or(true, |spec| !spec.can_operate(&names, attributes))
                    })
                    .cloned()
                    .collect();
                if lost.is_empty() {
                    break;
                }
                for name in lost {
                    operable.remove(&name);
                    names.remove(&name);
                    skipped.insert(name, SkipReason::UpstreamUnavailable);
                }
            }
        };

        for (name, reason) in &skipped {
            log::debug!("node {name}: skipped ({reason})");
        }
        Ok(Self {
            levels,
            producers,
            skipped,
        })
    }

    /// Scheduled nodes grouped by level; levels run in order.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Scheduled nodes in one valid evaluation order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().flatten().map(String::as_str)
    }

    pub fn skipped(&self) -> &BTreeMap<String, SkipReason> {
        &self.skipped
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    /// Scheduled nodes that `name` consumes.
    pub fn producers_of(&self, name: &str) -> &[String] {
        self.producers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of scheduled nodes.
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

/// Operable nodes that `name` consumes.
fn producers_of(registry: &Registry, operable: &BTreeSet<String>, name: &str) -> Vec<String> {
    registry
        .get(name)
        .map(|spec| {
            spec.dependency_names()
                .filter(|d| operable.contains(*d))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Kahn layering. Returns the levels and the nodes that could not be
/// placed, which sit on or behind a dependency cycle.
fn layer(producers: &BTreeMap<String, Vec<String>>) -> (Vec<Vec<String>>, BTreeSet<String>) {
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut pending: BTreeSet<&str> = producers.keys().map(String::as_str).collect();
    let mut levels = Vec::new();

    while !pending.is_empty() {
        let ready: Vec<&str> = pending
            .iter()
            .copied()
            .filter(|n| {
                producers[*n]
                    .iter()
                    .all(|p| placed.contains(p.as_str()))
            })
            .collect();
        if ready.is_empty() {
            break;
        }
        for &n in &ready {
            pending.remove(n);
            placed.insert(n);
        }
        levels.push(ready.into_iter().map(str::to_string).collect());
    }
    (levels, pending.into_iter().map(str::to_string).collect())
}

/// Whether `start` reaches itself through producers within `stuck`.
fn on_cycle(
    producers: &BTreeMap<String, Vec<String>>,
    stuck: &BTreeSet<String>,
    start: &str,
) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&str> = vec![start];
    while let Some(name) = stack.pop() {
        for p in producers.get(name).into_iter().flatten() {
            if p == start {
                return true;
            }
            if stuck.contains(p) && seen.insert(p.as_str()) {
                stack.push(p.as_str());
            }
        }
    }
    false
}
