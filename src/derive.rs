use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use polars::prelude::DataFrame;

use crate::error::DashError;

/// A value flowing through the derive graph.
#[derive(Debug, Clone)]
pub enum Value {
    Frame(DataFrame),
    Text(String),
    Real(f64),
    Int(i64),
    List(Vec<String>),
    Empty,
}

impl Value {
    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Value::Frame(df) => Some(df),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

type Compute = Box<dyn Fn(&[Value]) -> Result<Value, DashError>>;

struct Cached {
    value: Value,
    dep_versions: Vec<u64>,
}

enum NodeKind {
    Input {
        value: Value,
        version: u64,
    },
    Derived {
        compute: Compute,
        // Kept in declaration order; petgraph's neighbor walk reverses it.
        deps: Vec<NodeIndex>,
        cache: Option<Cached>,
    },
}

struct Slot {
    name: String,
    kind: NodeKind,
}

/// Explicit dependency graph over inputs and derived values.
///
/// Evaluation is pull-based: asking for a node recomputes only the
/// ancestors whose inputs changed since they were last computed, walking
/// them in topological order. Setting an input bumps its version, which
/// invalidates every downstream cache on the next pull.
#[derive(Default)]
pub struct DeriveGraph {
    graph: DiGraph<Slot, ()>,
    by_name: HashMap<String, NodeIndex>,
}

impl DeriveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, name: &str, value: Value) -> NodeIndex {
        let idx = self.graph.add_node(Slot {
            name: name.to_string(),
            kind: NodeKind::Input { value, version: 0 },
        });
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    pub fn add_derived(
        &mut self,
        name: &str,
        deps: &[NodeIndex],
        compute: Compute,
    ) -> NodeIndex {
        let idx = self.graph.add_node(Slot {
            name: name.to_string(),
            kind: NodeKind::Derived {
                compute,
                deps: deps.to_vec(),
                cache: None,
            },
        });
        for dep in deps {
            self.graph.add_edge(*dep, idx, ());
        }
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    pub fn node(&self, name: &str) -> Result<NodeIndex, DashError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| DashError::UnknownNode(name.to_string()))
    }

    /// Replace an input's value and bump its version.
    pub fn set_input(&mut self, name: &str, value: Value) -> Result<(), DashError> {
        let idx = self.node(name)?;
        match &mut self.graph[idx].kind {
            NodeKind::Input {
                value: slot,
                version,
            } => {
                *slot = value;
                *version += 1;
                Ok(())
            }
            NodeKind::Derived { .. } => Err(DashError::Validation(format!(
                "'{name}' is derived, not an input"
            ))),
        }
    }

    /// Pull one node's current value, recomputing stale ancestors.
    pub fn evaluate(&mut self, name: &str) -> Result<Value, DashError> {
        let target = self.node(name)?;
        let order = toposort(&self.graph, None)
            .map_err(|c| DashError::Cycle(self.graph[c.node_id()].name.clone()))?;

        let wanted = self.ancestors_of(target);
        for idx in order {
            if !wanted.contains(&idx) {
                continue;
            }
            self.refresh(idx)?;
        }
        Ok(self.current(target))
    }

    fn ancestors_of(&self, target: NodeIndex) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut stack = vec![target];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
        }
        seen
    }

    fn version(&self, idx: NodeIndex) -> u64 {
        match &self.graph[idx].kind {
            NodeKind::Input { version, .. } => *version,
            NodeKind::Derived { cache, .. } => {
                // Derived versions piggyback on the dep versions they were
                // built from; summing is enough to detect any bump.
                cache
                    .as_ref()
                    .map(|c| c.dep_versions.iter().sum())
                    .unwrap_or(u64::MAX)
            }
        }
    }

    fn current(&self, idx: NodeIndex) -> Value {
        match &self.graph[idx].kind {
            NodeKind::Input { value, .. } => value.clone(),
            NodeKind::Derived { cache, .. } => cache
                .as_ref()
                .map(|c| c.value.clone())
                .unwrap_or(Value::Empty),
        }
    }

    fn refresh(&mut self, idx: NodeIndex) -> Result<(), DashError> {
        let deps = match &self.graph[idx].kind {
            NodeKind::Input { .. } => return Ok(()),
            NodeKind::Derived { deps, .. } => deps.clone(),
        };

        let dep_versions: Vec<u64> = deps.iter().map(|d| self.version(*d)).collect();
        if let NodeKind::Derived {
            cache: Some(cached),
            ..
        } = &self.graph[idx].kind
        {
            if cached.dep_versions == dep_versions {
                return Ok(());
            }
        }

        let args: Vec<Value> = deps.iter().map(|d| self.current(*d)).collect();
        let value = match &self.graph[idx].kind {
            NodeKind::Derived { compute, .. } => compute(&args)?,
            NodeKind::Input { .. } => unreachable!(),
        };

        let name = self.graph[idx].name.clone();
        log::debug!("recomputed node '{name}'");

        if let NodeKind::Derived { cache, .. } = &mut self.graph[idx].kind {
            *cache = Some(Cached {
                value,
                dep_versions,
            });
        }
        Ok(())
    }
}
