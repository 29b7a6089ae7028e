//! Discrete Bayesian network with tabular CPDs and exact inference by
//! variable elimination.
//!
//! The network is a pre-trained artifact. Its JSON form lists one node per
//! variable:
//!
//! ```json
//! { "nodes": [
//!     { "variable": "town", "states": ["BEDOK", "TAMPINES"], "parents": [],
//!       "cpd": [[0.4], [0.6]] },
//!     { "variable": "resale_price", "states": ["(300000.0, 400000.0]", "(400000.0, 500000.0]"],
//!       "parents": ["town"], "cpd": [[0.7, 0.2], [0.3, 0.8]] }
//! ] }
//! ```
//!
//! `cpd` has one row per state of the node and one column per parent
//! configuration, enumerated row-major over `parents` (last parent fastest).

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::factor::Factor;
use super::variables::{Evidence, ModelVariable, StateValue};
use super::{InferenceModel, Posterior};
use crate::domain::interval::Interval;
use crate::errors::DomainError;

const CPD_COLUMN_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<NodeSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub variable: String,
    pub states: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    pub cpd: Vec<Vec<f64>>,
}

#[derive(Clone, Debug)]
struct Node {
    name: String,
    states: Vec<StateValue>,
    parents: Vec<usize>,
    cpd: Factor,
}

#[derive(Clone, Debug)]
pub struct BayesianNetwork {
    name: Option<String>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl BayesianNetwork {
    pub fn from_spec(spec: NetworkSpec) -> Result<Self, DomainError> {
        let mut index = HashMap::with_capacity(spec.nodes.len());
        for (position, node) in spec.nodes.iter().enumerate() {
            if index.insert(node.variable.clone(), position).is_some() {
                return Err(invalid(format!("variable `{}` is declared twice", node.variable)));
            }
        }

        let mut states = Vec::with_capacity(spec.nodes.len());
        for node in &spec.nodes {
            states.push(parse_states(node)?);
        }

        let mut nodes = Vec::with_capacity(spec.nodes.len());
        for (position, node) in spec.nodes.into_iter().enumerate() {
            let parents = node
                .parents
                .iter()
                .map(|parent| {
                    index.get(parent).copied().ok_or_else(|| {
                        invalid(format!("`{}` lists unknown parent `{parent}`", node.variable))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let card = states[position].len();
            let parent_cards: Vec<usize> = parents.iter().map(|parent| states[*parent].len()).collect();
            let columns: usize = parent_cards.iter().product();

            if node.cpd.len() != card {
                return Err(invalid(format!(
                    "cpd of `{}` has {} rows, expected one per state ({card})",
                    node.variable,
                    node.cpd.len()
                )));
            }
            if let Some(row) = node.cpd.iter().find(|row| row.len() != columns) {
                return Err(invalid(format!(
                    "cpd of `{}` has a row with {} columns, expected {columns}",
                    node.variable,
                    row.len()
                )));
            }
            for column in 0..columns {
                let total: f64 = node.cpd.iter().map(|row| row[column]).sum();
                let negative = node.cpd.iter().any(|row| !(row[column] >= 0.0));
                if negative || (total - 1.0).abs() > CPD_COLUMN_TOLERANCE {
                    return Err(invalid(format!(
                        "cpd column {column} of `{}` is not a probability distribution (sum {total})",
                        node.variable
                    )));
                }
            }

            let mut scope = vec![position];
            scope.extend(&parents);
            let mut cards = vec![card];
            cards.extend(parent_cards);
            let values: Vec<f64> = node.cpd.into_iter().flatten().collect();
            let cpd = Factor::new(scope, cards, values)?;

            nodes.push(Node {
                name: node.variable,
                states: std::mem::take(&mut states[position]),
                parents,
                cpd,
            });
        }

        let network = Self { name: spec.name, nodes, index };
        network.ensure_acyclic()?;
        Ok(network)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.name.as_str())
    }

    /// Model variables the core relies on that the network does not declare.
    pub fn missing_variables(&self) -> Vec<ModelVariable> {
        ModelVariable::ALL
            .into_iter()
            .filter(|variable| !self.index.contains_key(variable.as_str()))
            .collect()
    }

    fn node_index(&self, variable: ModelVariable) -> Result<usize, DomainError> {
        self.index
            .get(variable.as_str())
            .copied()
            .ok_or_else(|| DomainError::UnknownVariable(variable.as_str().to_owned()))
    }

    fn state_index(&self, node: usize, state: &StateValue) -> Result<usize, DomainError> {
        self.nodes[node].states.iter().position(|candidate| candidate == state).ok_or_else(|| {
            DomainError::UnknownState {
                variable: self.nodes[node].name.clone(),
                state: state.to_string(),
            }
        })
    }

    fn ensure_acyclic(&self) -> Result<(), DomainError> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|node| node.parents.len()).collect();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (position, node) in self.nodes.iter().enumerate() {
            for parent in &node.parents {
                children[*parent].push(position);
            }
        }

        let mut queue: VecDeque<usize> =
            indegree.iter().enumerate().filter(|(_, d)| **d == 0).map(|(i, _)| i).collect();
        let mut visited = 0;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for child in &children[node] {
                indegree[*child] -= 1;
                if indegree[*child] == 0 {
                    queue.push_back(*child);
                }
            }
        }

        if visited != self.nodes.len() {
            return Err(invalid("network graph contains a cycle".to_string()));
        }
        Ok(())
    }

    /// The query variables plus all their ancestors; other nodes are barren
    /// and sum to one.
    fn relevant_nodes(&self, roots: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut relevant = BTreeSet::new();
        let mut stack: Vec<usize> = roots.into_iter().collect();
        while let Some(node) = stack.pop() {
            if relevant.insert(node) {
                stack.extend(&self.nodes[node].parents);
            }
        }
        relevant
    }

    fn eliminate(&self, target: usize, observed: &[(usize, usize)]) -> Vec<f64> {
        let relevant =
            self.relevant_nodes(std::iter::once(target).chain(observed.iter().map(|(node, _)| *node)));

        let mut factors: Vec<Factor> = relevant
            .iter()
            .map(|node| {
                observed.iter().fold(self.nodes[*node].cpd.clone(), |factor, (variable, state)| {
                    factor.reduce(*variable, *state)
                })
            })
            .collect();

        let mut hidden: Vec<usize> = relevant
            .into_iter()
            .filter(|node| *node != target && observed.iter().all(|(variable, _)| variable != node))
            .collect();

        loop {
            let next = hidden
                .iter()
                .enumerate()
                .min_by_key(|(_, variable)| self.elimination_cost(**variable, &factors))
                .map(|(slot, variable)| (slot, *variable));
            let Some((slot, variable)) = next else {
                break;
            };
            hidden.swap_remove(slot);

            let (involved, rest): (Vec<Factor>, Vec<Factor>) =
                factors.into_iter().partition(|factor| factor.contains(variable));
            factors = rest;
            if let Some(joint) = involved.into_iter().reduce(|acc, factor| acc.product(&factor)) {
                factors.push(joint.marginalize(variable));
            }
        }

        let joint =
            factors.into_iter().fold(Factor::scalar(1.0), |acc, factor| acc.product(&factor));
        let card = self.nodes[target].states.len();
        if joint.scope() != &[target][..] || joint.values().len() != card {
            return vec![0.0; card];
        }
        joint.values().to_vec()
    }

    /// Size of the factor created by eliminating `variable` next.
    fn elimination_cost(&self, variable: usize, factors: &[Factor]) -> usize {
        let mut scope = BTreeSet::new();
        for factor in factors.iter().filter(|factor| factor.contains(variable)) {
            scope.extend(factor.scope().iter().copied());
        }
        scope.iter().map(|node| self.nodes[*node].states.len()).product()
    }
}

impl InferenceModel for BayesianNetwork {
    fn states(&self, variable: ModelVariable) -> Result<Vec<StateValue>, DomainError> {
        let node = self.node_index(variable)?;
        Ok(self.nodes[node].states.clone())
    }

    fn posterior(&self, target: ModelVariable, evidence: &Evidence) -> Result<Posterior, DomainError> {
        let target_node = self.node_index(target)?;
        let mut observed = Vec::new();
        for (variable, state) in evidence.observations() {
            let node = self.node_index(variable)?;
            observed.push((node, self.state_index(node, &state)?));
        }

        let states = &self.nodes[target_node].states;
        let mut probabilities = match observed.iter().find(|(node, _)| *node == target_node) {
            Some((_, state)) => {
                let mut one_hot = vec![0.0; states.len()];
                one_hot[*state] = 1.0;
                one_hot
            }
            None => self.eliminate(target_node, &observed),
        };

        let total: f64 = probabilities.iter().sum();
        if total > 0.0 && total.is_finite() {
            probabilities.iter_mut().for_each(|probability| *probability /= total);
        } else {
            debug!(
                event_name = "inference.posterior.zero_support",
                target = %target,
                evidence_count = observed.len(),
                "evidence has no joint support in the network"
            );
            probabilities.iter_mut().for_each(|probability| *probability = 0.0);
        }

        Ok(Posterior::new(target, states.iter().cloned().zip(probabilities).collect()))
    }
}

fn parse_states(node: &NodeSpec) -> Result<Vec<StateValue>, DomainError> {
    if node.states.is_empty() {
        return Err(invalid(format!("variable `{}` declares no states", node.variable)));
    }

    let binned = node.variable.parse::<ModelVariable>().map(ModelVariable::is_binned).unwrap_or(false);
    let states = node
        .states
        .iter()
        .map(|label| {
            if binned {
                label.parse::<Interval>().map(StateValue::Bin)
            } else {
                Ok(StateValue::Category(label.clone()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (position, state) in states.iter().enumerate() {
        if states[..position].contains(state) {
            return Err(invalid(format!("variable `{}` repeats state `{state}`", node.variable)));
        }
    }
    Ok(states)
}

fn invalid(message: String) -> DomainError {
    DomainError::InvalidArtifact(message)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{NetworkSpec, NodeSpec};

    pub fn node(variable: &str, states: &[&str], parents: &[&str], cpd: Vec<Vec<f64>>) -> NodeSpec {
        NodeSpec {
            variable: variable.to_owned(),
            states: states.iter().map(|state| (*state).to_owned()).collect(),
            parents: parents.iter().map(|parent| (*parent).to_owned()).collect(),
            cpd,
        }
    }

    /// town -> resale_price <- remaining_lease_years, resale_price -> floor_area_sqm
    pub fn housing_spec() -> NetworkSpec {
        NetworkSpec {
            name: Some("housing-fixture".to_owned()),
            nodes: vec![
                node("town", &["BEDOK", "TAMPINES"], &[], vec![vec![0.4], vec![0.6]]),
                node(
                    "remaining_lease_years",
                    &["(40.0, 60.0]", "(60.0, 80.0]", "(80.0, 99.0]"],
                    &[],
                    vec![vec![0.2], vec![0.5], vec![0.3]],
                ),
                node(
                    "resale_price",
                    &["(200000.0, 400000.0]", "(400000.0, 600000.0]"],
                    &["town", "remaining_lease_years"],
                    vec![
                        vec![0.9, 0.6, 0.3, 0.8, 0.5, 0.2],
                        vec![0.1, 0.4, 0.7, 0.2, 0.5, 0.8],
                    ],
                ),
                node(
                    "floor_area_sqm",
                    &["(30.0, 80.0]", "(80.0, 130.0]"],
                    &["resale_price"],
                    vec![vec![0.75, 0.25], vec![0.25, 0.75]],
                ),
            ],
        }
    }
}
