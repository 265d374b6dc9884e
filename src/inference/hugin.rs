//! Hugin propagation over a clique tree.
//!
//! The tree is built once. Each call to [`HuginPropagation::propagate`] copies the clique
//! potentials, restricts them to the evidence, and runs two passes: a collect pass sending
//! separator marginals from the leaves to the root, then a distribute pass sending them back out
//! with the collect message divided away. Afterwards every clique holds the joint of its variables
//! and the evidence.

use super::{check_query, InferenceOptions, Posteriors};
use crate::error::{Error, Result};
use crate::evidence::EvidenceCase;
use crate::join_tree::JoinTree;
use crate::network::Network;
use crate::operations::{divide, multiply, normalize, project, restrict, Reduction};
use crate::table::TablePotential;
use crate::variable::{Variable, VariableSet};
use log::{debug, trace};
use std::fmt;

/// Where a [`HuginPropagation`] is in its run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropagationState {
    /// The clique potentials have been loaded and restricted to the evidence.
    Built,
    /// Every clique has sent its message towards the root.
    Collected,
    /// The root has sent messages back to every clique.
    Distributed,
    /// The evidence has been checked and posteriors can be read.
    Ready,
}

impl PropagationState {
    fn name(self) -> &'static str {
        match self {
            PropagationState::Built => "built",
            PropagationState::Collected => "collected",
            PropagationState::Distributed => "distributed",
            PropagationState::Ready => "ready",
        }
    }
}

impl fmt::Display for PropagationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A clique tree with the state of one propagation run.
///
/// ```
/// use potential_inference::{
///     EvidenceCase, HuginPropagation, InferenceOptions, Network, PropagationState,
/// };
///
/// let mut network = Network::new();
/// let a = network.add_variable("A", &["t", "f"]).unwrap();
/// let b = network.add_variable("B", &["t", "f"]).unwrap();
/// network.add_link(a, b).unwrap();
/// network.set_table(a, vec![0.3, 0.7]).unwrap();
/// network.set_table(b, vec![0.8, 0.2, 0.1, 0.9]).unwrap();
///
/// let mut hugin = HuginPropagation::new(&network, &InferenceOptions::new()).unwrap();
/// let mut evidence = EvidenceCase::new();
/// evidence.add_finding(b, 0).unwrap();
///
/// hugin.enter_evidence(&evidence).unwrap();
/// assert!(hugin.distribute().is_err());
/// hugin.collect().unwrap();
/// hugin.distribute().unwrap();
/// hugin.finish().unwrap();
/// assert_eq!(hugin.state(), PropagationState::Ready);
///
/// assert!((hugin.probability_of_evidence().unwrap() - 0.31).abs() < 1e-12);
/// let posterior = hugin.posterior(a).unwrap();
/// assert!((posterior.values()[0] - 0.24 / 0.31).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct HuginPropagation {
    tree: JoinTree,
    options: InferenceOptions,
    /// `(child, parent)` pairs with every child listed before its parent.
    schedule: Vec<(usize, usize)>,
    state: PropagationState,
    evidence: EvidenceCase,
    potentials: Vec<TablePotential>,
    /// The collect message each clique sent to its parent, indexed like `schedule`.
    messages: Vec<TablePotential>,
    probability_of_evidence: f64,
}

impl HuginPropagation {
    /// Builds the clique tree for `network` and loads it with no evidence.
    pub fn new(network: &Network, options: &InferenceOptions) -> Result<Self> {
        let tree = JoinTree::from_network(network, options.heuristic)?;
        Ok(HuginPropagation::from_tree(tree, options))
    }

    /// Wraps an existing clique tree, rooted at its first clique.
    pub fn from_tree(tree: JoinTree, options: &InferenceOptions) -> Self {
        let schedule = postorder(&tree);
        let potentials = tree
            .cliques()
            .iter()
            .map(|c| c.potential().clone())
            .collect();
        HuginPropagation {
            tree,
            options: options.clone(),
            schedule,
            state: PropagationState::Built,
            evidence: EvidenceCase::new(),
            potentials,
            messages: Vec::new(),
            probability_of_evidence: 0.0,
        }
    }

    /// The underlying clique tree.
    pub fn tree(&self) -> &JoinTree {
        &self.tree
    }

    /// The current state.
    pub fn state(&self) -> PropagationState {
        self.state
    }

    /// The evidence of the current run.
    pub fn evidence(&self) -> &EvidenceCase {
        &self.evidence
    }

    fn expect_state(&self, expected: PropagationState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::PropagationOrder {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    /// Starts a new run: reloads fresh copies of the clique potentials restricted to `evidence`.
    /// Allowed in any state.
    pub fn enter_evidence(&mut self, evidence: &EvidenceCase) -> Result<()> {
        for finding in evidence.iter() {
            let known = self
                .tree
                .cliques()
                .iter()
                .any(|c| c.variables().contains(finding.variable));
            if !known {
                return Err(Error::UnknownVariable(format!("{:?}", finding.variable)));
            }
        }
        self.evidence = evidence.clone();
        self.potentials = self
            .tree
            .cliques()
            .iter()
            .map(|c| restrict(c.potential(), evidence))
            .collect();
        self.messages.clear();
        self.probability_of_evidence = 0.0;
        self.state = PropagationState::Built;
        Ok(())
    }

    fn separator(&self, a: usize, b: usize) -> Vec<Variable> {
        self.potentials[a]
            .variables()
            .intersection(&self.potentials[b].variables())
            .as_slice()
            .to_vec()
    }

    /// Sends a message from every clique to its parent, leaves first.
    pub fn collect(&mut self) -> Result<()> {
        self.expect_state(PropagationState::Built)?;
        let mut messages = Vec::with_capacity(self.schedule.len());
        for &(child, parent) in self.schedule.iter() {
            self.options.cancel.check()?;
            let separator = self.separator(child, parent);
            let message = project(&self.potentials[child], &separator, self.options.reduction);
            trace!("collect {} -> {} over {:?}", child, parent, separator);
            self.potentials[parent] = multiply(&self.potentials[parent], &message);
            messages.push(message);
        }
        self.messages = messages;
        self.state = PropagationState::Collected;
        Ok(())
    }

    /// Sends a message from every clique to its children, root first. Each message is the
    /// separator marginal divided by the message collected over the same separator, with zero
    /// divided by zero taken as zero.
    pub fn distribute(&mut self) -> Result<()> {
        self.expect_state(PropagationState::Collected)?;
        for (index, &(child, parent)) in self.schedule.iter().enumerate().rev() {
            self.options.cancel.check()?;
            let separator = self.separator(child, parent);
            let marginal = project(&self.potentials[parent], &separator, self.options.reduction);
            let update = divide(&marginal, &self.messages[index])?;
            trace!("distribute {} -> {} over {:?}", parent, child, separator);
            self.potentials[child] = multiply(&self.potentials[child], &update);
        }
        self.state = PropagationState::Distributed;
        Ok(())
    }

    /// Checks that the evidence has non-zero probability and makes the posteriors available.
    pub fn finish(&mut self) -> Result<()> {
        self.expect_state(PropagationState::Distributed)?;
        // The root received everything during collect, so its mass is the probability of the
        // evidence (or, under max reduction, of the most probable explanation).
        let mass = match self.potentials.first() {
            Some(root) => match self.options.reduction {
                Reduction::Sum => root.sum(),
                Reduction::Max => root.argmax().1,
            },
            None => 1.0,
        };
        if mass == 0.0 {
            return Err(Error::ImpossibleEvidence);
        }
        self.probability_of_evidence = mass;
        self.state = PropagationState::Ready;
        debug!(
            "propagated {} findings through {} cliques, evidence mass {}",
            self.evidence.len(),
            self.potentials.len(),
            mass
        );
        Ok(())
    }

    /// Runs a complete propagation for `evidence`.
    pub fn propagate(&mut self, evidence: &EvidenceCase) -> Result<()> {
        self.enter_evidence(evidence)?;
        self.collect()?;
        self.distribute()?;
        self.finish()
    }

    /// The probability of the evidence; under max reduction, the probability of the most
    /// probable configuration consistent with it.
    pub fn probability_of_evidence(&self) -> Result<f64> {
        self.expect_state(PropagationState::Ready)?;
        Ok(self.probability_of_evidence)
    }

    /// The posterior of one variable, read from the smallest clique that contains it.
    pub fn posterior(&self, variable: Variable) -> Result<TablePotential> {
        self.expect_state(PropagationState::Ready)?;
        if let Some(state) = self.evidence.state_of(variable) {
            return TablePotential::indicator(variable, state);
        }
        let clique = self.tree.smallest_clique_with(variable)?;
        let marginal = project(&self.potentials[clique], &[variable], self.options.reduction);
        normalize(&marginal, self.options.zero_sum)
    }

    /// The posteriors of several variables.
    pub fn posteriors(&self, queries: &[Variable]) -> Result<Posteriors> {
        let mut result = Posteriors::default();
        for &variable in queries {
            result.insert(variable, self.posterior(variable)?);
        }
        Ok(result)
    }

    /// The clique potentials of the current run, each over the unobserved variables of its clique.
    pub fn clique_potentials(&self) -> &[TablePotential] {
        &self.potentials
    }

    /// The joint posterior of variables that share a clique.
    pub fn clique_marginal(&self, variables: &[Variable]) -> Result<TablePotential> {
        self.expect_state(PropagationState::Ready)?;
        let wanted = VariableSet::new(variables);
        let unobserved: Vec<Variable> = variables
            .iter()
            .copied()
            .filter(|v| !self.evidence.contains(*v))
            .collect();
        let clique = self
            .tree
            .cliques()
            .iter()
            .position(|c| wanted.is_subset(c.variables()))
            .ok_or_else(|| {
                Error::InvalidParameter(format!("no clique contains all of {:?}", wanted))
            })?;
        let marginal = project(&self.potentials[clique], &unobserved, self.options.reduction);
        normalize(&marginal, self.options.zero_sum)
    }
}

/// Roots the tree at clique 0 and lists `(child, parent)` edges so that every clique appears as a
/// child before it appears as a parent.
fn postorder(tree: &JoinTree) -> Vec<(usize, usize)> {
    let count = tree.cliques().len();
    let mut preorder = Vec::with_capacity(count.saturating_sub(1));
    let mut visited = vec![false; count];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    if count > 0 {
        visited[0] = true;
        stack.extend(tree.neighbours(0).iter().map(|&n| (n, 0)));
    }
    while let Some((clique, parent)) = stack.pop() {
        if visited[clique] {
            continue;
        }
        visited[clique] = true;
        preorder.push((clique, parent));
        for &next in tree.neighbours(clique) {
            if !visited[next] {
                stack.push((next, clique));
            }
        }
    }
    preorder.reverse();
    preorder
}

/// Runs Hugin propagation once and returns the posteriors of `queries`.
pub fn posteriors(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<Posteriors> {
    check_query(network, evidence, queries)?;
    let mut hugin = HuginPropagation::new(network, options)?;
    hugin.propagate(evidence)?;
    hugin.posteriors(queries)
}
