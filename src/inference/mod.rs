//! Posterior marginals given evidence.
//!
//! Every algorithm is reachable through [`infer`], which picks one according to
//! [`InferenceOptions::algorithm`]. The algorithms are also usable directly: see
//! [`variable_elimination`], [`HuginPropagation`], and [`sampling`].

pub mod hugin;
pub mod sampling;
pub mod variable_elimination;

pub use hugin::{HuginPropagation, PropagationState};
pub use sampling::SamplingReport;

use crate::error::{Error, Result};
use crate::evidence::EvidenceCase;
use crate::graph::EliminationHeuristic;
use crate::network::Network;
use crate::operations::{Reduction, ZeroSumPolicy};
use crate::table::TablePotential;
use crate::variable::Variable;
use log::debug;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The inference algorithms this crate implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Exact: multiply and sum out one variable at a time.
    VariableElimination,
    /// Exact: two-pass message passing over a clique tree.
    Hugin,
    /// Approximate: forward sampling, rejecting samples that contradict the evidence.
    LogicSampling,
    /// Approximate: forward sampling with evidence clamped and samples weighted by its likelihood.
    LikelihoodWeighting,
}

impl Algorithm {
    /// Every algorithm, exact ones first.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::VariableElimination,
        Algorithm::Hugin,
        Algorithm::LogicSampling,
        Algorithm::LikelihoodWeighting,
    ];

    /// A short kebab-case name, accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::VariableElimination => "variable-elimination",
            Algorithm::Hugin => "hugin",
            Algorithm::LogicSampling => "logic-sampling",
            Algorithm::LikelihoodWeighting => "likelihood-weighting",
        }
    }

    /// Returns `true` for the algorithms whose answers are exact up to rounding.
    pub fn is_exact(self) -> bool {
        matches!(self, Algorithm::VariableElimination | Algorithm::Hugin)
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::VariableElimination
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown inference algorithm {:?}", s)))
    }
}

/// A flag for asking a running computation to stop early.
///
/// Clones share the flag, so one clone can be handed to the computation and another kept to
/// cancel it, possibly from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that hasn't been cancelled.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Asks every computation holding a clone of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](CancelToken::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fails with [`Error::Cancelled`] if the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Settings for [`infer`] and the algorithms behind it.
///
/// ```
/// use potential_inference::{Algorithm, InferenceOptions};
///
/// let options = InferenceOptions::new()
///     .algorithm(Algorithm::LikelihoodWeighting)
///     .samples(5_000)
///     .seed(7);
/// assert_eq!(options.samples, 5_000);
/// ```
#[derive(Clone, Debug)]
pub struct InferenceOptions {
    /// Which algorithm [`infer`] runs.
    pub algorithm: Algorithm,
    /// How exact algorithms choose an elimination order when none is given.
    pub heuristic: EliminationHeuristic,
    /// An explicit elimination order for variable elimination. Variables that needn't be
    /// eliminated are skipped; variables it omits are eliminated afterwards in heuristic order.
    pub elimination_order: Option<Vec<Variable>>,
    /// Number of samples drawn by the stochastic algorithms.
    pub samples: usize,
    /// Seed for the stochastic algorithms.
    pub seed: u64,
    /// Whether exact algorithms compute marginals or max-marginals.
    pub reduction: Reduction,
    /// What to do when a distribution to be normalized sums to zero.
    pub zero_sum: ZeroSumPolicy,
    /// Checked between steps; a cancelled token aborts with [`Error::Cancelled`].
    pub cancel: CancelToken,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        InferenceOptions {
            algorithm: Algorithm::default(),
            heuristic: EliminationHeuristic::default(),
            elimination_order: None,
            samples: 10_000,
            seed: 0,
            reduction: Reduction::Sum,
            zero_sum: ZeroSumPolicy::Fail,
            cancel: CancelToken::new(),
        }
    }
}

impl InferenceOptions {
    /// The default options: variable elimination with the min-fill heuristic.
    pub fn new() -> Self {
        InferenceOptions::default()
    }

    /// Sets the algorithm.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the elimination heuristic.
    pub fn heuristic(mut self, heuristic: EliminationHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Sets an explicit elimination order.
    pub fn elimination_order(mut self, order: Vec<Variable>) -> Self {
        self.elimination_order = Some(order);
        self
    }

    /// Sets the number of samples.
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets sum or max reduction.
    pub fn reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    /// Sets the zero-sum policy.
    pub fn zero_sum(mut self, policy: ZeroSumPolicy) -> Self {
        self.zero_sum = policy;
        self
    }

    /// Sets the cancellation token.
    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The posterior distribution of each query variable, as a normalized table over that variable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Posteriors {
    tables: BTreeMap<Variable, TablePotential>,
}

impl Posteriors {
    /// The posterior of one variable.
    pub fn get(&self, variable: Variable) -> Option<&TablePotential> {
        self.tables.get(&variable)
    }

    /// The posterior probability that `variable` is in `state`.
    pub fn probability(&self, variable: Variable, state: usize) -> Option<f64> {
        self.get(variable)?.values().get(state).copied()
    }

    /// Every posterior in variable order.
    pub fn iter(&self) -> btree_map::Iter<'_, Variable, TablePotential> {
        self.tables.iter()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if there are no posteriors.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The largest absolute difference between the two sets of posteriors, or `None` if they are
    /// for different variables.
    pub fn max_difference(&self, other: &Posteriors) -> Option<f64> {
        if !self.tables.keys().eq(other.tables.keys()) {
            return None;
        }
        let mut max: f64 = 0.0;
        for (a, b) in self.tables.values().zip(other.tables.values()) {
            for (x, y) in a.values().iter().zip(b.values()) {
                max = max.max((x - y).abs());
            }
        }
        Some(max)
    }

    pub(crate) fn insert(&mut self, variable: Variable, table: TablePotential) {
        self.tables.insert(variable, table);
    }
}

impl IntoIterator for Posteriors {
    type Item = (Variable, TablePotential);
    type IntoIter = btree_map::IntoIter<Variable, TablePotential>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}

pub(crate) fn check_query(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
) -> Result<()> {
    for variable in queries.iter().copied().chain(evidence.variables()) {
        network.check(variable)?;
    }
    Ok(())
}

/// Computes the posterior of each query variable given `evidence` with the algorithm
/// `options` selects.
///
/// ```
/// use potential_inference::{infer, Algorithm, EvidenceCase, InferenceOptions, Network};
///
/// let mut network = Network::new();
/// let a = network.add_variable("A", &["t", "f"]).unwrap();
/// let b = network.add_variable("B", &["t", "f"]).unwrap();
/// network.add_link(a, b).unwrap();
/// network.set_table(a, vec![0.6, 0.4]).unwrap();
/// network.set_table(b, vec![0.8, 0.2, 0.35, 0.65]).unwrap();
///
/// let mut evidence = EvidenceCase::new();
/// evidence.add_finding(b, 0).unwrap();
///
/// for algorithm in [Algorithm::VariableElimination, Algorithm::Hugin] {
///     let options = InferenceOptions::new().algorithm(algorithm);
///     let posteriors = infer(&network, &evidence, &[a], &options).unwrap();
///     let p = posteriors.probability(a, 0).unwrap();
///     assert!((p - 0.48 / 0.62).abs() < 1e-9);
/// }
/// ```
pub fn infer(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<Posteriors> {
    debug!(
        "running {} on {} queries with {} findings",
        options.algorithm,
        queries.len(),
        evidence.len()
    );
    match options.algorithm {
        Algorithm::VariableElimination => {
            variable_elimination::posteriors(network, evidence, queries, options)
        }
        Algorithm::Hugin => hugin::posteriors(network, evidence, queries, options),
        Algorithm::LogicSampling => {
            sampling::logic_sampling(network, evidence, queries, options).map(|(p, _)| p)
        }
        Algorithm::LikelihoodWeighting => {
            sampling::likelihood_weighting(network, evidence, queries, options).map(|(p, _)| p)
        }
    }
}
