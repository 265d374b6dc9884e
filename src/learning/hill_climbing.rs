use super::parameters::{estimate_parameters, ParameterOptions};
use super::Dataset;
use crate::error::{Error, Result};
use crate::inference::CancelToken;
use crate::network::{LinkEdit, Network};
use crate::table::Scope;
use crate::variable::{Variable, VariableSet};
use log::{debug, trace};
use statrs::function::gamma::ln_gamma;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A decomposable network score: the sum over nodes of a local score of the node given its
/// parents. Higher is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScoreMetric {
    /// Cooper and Herskovits' Bayesian score with uniform Dirichlet priors.
    K2,
    /// Log-likelihood penalized by half the log of the sample size per free parameter.
    Bic,
    /// Log-likelihood penalized by one per free parameter.
    Aic,
    /// Plain log-likelihood, which always prefers more links.
    LogLikelihood,
}

impl ScoreMetric {
    /// Every metric.
    pub const ALL: [ScoreMetric; 4] = [
        ScoreMetric::K2,
        ScoreMetric::Bic,
        ScoreMetric::Aic,
        ScoreMetric::LogLikelihood,
    ];

    /// A short lowercase name, accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            ScoreMetric::K2 => "k2",
            ScoreMetric::Bic => "bic",
            ScoreMetric::Aic => "aic",
            ScoreMetric::LogLikelihood => "log-likelihood",
        }
    }
}

impl Default for ScoreMetric {
    fn default() -> Self {
        ScoreMetric::K2
    }
}

impl fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScoreMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ScoreMetric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown score metric {:?}", s)))
    }
}

/// The local score of `variable` with the given parents.
///
/// ```
/// use potential_inference::{local_score, Dataset, ScoreMetric};
///
/// let input = "a\tb\n40\tx\tx\n10\tx\ty\n10\ty\tx\n40\ty\ty\n";
/// let data = Dataset::read_tsv(input.as_bytes()).unwrap();
/// let a = data.catalog().variable("a").unwrap();
/// let b = data.catalog().variable("b").unwrap();
/// for metric in ScoreMetric::ALL {
///     let alone = local_score(&data, b, &[], metric).unwrap();
///     let with_a = local_score(&data, b, &[a], metric).unwrap();
///     assert!(with_a > alone, "{} should prefer the link", metric);
/// }
/// ```
pub fn local_score(
    dataset: &Dataset,
    variable: Variable,
    parents: &[Variable],
    metric: ScoreMetric,
) -> Result<f64> {
    let mut family = Scope::new();
    family.push(variable);
    family.extend_from_slice(parents);
    let counts = dataset.frequencies(&family)?;
    let states = variable.num_states();
    let configurations = counts.len() / states;

    let mut log_likelihood = 0.0;
    let mut k2 = 0.0;
    let r = states as f64;
    for run in counts.values().chunks(states) {
        let n_ij: f64 = run.iter().sum();
        for n_ijk in run {
            if *n_ijk > 0.0 {
                log_likelihood += n_ijk * (n_ijk / n_ij).ln();
            }
        }
        if metric == ScoreMetric::K2 {
            k2 += ln_gamma(r) - ln_gamma(n_ij + r);
            k2 += run.iter().map(|n| ln_gamma(n + 1.0)).sum::<f64>();
        }
    }

    let free_parameters = (configurations * (states - 1)) as f64;
    Ok(match metric {
        ScoreMetric::K2 => k2,
        ScoreMetric::Bic => {
            log_likelihood - 0.5 * dataset.sample_size().ln() * free_parameters
        }
        ScoreMetric::Aic => log_likelihood - free_parameters,
        ScoreMetric::LogLikelihood => log_likelihood,
    })
}

/// The score of a whole network: the sum of its local scores.
pub fn network_score(dataset: &Dataset, network: &Network, metric: ScoreMetric) -> Result<f64> {
    network
        .variables()
        .map(|v| local_score(dataset, v, network.parents(v)?, metric))
        .sum()
}

/// Settings for [`learn_hill_climbing`].
#[derive(Clone, Debug)]
pub struct HillClimbingOptions {
    /// The score to maximize.
    pub metric: ScoreMetric,
    /// Edits that would give a node more parents than this are not considered.
    pub max_parents: usize,
    /// Upper bound on the number of edits applied.
    pub max_iterations: usize,
    /// Structure to start from; its variables must be the dataset's. Starts empty if `None`.
    pub initial: Option<Network>,
    /// How the conditional tables of the result are estimated.
    pub parameters: ParameterOptions,
    /// Checked before every iteration.
    pub cancel: CancelToken,
}

impl Default for HillClimbingOptions {
    fn default() -> Self {
        HillClimbingOptions {
            metric: ScoreMetric::default(),
            max_parents: 3,
            max_iterations: 1000,
            initial: None,
            parameters: ParameterOptions::default(),
            cancel: CancelToken::new(),
        }
    }
}

/// Caches local scores by node and parent set, since most of them survive each edit.
struct ScoreCache<'a> {
    dataset: &'a Dataset,
    metric: ScoreMetric,
    scores: HashMap<(Variable, VariableSet), f64>,
}

impl ScoreCache<'_> {
    fn score(&mut self, variable: Variable, parents: &[Variable]) -> Result<f64> {
        let key = (variable, VariableSet::new(parents));
        if let Some(score) = self.scores.get(&key) {
            return Ok(*score);
        }
        // The score doesn't depend on the parent order, so compute it over the sorted set.
        let score = local_score(self.dataset, variable, key.1.as_slice(), self.metric)?;
        self.scores.insert(key, score);
        Ok(score)
    }

    fn with(&mut self, network: &Network, variable: Variable, extra: Variable) -> Result<f64> {
        let mut parents = network.parents(variable)?.to_vec();
        parents.push(extra);
        self.score(variable, &parents)
    }

    fn without(&mut self, network: &Network, variable: Variable, removed: Variable) -> Result<f64> {
        let parents: Vec<Variable> = network
            .parents(variable)?
            .iter()
            .copied()
            .filter(|p| *p != removed)
            .collect();
        self.score(variable, &parents)
    }

    fn current(&mut self, network: &Network, variable: Variable) -> Result<f64> {
        let parents = network.parents(variable)?.to_vec();
        self.score(variable, &parents)
    }

    /// How much the network score changes if `edit` is applied.
    fn delta(&mut self, network: &Network, edit: LinkEdit) -> Result<f64> {
        Ok(match edit {
            LinkEdit::Add(from, to) => self.with(network, to, from)? - self.current(network, to)?,
            LinkEdit::Remove(from, to) => {
                self.without(network, to, from)? - self.current(network, to)?
            }
            LinkEdit::Invert(from, to) => {
                self.without(network, to, from)? - self.current(network, to)?
                    + self.with(network, from, to)?
                    - self.current(network, from)?
            }
        })
    }
}

/// Whether `edit` keeps the network acyclic and within the parent limit.
fn allowed(network: &Network, edit: LinkEdit, max_parents: usize) -> Result<bool> {
    Ok(match edit {
        LinkEdit::Add(from, to) => {
            network.parents(to)?.len() < max_parents && !network.exists_path(to, from)
        }
        LinkEdit::Remove(..) => true,
        LinkEdit::Invert(from, to) => {
            network.parents(from)?.len() < max_parents
                && !network
                    .children(from)?
                    .iter()
                    .any(|c| *c != to && network.exists_path(*c, to))
        }
    })
}

/// Learns a network by greedy search over single-link edits.
///
/// Each iteration scores every addition, removal, and reversal of a link that keeps the graph
/// acyclic and within the parent limit, and applies the one that improves the score most. The
/// search stops when no edit improves the score.
pub fn learn_hill_climbing(dataset: &Dataset, options: &HillClimbingOptions) -> Result<Network> {
    let mut network = match &options.initial {
        Some(initial) => {
            let mut network = Network::with_catalog(dataset.catalog().clone());
            for (from, to) in initial.links() {
                let from = network.variable(initial.catalog().name(from))?;
                let to = network.variable(initial.catalog().name(to))?;
                network.add_link(from, to)?;
            }
            network
        }
        None => Network::with_catalog(dataset.catalog().clone()),
    };
    let mut cache = ScoreCache {
        dataset,
        metric: options.metric,
        scores: HashMap::new(),
    };
    let variables: Vec<Variable> = network.variables().collect();

    let mut iterations = 0;
    while iterations < options.max_iterations {
        options.cancel.check()?;
        let mut best: Option<(f64, LinkEdit)> = None;
        for &from in variables.iter() {
            for &to in variables.iter() {
                if from == to {
                    continue;
                }
                let edits = if network.has_link(from, to) {
                    vec![LinkEdit::Remove(from, to), LinkEdit::Invert(from, to)]
                } else if network.has_link(to, from) {
                    Vec::new()
                } else {
                    vec![LinkEdit::Add(from, to)]
                };
                for edit in edits {
                    if !allowed(&network, edit, options.max_parents)? {
                        continue;
                    }
                    let delta = cache.delta(&network, edit)?;
                    if delta > best.map_or(0.0, |(d, _)| d) {
                        best = Some((delta, edit));
                    }
                }
            }
        }
        match best {
            Some((delta, edit)) if delta > 1e-10 => {
                trace!("applying {:?} (score +{:.6})", edit, delta);
                network.apply(edit)?;
                iterations += 1;
            }
            _ => break,
        }
    }
    debug!(
        "hill climbing stopped after {} edits with {} links, score {:.4}",
        iterations,
        network.links().count(),
        network_score(dataset, &network, options.metric)?
    );

    estimate_parameters(&mut network, dataset, &options.parameters)?;
    Ok(network)
}
