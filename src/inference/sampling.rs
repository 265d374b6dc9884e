//! Stochastic inference by forward sampling.
//!
//! Both algorithms visit the variables in topological order, so that when a variable is sampled
//! its parents already have states, and the parents' configuration picks out a contiguous run of
//! the child's conditional table.
//!
//! - Logic sampling samples every variable and throws away samples that contradict the evidence.
//!   It wastes most of its work when the evidence is unlikely.
//! - Likelihood weighting clamps observed variables to their states and weights each sample by
//!   the probability of those states given the sampled parents.

use super::{check_query, InferenceOptions, Posteriors};
use crate::error::{Error, Result};
use crate::evidence::EvidenceCase;
use crate::network::Network;
use crate::table::TablePotential;
use crate::variable::Variable;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// How many samples are drawn between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Statistics about a sampling run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SamplingReport {
    /// Samples drawn.
    pub samples: usize,
    /// Samples with non-zero weight.
    pub accepted: usize,
    /// Sum of the sample weights.
    pub total_weight: f64,
}

impl SamplingReport {
    /// The fraction of samples that contributed to the estimate.
    pub fn acceptance_rate(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.accepted as f64 / self.samples as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Method {
    Logic,
    Weighting,
}

/// A variable's conditional table laid out for sampling.
struct Sampler {
    variable: Variable,
    parents: Vec<Variable>,
    table: TablePotential,
}

impl Sampler {
    /// The run of the table for the current states of the parents.
    fn distribution<'a>(&'a self, states: &[usize]) -> &'a [f64] {
        let run = self.variable.num_states();
        let offsets = &self.table.offsets()[1..];
        let base: usize = self
            .parents
            .iter()
            .zip(offsets)
            .map(|(parent, offset)| offset * states[parent.id()])
            .sum();
        &self.table.values()[base..base + run]
    }
}

/// Draws a state with probability proportional to `weights`, or `None` if they sum to zero.
fn draw<R: Rng>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let mut target = rng.gen::<f64>() * total;
    let mut last = None;
    for (state, weight) in weights.iter().enumerate() {
        if *weight > 0.0 {
            if target < *weight {
                return Some(state);
            }
            target -= weight;
            last = Some(state);
        }
    }
    // Rounding can leave a sliver of `target` past the final run.
    last
}

fn run(
    method: Method,
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<(Posteriors, SamplingReport)> {
    check_query(network, evidence, queries)?;
    if options.samples == 0 {
        return Err(Error::InvalidParameter(
            "sampling needs at least one sample".to_owned(),
        ));
    }
    let samplers = network
        .topological_order()?
        .into_iter()
        .map(|variable| {
            Ok(Sampler {
                variable,
                parents: network.parents(variable)?.to_vec(),
                table: network.conditional_table(variable)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(options.seed);
    let mut counts: Vec<TablePotential> = queries
        .iter()
        .map(|q| TablePotential::zeros(&[*q]))
        .collect();
    let mut states = vec![0; network.len()];
    let mut report = SamplingReport::default();

    for sample in 0..options.samples {
        if sample % CANCEL_CHECK_INTERVAL == 0 {
            options.cancel.check()?;
        }
        report.samples += 1;

        let mut weight = 1.0;
        for sampler in samplers.iter() {
            let distribution = sampler.distribution(&states);
            let observed = evidence.state_of(sampler.variable);
            let state = match (method, observed) {
                (Method::Weighting, Some(state)) => {
                    weight *= distribution[state];
                    Some(state)
                }
                (Method::Logic, Some(state)) => match draw(&mut rng, distribution) {
                    Some(drawn) if drawn == state => Some(state),
                    _ => None,
                },
                (_, None) => draw(&mut rng, distribution),
            };
            match state {
                Some(state) if weight > 0.0 => states[sampler.variable.id()] = state,
                _ => {
                    weight = 0.0;
                    break;
                }
            }
        }

        if weight > 0.0 {
            report.accepted += 1;
            report.total_weight += weight;
            for (query, count) in queries.iter().zip(counts.iter_mut()) {
                count.values_mut()[states[query.id()]] += weight;
            }
        }
    }

    debug!(
        "drew {} samples, accepted {}, total weight {}",
        report.samples, report.accepted, report.total_weight
    );
    if report.total_weight <= 0.0 {
        return Err(Error::ImpossibleEvidence);
    }

    let mut posteriors = Posteriors::default();
    for (query, mut count) in queries.iter().zip(counts) {
        let table = match evidence.state_of(*query) {
            Some(state) => TablePotential::indicator(*query, state)?,
            None => {
                count
                    .values_mut()
                    .iter_mut()
                    .for_each(|v| *v /= report.total_weight);
                count
            }
        };
        posteriors.insert(*query, table);
    }
    Ok((posteriors, report))
}

/// Estimates posteriors by forward sampling and rejecting samples that disagree with the
/// evidence.
pub fn logic_sampling(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<(Posteriors, SamplingReport)> {
    run(Method::Logic, network, evidence, queries, options)
}

/// Estimates posteriors by forward sampling with the evidence clamped, weighting each sample by
/// the likelihood of the evidence.
///
/// ```
/// use potential_inference::{likelihood_weighting, EvidenceCase, InferenceOptions, Network};
///
/// let mut network = Network::new();
/// let a = network.add_variable("A", &["t", "f"]).unwrap();
/// let b = network.add_variable("B", &["t", "f"]).unwrap();
/// network.add_link(a, b).unwrap();
/// network.set_table(a, vec![0.3, 0.7]).unwrap();
/// network.set_table(b, vec![0.8, 0.2, 0.1, 0.9]).unwrap();
///
/// let mut evidence = EvidenceCase::new();
/// evidence.add_finding(b, 0).unwrap();
/// let options = InferenceOptions::new().samples(20_000).seed(1);
/// let (posteriors, report) = likelihood_weighting(&network, &evidence, &[a], &options).unwrap();
/// assert_eq!(report.samples, 20_000);
/// assert!((posteriors.probability(a, 0).unwrap() - 0.7742).abs() < 0.03);
/// ```
pub fn likelihood_weighting(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<(Posteriors, SamplingReport)> {
    run(Method::Weighting, network, evidence, queries, options)
}
