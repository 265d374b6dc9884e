//! Variable elimination.
//!
//! After restricting every potential to the evidence, each variable that is neither queried nor
//! observed is eliminated in turn: the potentials mentioning it are multiplied together and it is
//! marginalized out of the product. What is left is proportional to the joint posterior of the
//! query variables.

use super::{check_query, InferenceOptions, Posteriors};
use crate::error::{Error, Result};
use crate::evidence::EvidenceCase;
use crate::graph::{elimination_order, UndirectedGraph};
use crate::network::Network;
use crate::operations::{marginalize, multiply_all, normalize, project, restrict, Reduction};
use crate::table::TablePotential;
use crate::variable::{Variable, VariableSet};
use log::{debug, trace};

/// Multiplies together every potential of `network` restricted to `evidence` and eliminates every
/// variable except `keep`, returning the unnormalized result over the unobserved variables of
/// `keep`, in the order `keep` lists them.
///
/// With [`Reduction::Sum`] and an empty `keep`, the result is a constant holding the probability
/// of the evidence.
pub fn eliminate(
    network: &Network,
    evidence: &EvidenceCase,
    keep: &[Variable],
    options: &InferenceOptions,
) -> Result<TablePotential> {
    check_query(network, evidence, keep)?;
    let mut potentials: Vec<TablePotential> = network
        .table_potentials()?
        .iter()
        .map(|p| restrict(p, evidence))
        .collect();

    let kept = VariableSet::new(keep);
    let order = order_for(&potentials, &kept, options);
    debug!("eliminating {} variables", order.len());

    for variable in order {
        options.cancel.check()?;
        let (mentioning, rest): (Vec<_>, Vec<_>) =
            potentials.into_iter().partition(|p| p.contains(variable));
        potentials = rest;
        if mentioning.is_empty() {
            continue;
        }
        let product = multiply_all(mentioning.iter());
        let reduced = marginalize(&product, &[variable], options.reduction)?;
        trace!(
            "eliminated {:?}: {} potentials into a table of {} cells",
            variable,
            mentioning.len(),
            reduced.len()
        );
        potentials.push(reduced);
    }

    let product = multiply_all(potentials.iter());
    let mut unobserved: Vec<Variable> = Vec::with_capacity(keep.len());
    for &variable in keep {
        if !evidence.contains(variable) && !unobserved.contains(&variable) {
            unobserved.push(variable);
        }
    }
    Ok(project(&product, &unobserved, options.reduction))
}

/// The variables to eliminate: the explicit order if there is one, minus anything kept or
/// already gone, followed by whatever else remains in heuristic order.
fn order_for(
    potentials: &[TablePotential],
    keep: &VariableSet,
    options: &InferenceOptions,
) -> Vec<Variable> {
    let graph = UndirectedGraph::from_scopes(potentials.iter().map(|p| p.scope()));
    let mut order: Vec<Variable> = options
        .elimination_order
        .iter()
        .flatten()
        .copied()
        .filter(|v| graph.contains(*v) && !keep.contains(*v))
        .collect();
    for variable in elimination_order(&graph, options.heuristic, keep) {
        if !keep.contains(variable) && !order.contains(&variable) {
            order.push(variable);
        }
    }
    order
}

fn normalized(table: &TablePotential, options: &InferenceOptions) -> Result<TablePotential> {
    if options.reduction == Reduction::Sum && table.sum() == 0.0 {
        return Err(Error::ImpossibleEvidence);
    }
    normalize(table, options.zero_sum)
}

/// The normalized joint posterior of the unobserved variables of `queries`, over them in the
/// order given.
pub fn joint_posterior(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<TablePotential> {
    let table = eliminate(network, evidence, queries, options)?;
    normalized(&table, options)
}

/// The probability of `evidence` under `network`.
pub fn probability_of_evidence(
    network: &Network,
    evidence: &EvidenceCase,
    options: &InferenceOptions,
) -> Result<f64> {
    let options = InferenceOptions {
        reduction: Reduction::Sum,
        ..options.clone()
    };
    Ok(eliminate(network, evidence, &[], &options)?.sum())
}

/// The posterior of each query variable, computed by a separate elimination per variable.
///
/// Observed query variables get all their mass on the observed state, provided the evidence is
/// possible at all.
pub fn posteriors(
    network: &Network,
    evidence: &EvidenceCase,
    queries: &[Variable],
    options: &InferenceOptions,
) -> Result<Posteriors> {
    check_query(network, evidence, queries)?;
    let mut result = Posteriors::default();
    let mut checked = false;
    for &variable in queries {
        let table = match evidence.state_of(variable) {
            Some(state) => {
                if !checked && probability_of_evidence(network, evidence, options)? == 0.0 {
                    return Err(Error::ImpossibleEvidence);
                }
                checked = true;
                TablePotential::indicator(variable, state)?
            }
            None => joint_posterior(network, evidence, &[variable], options)?,
        };
        result.insert(variable, table);
    }
    Ok(result)
}
