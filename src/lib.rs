#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate provides exact and approximate inference over discrete Bayesian networks, built on
//! an algebra of dense probability tables, plus structure and parameter learning.
//!
//! Inference algorithms, as described by these papers:
//!
//! - Zhang and Poole, A Simple Approach to Bayesian Network Computations, 1994 (variable
//!   elimination)
//! - Jensen, Lauritzen, and Olesen, Bayesian Updating in Causal Probabilistic Networks by Local
//!   Computations, 1990 (Hugin propagation)
//! - Henrion, Propagating Uncertainty in Bayesian Networks by Probabilistic Logic Sampling, 1988
//! - Fung and Chang, Weighing and Integrating Evidence for Stochastic Simulation in Bayesian
//!   Networks, 1990 (likelihood weighting)
//!
//! Learning algorithms:
//!
//! - Spirtes, Glymour, and Scheines, Causation, Prediction, and Search, 2000 (the PC algorithm)
//! - Meek, Causal Inference and Causal Explanation with Background Knowledge, 1995 (orientation
//!   rules)
//! - Cooper and Herskovits, A Bayesian Method for the Induction of Probabilistic Networks from
//!   Data, 1992 (the K2 score)
//!
//! Everything operates on [`TablePotential`]s: a function over every combination of states of an
//! ordered tuple of variables, stored as a flat array addressed in mixed radix. The operations in
//! [`operations`] never modify their inputs, so the potentials a [`Network`] owns are never
//! touched by inference.
//!
//! ```
//! use potential_inference::{infer, Algorithm, EvidenceCase, InferenceOptions, Network};
//!
//! let mut network = Network::new();
//! let cloudy = network.add_variable("cloudy", &["yes", "no"]).unwrap();
//! let rain = network.add_variable("rain", &["yes", "no"]).unwrap();
//! network.add_link(cloudy, rain).unwrap();
//! network.set_table(cloudy, vec![0.5, 0.5]).unwrap();
//! network.set_table(rain, vec![0.8, 0.2, 0.2, 0.8]).unwrap();
//!
//! let mut evidence = EvidenceCase::new();
//! evidence.add_finding(rain, 0).unwrap();
//!
//! let options = InferenceOptions::new().algorithm(Algorithm::Hugin);
//! let posteriors = infer(&network, &evidence, &[cloudy], &options).unwrap();
//! assert!((posteriors.probability(cloudy, 0).unwrap() - 0.8).abs() < 1e-9);
//! ```

pub use sorted_iter;

mod error;
mod evidence;
mod graph;
pub mod inference;
mod join_tree;
pub mod learning;
mod network;
pub mod operations;
mod potential;
mod table;
mod variable;

pub use error::{Error, Result};
pub use evidence::{EvidenceCase, Finding};
pub use graph::{elimination_order, triangulate, EliminationHeuristic, UndirectedGraph};
pub use inference::sampling::{likelihood_weighting, logic_sampling};
pub use inference::{
    infer, Algorithm, CancelToken, HuginPropagation, InferenceOptions, Posteriors,
    PropagationState, SamplingReport,
};
pub use join_tree::{Clique, JoinTree};
pub use learning::{
    estimate_parameters, g_squared, learn_hill_climbing, learn_pc, local_score, network_score,
    pc_pattern, Dataset, HillClimbingOptions, IndependenceTest, ParameterOptions,
    PartiallyDirectedGraph, PcOptions, ScoreMetric,
};
pub use network::{LinkEdit, Network};
pub use operations::{
    divide, marginalize, max_out, multiply, multiply_all, normalize, normalize_conditional,
    project, restrict, sum_out, Reduction, ZeroSumPolicy,
};
pub use potential::{CanonicalKind, CanonicalPotential, Potential, TreeNode, TreePotential};
pub use table::{Configurations, Scope, States, TablePotential};
pub use variable::{Catalog, Variable, VariableSet};
