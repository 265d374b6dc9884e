//! Learning networks from data.
//!
//! - [`Dataset`] holds weighted cases read from tab-separated text.
//! - [`estimate_parameters`] fills in conditional tables for a given structure.
//! - [`learn_pc`] finds a structure with conditional independence tests ([`g_squared`]).
//! - [`learn_hill_climbing`] finds a structure by greedily improving a [`ScoreMetric`].
//!
//! Both structure learners change the graph one link at a time and never accept a change that
//! would create a directed cycle.

mod dataset;
mod hill_climbing;
mod independence;
mod parameters;
mod pc;

pub use dataset::Dataset;
pub use hill_climbing::{
    learn_hill_climbing, local_score, network_score, HillClimbingOptions, ScoreMetric,
};
pub use independence::{g_squared, IndependenceTest};
pub use parameters::{estimate_parameters, ParameterOptions};
pub use pc::{learn_pc, pc_pattern, PartiallyDirectedGraph, PcOptions};
