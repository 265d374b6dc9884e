use clap::{Parser, ValueEnum};
use potential_inference::*;
use std::io;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    /// Constraint-based search with conditional independence tests.
    Pc,
    /// Score-based greedy search.
    HillClimbing,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Metric {
    K2,
    Bic,
    Aic,
    LogLikelihood,
}

impl From<Metric> for ScoreMetric {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::K2 => ScoreMetric::K2,
            Metric::Bic => ScoreMetric::Bic,
            Metric::Aic => ScoreMetric::Aic,
            Metric::LogLikelihood => ScoreMetric::LogLikelihood,
        }
    }
}

/// Learns a Bayesian network from tab-separated cases on standard input.
///
/// The first line names the variables; every other line lists one state per variable, optionally
/// preceded by how many times that case was observed.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Structure learning algorithm.
    #[arg(long, value_enum, default_value_t = Method::HillClimbing)]
    method: Method,

    /// Significance level of the PC algorithm's independence tests.
    #[arg(long, default_value_t = 0.05)]
    significance: f64,

    /// Largest conditioning set the PC algorithm tries.
    #[arg(long, default_value_t = 3)]
    max_conditioning: usize,

    /// Score maximized by hill climbing.
    #[arg(long, value_enum, default_value_t = Metric::K2)]
    metric: Metric,

    /// Most parents hill climbing gives any node.
    #[arg(long, default_value_t = 3)]
    max_parents: usize,

    /// Dirichlet pseudo-count for parameter estimation.
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = Dataset::read_tsv(io::stdin().lock())?;
    println!(
        "data: {} variables, {} distinct cases, sample size {}",
        data.catalog().len(),
        data.len(),
        data.sample_size()
    );

    let parameters = ParameterOptions { alpha: args.alpha };
    let network = match args.method {
        Method::Pc => learn_pc(
            &data,
            &PcOptions {
                significance: args.significance,
                max_conditioning: args.max_conditioning,
                parameters,
                ..PcOptions::default()
            },
        )?,
        Method::HillClimbing => learn_hill_climbing(
            &data,
            &HillClimbingOptions {
                metric: args.metric.into(),
                max_parents: args.max_parents,
                parameters,
                ..HillClimbingOptions::default()
            },
        )?,
    };

    let catalog = network.catalog();
    println!();
    println!("links:");
    for (from, to) in network.links() {
        println!("  {} -> {}", catalog.name(from), catalog.name(to));
    }

    println!();
    println!("conditional tables:");
    for variable in network.variables() {
        let parents: Vec<&str> = network
            .parents(variable)?
            .iter()
            .map(|p| catalog.name(*p))
            .collect();
        let cells = network.conditional_table(variable)?.len();
        if parents.is_empty() {
            println!("  P({}): {} cells", catalog.name(variable), cells);
        } else {
            println!(
                "  P({} | {}): {} cells",
                catalog.name(variable),
                parents.join(", "),
                cells
            );
        }
    }

    println!();
    println!("scores:");
    for metric in ScoreMetric::ALL {
        println!(
            "  {}: {:.2}",
            metric,
            network_score(&data, &network, metric)?
        );
    }

    Ok(())
}
