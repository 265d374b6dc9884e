use super::Dataset;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::operations::{normalize_conditional, ZeroSumPolicy};
use log::debug;

/// Settings for [`estimate_parameters`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterOptions {
    /// Pseudo-count added to every cell of every conditional table before normalizing, as if
    /// drawn from a symmetric Dirichlet prior. 1 gives Laplace smoothing; 0 gives maximum
    /// likelihood estimates, with unseen parent configurations filled uniformly.
    pub alpha: f64,
}

impl Default for ParameterOptions {
    fn default() -> Self {
        ParameterOptions { alpha: 1.0 }
    }
}

/// Sets the potential of every node of `network` to its conditional frequencies in `dataset`.
///
/// The network's variables must be the dataset's, as is the case for a network created with
/// [`Network::with_catalog`] from the dataset's catalog.
///
/// ```
/// use potential_inference::{estimate_parameters, Dataset, Network, ParameterOptions};
///
/// let input = "a\tb\n3\tx\tx\n1\tx\ty\n2\ty\ty\n";
/// let data = Dataset::read_tsv(input.as_bytes()).unwrap();
/// let mut network = Network::with_catalog(data.catalog().clone());
/// let a = network.variable("a").unwrap();
/// let b = network.variable("b").unwrap();
/// network.add_link(a, b).unwrap();
///
/// estimate_parameters(&mut network, &data, &ParameterOptions { alpha: 0.0 }).unwrap();
/// let cpt = network.conditional_table(b).unwrap();
/// assert_eq!(cpt.values(), &[0.75, 0.25, 0.0, 1.0]);
/// ```
pub fn estimate_parameters(
    network: &mut Network,
    dataset: &Dataset,
    options: &ParameterOptions,
) -> Result<()> {
    if options.alpha < 0.0 || !options.alpha.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "pseudo-count must be a non-negative number, got {}",
            options.alpha
        )));
    }
    let variables: Vec<_> = network.variables().collect();
    for variable in variables {
        if !dataset.catalog().contains(variable)
            || dataset.catalog().name(variable) != network.catalog().name(variable)
        {
            return Err(Error::UnknownVariable(
                network.catalog().name(variable).to_owned(),
            ));
        }
        let family = network.family(variable)?;
        let mut counts = dataset.frequencies(&family)?;
        counts.values_mut().iter_mut().for_each(|c| *c += options.alpha);
        let table = normalize_conditional(&counts, ZeroSumPolicy::Uniform)?;
        network.set_potential(variable, table)?;
    }
    debug!(
        "estimated {} conditional tables from {} cases",
        network.len(),
        dataset.len()
    );
    Ok(())
}
