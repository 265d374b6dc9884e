use super::Dataset;
use crate::error::{Error, Result};
use crate::operations::sum_out;
use crate::table::{Odometer, Scope, Strides};
use crate::variable::Variable;
use smallvec::smallvec;
use statrs::distribution::{ChiSquared, Univariate};

/// The outcome of a conditional independence test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndependenceTest {
    /// The G² statistic, twice the mutual information (in nats) scaled by the sample size.
    pub statistic: f64,
    /// Degrees of freedom of the reference chi-squared distribution.
    pub degrees_of_freedom: f64,
    /// Probability of a statistic at least this large if the variables were independent.
    pub p_value: f64,
}

impl IndependenceTest {
    /// Returns `true` if independence can't be rejected at `significance`.
    pub fn independent(&self, significance: f64) -> bool {
        self.p_value > significance
    }
}

/// Tests whether `x` and `y` are independent given `given` with the G² likelihood-ratio test.
///
/// `G² = 2 Σ N(x,y,z) ln(N(x,y,z) N(z) / (N(x,z) N(y,z)))`, compared against a chi-squared
/// distribution with `(|X|-1)(|Y|-1)Π|Z|` degrees of freedom.
///
/// ```
/// use potential_inference::{g_squared, Dataset};
///
/// let input = "a\tb\n30\tx\tx\n10\tx\ty\n30\ty\tx\n10\ty\ty\n";
/// let data = Dataset::read_tsv(input.as_bytes()).unwrap();
/// let a = data.catalog().variable("a").unwrap();
/// let b = data.catalog().variable("b").unwrap();
/// let test = g_squared(&data, a, b, &[]).unwrap();
/// assert!(test.statistic.abs() < 1e-9);
/// assert_eq!(test.degrees_of_freedom, 1.0);
/// assert!(test.independent(0.05));
/// ```
pub fn g_squared(
    dataset: &Dataset,
    x: Variable,
    y: Variable,
    given: &[Variable],
) -> Result<IndependenceTest> {
    let mut scope: Scope = smallvec![x, y];
    scope.extend_from_slice(given);
    let joint = dataset.frequencies(&scope)?;
    let xz = sum_out(&joint, &[y])?;
    let yz = sum_out(&joint, &[x])?;
    let z = sum_out(&joint, &[x, y])?;

    let strides: [Strides; 3] = [
        xz.strides_along(&scope),
        yz.strides_along(&scope),
        z.strides_along(&scope),
    ];
    let mut walk = Odometer::new(&scope, &strides);
    let mut statistic = 0.0;
    for n_xyz in joint.values() {
        if *n_xyz > 0.0 {
            let n_xz = xz.values()[walk.index(0)];
            let n_yz = yz.values()[walk.index(1)];
            let n_z = z.values()[walk.index(2)];
            statistic += n_xyz * (n_xyz * n_z / (n_xz * n_yz)).ln();
        }
        walk.advance();
    }
    statistic *= 2.0;

    let degrees_of_freedom = ((x.num_states() - 1) * (y.num_states() - 1)) as f64
        * given.iter().map(|v| v.num_states() as f64).product::<f64>();
    let p_value = if degrees_of_freedom == 0.0 {
        1.0
    } else {
        let chi2 = ChiSquared::new(degrees_of_freedom)
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;
        1.0 - chi2.cdf(statistic.max(0.0))
    };
    Ok(IndependenceTest {
        statistic,
        degrees_of_freedom,
        p_value,
    })
}
