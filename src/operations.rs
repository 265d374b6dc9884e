//! The table algebra used by every inference algorithm: multiplication, marginalization,
//! division, normalization, and restriction to evidence.
//!
//! All operations take their inputs by reference and return new tables, so the potentials a
//! network owns are never modified by inference.

use crate::error::{Error, Result};
use crate::evidence::EvidenceCase;
use crate::table::{Odometer, Scope, Strides, TablePotential};
use crate::variable::Variable;
use log::{trace, warn};
use smallvec::SmallVec;

/// How marginalization combines the cells it collapses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reduction {
    /// Add them up, giving ordinary marginals.
    Sum,
    /// Keep the largest, giving max-marginals for most-probable-explanation queries.
    Max,
}

impl Default for Reduction {
    fn default() -> Self {
        Reduction::Sum
    }
}

/// What normalization does with a configuration whose values sum to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZeroSumPolicy {
    /// Fail with [`Error::NormalizeNullVector`].
    Fail,
    /// Replace the configuration with a uniform distribution.
    Uniform,
}

impl Default for ZeroSumPolicy {
    fn default() -> Self {
        ZeroSumPolicy::Fail
    }
}

/// Multiplies two tables.
///
/// The result's scope is the scope of `a` followed by any variables of `b` that `a` lacks, and
/// each cell is the product of the cells of `a` and `b` that agree with it.
///
/// ```
/// use potential_inference::{multiply, TablePotential, Variable};
///
/// let a = Variable::new(0, 2);
/// let b = Variable::new(1, 2);
/// let pa = TablePotential::new(&[a], vec![0.3, 0.7]).unwrap();
/// let pb_a = TablePotential::new(&[b, a], vec![0.8, 0.2, 0.1, 0.9]).unwrap();
///
/// let joint = multiply(&pa, &pb_a);
/// assert_eq!(joint.scope(), &[a, b]);
/// assert!((joint.value(&[0, 0]).unwrap() - 0.24).abs() < 1e-12);
/// assert!((joint.value(&[1, 0]).unwrap() - 0.07).abs() < 1e-12);
/// assert!((joint.sum() - 1.0).abs() < 1e-12);
/// ```
pub fn multiply(a: &TablePotential, b: &TablePotential) -> TablePotential {
    multiply_all([a, b])
}

/// Multiplies any number of tables in one pass over the result.
///
/// The scope is the union of the input scopes in order of first appearance. With no inputs the
/// result is the constant 1.
pub fn multiply_all<'a, I>(tables: I) -> TablePotential
where
    I: IntoIterator<Item = &'a TablePotential>,
{
    let tables: SmallVec<[&TablePotential; 4]> = tables.into_iter().collect();
    match tables.len() {
        0 => return TablePotential::constant(1.0),
        1 => return tables[0].clone(),
        _ => {}
    }

    let mut scope = Scope::new();
    for table in tables.iter() {
        for variable in table.scope() {
            if !scope.contains(variable) {
                scope.push(*variable);
            }
        }
    }

    let strides: SmallVec<[Strides; 2]> = tables.iter().map(|t| t.strides_along(&scope)).collect();
    let mut result = TablePotential::zeros(&scope);
    let mut walk = Odometer::new(&scope, &strides);
    for cell in result.values.iter_mut() {
        let mut product = 1.0;
        for (input, table) in tables.iter().enumerate() {
            product *= table.values[walk.index(input)];
        }
        *cell = product;
        walk.advance();
    }
    trace!("multiplied {} tables into {:?}", tables.len(), result.scope);
    result
}

/// Removes `remove` from the scope of `a`, combining the collapsed cells with `reduction`.
///
/// ```
/// use potential_inference::{marginalize, Reduction, TablePotential, Variable};
///
/// let a = Variable::new(0, 2);
/// let b = Variable::new(1, 2);
/// let ab = TablePotential::new(&[a, b], vec![0.1, 0.2, 0.3, 0.4]).unwrap();
///
/// let sum_b = marginalize(&ab, &[a], Reduction::Sum).unwrap();
/// assert_eq!(sum_b.scope(), &[b]);
/// assert!((sum_b.values()[0] - 0.3).abs() < 1e-12);
/// assert!((sum_b.values()[1] - 0.7).abs() < 1e-12);
///
/// let max_a = marginalize(&ab, &[b], Reduction::Max).unwrap();
/// assert_eq!(max_a.values(), &[0.3, 0.4]);
///
/// assert!(marginalize(&sum_b, &[a], Reduction::Sum).is_err());
/// ```
pub fn marginalize(
    a: &TablePotential,
    remove: &[Variable],
    reduction: Reduction,
) -> Result<TablePotential> {
    for variable in remove {
        if !a.contains(*variable) {
            return Err(Error::VariableNotInScope {
                variable: *variable,
                scope: a.scope().to_vec(),
            });
        }
    }
    let keep: Scope = a
        .scope()
        .iter()
        .copied()
        .filter(|v| !remove.contains(v))
        .collect();
    Ok(reduce_onto(a, &keep, reduction))
}

/// Sums `remove` out of `a`.
pub fn sum_out(a: &TablePotential, remove: &[Variable]) -> Result<TablePotential> {
    marginalize(a, remove, Reduction::Sum)
}

/// Maximizes `remove` out of `a`.
pub fn max_out(a: &TablePotential, remove: &[Variable]) -> Result<TablePotential> {
    marginalize(a, remove, Reduction::Max)
}

/// Marginalizes `a` down to the variables of `keep` that are in its scope, in the order `keep`
/// lists them. Variables of `keep` outside the scope are ignored, as are repeats.
pub fn project(a: &TablePotential, keep: &[Variable], reduction: Reduction) -> TablePotential {
    let mut kept = Scope::new();
    for &variable in keep {
        if a.contains(variable) && !kept.contains(&variable) {
            kept.push(variable);
        }
    }
    reduce_onto(a, &kept, reduction)
}

fn reduce_onto(a: &TablePotential, keep: &[Variable], reduction: Reduction) -> TablePotential {
    if keep == a.scope() {
        return a.clone();
    }
    let initial = match reduction {
        Reduction::Sum => 0.0,
        Reduction::Max => f64::NEG_INFINITY,
    };
    let mut result = TablePotential::filled(keep, initial);

    // Walk the input in its own order and scatter into the output, whose stride is zero along
    // every variable being removed.
    let strides = result.strides_along(a.scope());
    let mut walk = Odometer::new(a.scope(), &[strides]);
    for value in a.values.iter() {
        let cell = &mut result.values[walk.index(0)];
        match reduction {
            Reduction::Sum => *cell += value,
            Reduction::Max => *cell = cell.max(*value),
        }
        walk.advance();
    }
    result
}

/// Divides `a` by `b`, where the scope of `b` is contained in the scope of `a`.
///
/// Zero divided by zero is zero: in clique-tree propagation the only way a separator message can
/// be zero is if the numerator is zero too. A non-zero value divided by zero fails with
/// [`Error::DivisionByZero`] rather than producing an infinity.
///
/// ```
/// use potential_inference::{divide, TablePotential, Variable};
///
/// let a = Variable::new(0, 2);
/// let b = Variable::new(1, 2);
/// let ab = TablePotential::new(&[a, b], vec![0.2, 0.1, 0.0, 0.0]).unwrap();
/// let bm = TablePotential::new(&[b], vec![0.5, 0.0]).unwrap();
///
/// let ratio = divide(&ab, &bm).unwrap();
/// assert_eq!(ratio.values(), &[0.4, 0.2, 0.0, 0.0]);
/// ```
pub fn divide(a: &TablePotential, b: &TablePotential) -> Result<TablePotential> {
    for variable in b.scope() {
        if !a.contains(*variable) {
            return Err(Error::VariableNotInScope {
                variable: *variable,
                scope: a.scope().to_vec(),
            });
        }
    }
    let strides = b.strides_along(a.scope());
    let mut result = TablePotential::zeros(a.scope());
    let mut walk = Odometer::new(a.scope(), &[strides]);
    for (cell, numerator) in result.values.iter_mut().zip(a.values.iter()) {
        let denominator = b.values[walk.index(0)];
        *cell = if *numerator == 0.0 {
            0.0
        } else if denominator == 0.0 {
            return Err(Error::DivisionByZero);
        } else {
            numerator / denominator
        };
        walk.advance();
    }
    Ok(result)
}

/// Scales `a` so that all its cells sum to one.
///
/// ```
/// use potential_inference::{normalize, Error, TablePotential, Variable, ZeroSumPolicy};
///
/// let a = Variable::new(0, 4);
/// let t = TablePotential::new(&[a], vec![1., 1., 2., 4.]).unwrap();
/// assert_eq!(normalize(&t, ZeroSumPolicy::Fail).unwrap().values(), &[0.125, 0.125, 0.25, 0.5]);
///
/// let zero = TablePotential::zeros(&[a]);
/// assert!(matches!(normalize(&zero, ZeroSumPolicy::Fail), Err(Error::NormalizeNullVector)));
/// assert_eq!(normalize(&zero, ZeroSumPolicy::Uniform).unwrap().values(), &[0.25; 4]);
/// ```
pub fn normalize(a: &TablePotential, policy: ZeroSumPolicy) -> Result<TablePotential> {
    let mut result = a.clone();
    normalize_slice(&mut result.values, policy)?;
    Ok(result)
}

/// Normalizes a conditional table: for every configuration of the remaining variables, the
/// cells over the first (child) variable are scaled to sum to one.
///
/// ```
/// use potential_inference::{normalize_conditional, TablePotential, Variable, ZeroSumPolicy};
///
/// let child = Variable::new(0, 2);
/// let parent = Variable::new(1, 2);
/// let counts = TablePotential::new(&[child, parent], vec![3., 1., 0., 0.]).unwrap();
///
/// let cpt = normalize_conditional(&counts, ZeroSumPolicy::Uniform).unwrap();
/// assert_eq!(cpt.values(), &[0.75, 0.25, 0.5, 0.5]);
/// assert!(normalize_conditional(&counts, ZeroSumPolicy::Fail).is_err());
/// ```
pub fn normalize_conditional(a: &TablePotential, policy: ZeroSumPolicy) -> Result<TablePotential> {
    let mut result = a.clone();
    let run = a.scope().first().map_or(1, |child| child.num_states());
    // offsets[0] == 1, so each parent configuration is a contiguous run of cells.
    for chunk in result.values.chunks_mut(run) {
        normalize_slice(chunk, policy)?;
    }
    Ok(result)
}

pub(crate) fn normalize_slice(values: &mut [f64], policy: ZeroSumPolicy) -> Result<()> {
    let sum: f64 = values.iter().sum();
    if sum == 0.0 {
        match policy {
            ZeroSumPolicy::Fail => return Err(Error::NormalizeNullVector),
            ZeroSumPolicy::Uniform => {
                warn!(
                    "substituting a uniform distribution for {} cells summing to zero",
                    values.len()
                );
                let uniform = 1.0 / values.len() as f64;
                values.iter_mut().for_each(|v| *v = uniform);
                return Ok(());
            }
        }
    }
    values.iter_mut().for_each(|v| *v /= sum);
    Ok(())
}

/// Fixes every observed variable in the scope of `a` to its observed state and drops it from the
/// scope.
///
/// The result is a strided slice of the input, so this takes time proportional to the size of
/// the result. Restricting twice with the same evidence changes nothing the second time.
///
/// ```
/// use potential_inference::{restrict, EvidenceCase, TablePotential, Variable};
///
/// let a = Variable::new(0, 2);
/// let b = Variable::new(1, 3);
/// let ab = TablePotential::new(&[a, b], vec![1., 2., 3., 4., 5., 6.]).unwrap();
///
/// let mut evidence = EvidenceCase::new();
/// evidence.add_finding(b, 2).unwrap();
/// let restricted = restrict(&ab, &evidence);
/// assert_eq!(restricted.scope(), &[a]);
/// assert_eq!(restricted.values(), &[5., 6.]);
/// assert_eq!(restrict(&restricted, &evidence), restricted);
/// ```
pub fn restrict(a: &TablePotential, evidence: &EvidenceCase) -> TablePotential {
    let mut base = 0;
    let mut keep = Scope::new();
    let mut strides = Strides::new();
    for (variable, offset) in a.scope().iter().zip(a.offsets()) {
        match evidence.state_of(*variable) {
            Some(state) => base += offset * state,
            None => {
                keep.push(*variable);
                strides.push(*offset);
            }
        }
    }
    if keep.len() == a.scope().len() {
        return a.clone();
    }

    let mut result = TablePotential::zeros(&keep);
    let mut walk = Odometer::new(&keep, &[strides]).with_bases(&[base]);
    for cell in result.values.iter_mut() {
        *cell = a.values[walk.index(0)];
        walk.advance();
    }
    result
}
