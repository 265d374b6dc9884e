use crate::error::{Error, Result};
use crate::evidence::EvidenceCase;
use crate::variable::{Variable, VariableSet};
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// The ordered variables a table ranges over.
pub type Scope = SmallVec<[Variable; 4]>;

/// One state index per scope variable, in scope order.
pub type States = SmallVec<[usize; 4]>;

/// One stride per scope variable.
pub(crate) type Strides = SmallVec<[usize; 4]>;

/// A non-negative function over every combination of states of an ordered tuple of variables,
/// stored as a dense array.
///
/// The array is laid out in mixed radix with the first variable varying fastest: the flat index
/// of the configuration `(s0, s1, ..)` is `s0 * offsets[0] + s1 * offsets[1] + ..`, where
/// `offsets[0] = 1` and `offsets[i] = offsets[i-1] * num_states(scope[i-1])`.
///
/// When a table holds a conditional probability distribution, by convention its first variable is
/// the child and the rest are the conditioning parents, so that each parent configuration owns a
/// contiguous run of cells.
///
/// A table with an empty scope holds a single value.
#[derive(Clone, PartialEq)]
pub struct TablePotential {
    pub(crate) scope: Scope,
    pub(crate) offsets: Strides,
    pub(crate) values: Vec<f64>,
}

pub(crate) fn offsets_of(scope: &[Variable]) -> (Strides, usize) {
    let mut offsets = SmallVec::with_capacity(scope.len());
    let mut size = 1;
    for variable in scope {
        offsets.push(size);
        size *= variable.num_states();
    }
    (offsets, size)
}

fn check_distinct(scope: &[Variable]) -> Result<()> {
    for (i, a) in scope.iter().enumerate() {
        if scope[i + 1..].contains(a) {
            return Err(Error::RepeatedVariable(*a));
        }
    }
    Ok(())
}

impl TablePotential {
    /// Creates a table over `scope` from values listed in array order (first variable fastest).
    ///
    /// ```
    /// use potential_inference::{TablePotential, Variable};
    ///
    /// let a = Variable::new(0, 2);
    /// let b = Variable::new(1, 3);
    /// let table = TablePotential::new(&[a, b], vec![1., 2., 3., 4., 5., 6.]).unwrap();
    /// assert_eq!(table.offsets(), &[1, 2]);
    /// assert_eq!(table.value(&[1, 2]).unwrap(), 6.);
    /// assert!(TablePotential::new(&[a, b], vec![1.]).is_err());
    /// assert!(TablePotential::new(&[a, a], vec![1.; 4]).is_err());
    /// ```
    pub fn new(scope: &[Variable], values: Vec<f64>) -> Result<Self> {
        check_distinct(scope)?;
        let (offsets, size) = offsets_of(scope);
        if values.len() != size {
            return Err(Error::TableSize {
                scope: scope.to_vec(),
                expected: size,
                actual: values.len(),
            });
        }
        Ok(TablePotential {
            scope: SmallVec::from_slice(scope),
            offsets,
            values,
        })
    }

    /// Creates a table where every cell holds `value`.
    ///
    /// # Panics
    ///
    /// Panics if `scope` lists a variable twice.
    pub fn filled(scope: &[Variable], value: f64) -> Self {
        assert!(
            check_distinct(scope).is_ok(),
            "scope {:?} repeats a variable",
            scope
        );
        let (offsets, size) = offsets_of(scope);
        TablePotential {
            scope: SmallVec::from_slice(scope),
            offsets,
            values: vec![value; size],
        }
    }

    /// A table of zeros.
    pub fn zeros(scope: &[Variable]) -> Self {
        TablePotential::filled(scope, 0.0)
    }

    /// A table where every cell is `1 / size`, so it sums to one.
    pub fn uniform(scope: &[Variable]) -> Self {
        let size: usize = scope.iter().map(|v| v.num_states()).product();
        TablePotential::filled(scope, 1.0 / size as f64)
    }

    /// A table with no variables holding one value.
    pub fn constant(value: f64) -> Self {
        TablePotential {
            scope: SmallVec::new(),
            offsets: SmallVec::new(),
            values: vec![value],
        }
    }

    /// A table over one variable that is 1 at `state` and 0 elsewhere.
    pub fn indicator(variable: Variable, state: usize) -> Result<Self> {
        variable.check_state(state)?;
        let mut table = TablePotential::zeros(&[variable]);
        table.values[state] = 1.0;
        Ok(table)
    }

    /// The variables this table ranges over, in array order.
    pub fn scope(&self) -> &[Variable] {
        &self.scope
    }

    /// The scope as an unordered set.
    pub fn variables(&self) -> VariableSet {
        VariableSet::new(&self.scope)
    }

    /// The stride of each scope variable in the flat array.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The flat array of values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the flat array of values.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Consumes the table, returning its flat array.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Number of cells. Never zero.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`: even a table over no variables has one cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Position of `variable` in the scope.
    pub fn position(&self, variable: Variable) -> Option<usize> {
        self.scope.iter().position(|v| *v == variable)
    }

    /// Returns `true` if `variable` is in the scope.
    pub fn contains(&self, variable: Variable) -> bool {
        self.position(variable).is_some()
    }

    /// Converts a state index per scope variable into a flat array index.
    pub fn index_of(&self, states: &[usize]) -> Result<usize> {
        if states.len() != self.scope.len() {
            return Err(Error::TableSize {
                scope: self.scope.to_vec(),
                expected: self.scope.len(),
                actual: states.len(),
            });
        }
        let mut index = 0;
        for ((variable, offset), state) in self.scope.iter().zip(&self.offsets).zip(states) {
            variable.check_state(*state)?;
            index += offset * state;
        }
        Ok(index)
    }

    /// The value at one configuration, given as a state index per scope variable.
    pub fn value(&self, states: &[usize]) -> Result<f64> {
        Ok(self.values[self.index_of(states)?])
    }

    /// The value at the configuration picked out of `assignment`, which may mention more
    /// variables than the scope but must cover all of it.
    pub fn value_at(&self, assignment: &EvidenceCase) -> Result<f64> {
        let mut index = 0;
        for (variable, offset) in self.scope.iter().zip(&self.offsets) {
            let state = assignment
                .state_of(*variable)
                .ok_or(Error::UnassignedVariable(*variable))?;
            index += offset * state;
        }
        Ok(self.values[index])
    }

    /// Sum of every cell.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Iterates over every configuration in array order.
    ///
    /// ```
    /// use potential_inference::{TablePotential, Variable};
    ///
    /// let table = TablePotential::zeros(&[Variable::new(0, 2), Variable::new(1, 2)]);
    /// let configurations: Vec<Vec<usize>> =
    ///     table.configurations().map(|c| c.to_vec()).collect();
    /// assert_eq!(configurations, vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]);
    /// ```
    pub fn configurations(&self) -> Configurations {
        Configurations::new(&self.scope)
    }

    /// The configuration holding the largest value, with that value. Ties go to the earliest cell.
    pub fn argmax(&self) -> (States, f64) {
        let mut best = 0;
        for (index, value) in self.values.iter().enumerate() {
            if *value > self.values[best] {
                best = index;
            }
        }
        let states = self
            .scope
            .iter()
            .zip(&self.offsets)
            .map(|(variable, offset)| best / offset % variable.num_states())
            .collect();
        (states, self.values[best])
    }

    /// Returns a copy of this table with its scope permuted into `scope`.
    ///
    /// ```
    /// use potential_inference::{TablePotential, Variable};
    ///
    /// let a = Variable::new(0, 2);
    /// let b = Variable::new(1, 3);
    /// let ab = TablePotential::new(&[a, b], vec![1., 2., 3., 4., 5., 6.]).unwrap();
    /// let ba = ab.reorder(&[b, a]).unwrap();
    /// assert_eq!(ba.values(), &[1., 3., 5., 2., 4., 6.]);
    /// assert_eq!(ba.value(&[2, 1]).unwrap(), ab.value(&[1, 2]).unwrap());
    /// ```
    pub fn reorder(&self, scope: &[Variable]) -> Result<TablePotential> {
        if scope.len() != self.scope.len() || VariableSet::new(scope) != self.variables() {
            return Err(Error::ScopeMismatch {
                expected: self.scope.to_vec(),
                actual: scope.to_vec(),
            });
        }
        check_distinct(scope)?;
        if scope == &self.scope[..] {
            return Ok(self.clone());
        }
        let strides = self.strides_along(scope);
        let mut result = TablePotential::zeros(scope);
        let mut walk = Odometer::new(&result.scope, &[strides]);
        for cell in result.values.iter_mut() {
            *cell = self.values[walk.index(0)];
            walk.advance();
        }
        Ok(result)
    }

    /// The same table with its scope sorted by variable id.
    pub fn canonical(&self) -> TablePotential {
        let mut scope = self.scope.clone();
        scope.sort_unstable();
        // The sorted scope is a permutation of our own, which reorder always accepts.
        self.reorder(&scope).unwrap_or_else(|_| self.clone())
    }

    /// Compares two tables cell by cell regardless of scope order.
    ///
    /// ```
    /// use potential_inference::{TablePotential, Variable};
    ///
    /// let a = Variable::new(0, 2);
    /// let b = Variable::new(1, 2);
    /// let ab = TablePotential::new(&[a, b], vec![0.1, 0.2, 0.3, 0.4]).unwrap();
    /// let ba = TablePotential::new(&[b, a], vec![0.1, 0.3, 0.2, 0.4 + 1e-12]).unwrap();
    /// assert!(ab.approx_eq(&ba, 1e-9));
    /// ```
    pub fn approx_eq(&self, other: &TablePotential, tolerance: f64) -> bool {
        if self.variables() != other.variables() {
            return false;
        }
        match other.reorder(&self.scope) {
            Ok(other) => self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance),
            Err(_) => false,
        }
    }

    /// For each variable of `along`, how far this table's flat index moves when that variable's
    /// state increases by one. Variables outside this table's scope have stride zero.
    pub(crate) fn strides_along(&self, along: &[Variable]) -> Strides {
        along
            .iter()
            .map(|variable| {
                self.position(*variable)
                    .map_or(0, |position| self.offsets[position])
            })
            .collect()
    }
}

impl fmt::Debug for TablePotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TablePotential")
            .field("scope", &self.scope)
            .field("values", &self.values)
            .finish()
    }
}

/// Iterator over every configuration of a scope in array order, created by
/// [`TablePotential::configurations`].
pub struct Configurations {
    radix: Strides,
    current: Option<States>,
}

impl Configurations {
    pub(crate) fn new(scope: &[Variable]) -> Self {
        Configurations {
            radix: scope.iter().map(|v| v.num_states()).collect(),
            current: Some(smallvec![0; scope.len()]),
        }
    }
}

impl Iterator for Configurations {
    type Item = States;

    fn next(&mut self) -> Option<States> {
        let current = self.current.take()?;
        let mut next = current.clone();
        for (digit, radix) in next.iter_mut().zip(self.radix.iter()) {
            *digit += 1;
            if *digit < *radix {
                self.current = Some(next);
                return Some(current);
            }
            *digit = 0;
        }
        // Every digit rolled over, so `current` was the last configuration.
        Some(current)
    }
}

/// Walks the configurations of an output scope in array order while keeping a flat index into
/// several input tables up to date.
///
/// Each input supplies a stride per output variable (zero when the input doesn't depend on it).
/// Advancing bumps the lowest digit and adds its stride to every index; when a digit rolls over,
/// the whole span it covered is subtracted again. That way no index is ever recomputed from
/// scratch.
pub(crate) struct Odometer {
    radix: Strides,
    digits: Strides,
    strides: SmallVec<[Strides; 2]>,
    indices: SmallVec<[usize; 2]>,
}

impl Odometer {
    pub(crate) fn new(scope: &[Variable], strides: &[Strides]) -> Self {
        debug_assert!(strides.iter().all(|s| s.len() == scope.len()));
        Odometer {
            radix: scope.iter().map(|v| v.num_states()).collect(),
            digits: smallvec![0; scope.len()],
            strides: strides.iter().cloned().collect(),
            indices: smallvec![0; strides.len()],
        }
    }

    /// Starts every input index at `base` instead of zero.
    pub(crate) fn with_bases(mut self, bases: &[usize]) -> Self {
        self.indices.copy_from_slice(bases);
        self
    }

    /// The current flat index into input `input`.
    pub(crate) fn index(&self, input: usize) -> usize {
        self.indices[input]
    }

    pub(crate) fn advance(&mut self) {
        for digit in 0..self.digits.len() {
            self.digits[digit] += 1;
            for (index, strides) in self.indices.iter_mut().zip(self.strides.iter()) {
                *index += strides[digit];
            }
            if self.digits[digit] < self.radix[digit] {
                return;
            }
            let span = self.radix[digit];
            self.digits[digit] = 0;
            for (index, strides) in self.indices.iter_mut().zip(self.strides.iter()) {
                *index -= strides[digit] * span;
            }
        }
    }
}
