use crate::error::{Error, Result};
use lasso::{Rodeo, Spur};
use std::collections::HashMap;
use smallvec::SmallVec;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::sorted_iterator::SortedByItem;
use sorted_iter::SortedIterator;
use std::fmt;
use std::iter;

/// A discrete random variable.
///
/// This is only a handle: the variable's name and state labels live in a [`Catalog`]. Two handles
/// are the same variable if they have the same id. Handles are ordered by id, which is the order
/// the catalog created them in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    id: u32,
    num_states: u32,
}

impl Variable {
    /// Creates a handle for a variable with the given id and number of states.
    ///
    /// Most callers should get their variables from a [`Catalog`] instead, which guarantees the
    /// ids are unique.
    ///
    /// # Panics
    ///
    /// Panics if `num_states` is zero. Ids and state counts are stored as `u32`; debug builds
    /// also panic if either doesn't fit.
    pub fn new(id: usize, num_states: usize) -> Self {
        assert!(num_states > 0, "a variable needs at least one state");
        debug_assert!(
            u32::try_from(id).is_ok() && u32::try_from(num_states).is_ok(),
            "variable id {} or state count {} exceeds u32",
            id,
            num_states
        );
        Variable {
            id: id as u32,
            num_states: num_states as u32,
        }
    }

    /// Position of this variable in its catalog.
    pub fn id(self) -> usize {
        self.id as usize
    }

    /// Number of states this variable can take.
    pub fn num_states(self) -> usize {
        self.num_states as usize
    }

    pub(crate) fn check_state(self, state: usize) -> Result<()> {
        if state < self.num_states() {
            Ok(())
        } else {
            Err(Error::StateOutOfRange {
                variable: self,
                state,
            })
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.id)
    }
}

/// A set of variables, kept sorted by id.
///
/// Sets with up to four variables don't allocate.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VariableSet(SmallVec<[Variable; 4]>);

impl VariableSet {
    /// Creates a variable set containing the specified variables.
    ///
    /// It's okay if the provided slice contains duplicates.
    pub fn new(variables: &[Variable]) -> Self {
        let mut v = SmallVec::from_slice(variables);
        v.sort_unstable();
        v.dedup();
        VariableSet(v)
    }

    /// The number of variables in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no variables.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `variable` is in the set.
    pub fn contains(&self, variable: Variable) -> bool {
        self.0.binary_search(&variable).is_ok()
    }

    /// The variables in ascending order of id.
    pub fn as_slice(&self) -> &[Variable] {
        &self.0
    }

    /// Returns an iterator over the variables which appear in this set, in ascending order.
    ///
    /// ```
    /// use potential_inference::{Variable, VariableSet};
    ///
    /// let a = Variable::new(1, 2);
    /// let b = Variable::new(2, 3);
    /// let c = Variable::new(3, 2);
    /// let abc = VariableSet::new(&[b, c, a]);
    /// let mut it = abc.iter();
    /// assert_eq!(it.next(), Some(a));
    /// assert_eq!(it.next(), Some(b));
    /// assert_eq!(it.next(), Some(c));
    /// assert_eq!(it.next(), None);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = Variable> + SortedByItem + Clone + '_ {
        self.0.iter().copied().assume_sorted_by_item()
    }

    /// Returns `true` if `other` contains every variable that `self` does.
    ///
    /// ```
    /// use potential_inference::{Variable, VariableSet};
    /// let nil = VariableSet::new(&[]);
    /// let one = VariableSet::new(&[Variable::new(0, 2)]);
    ///
    /// assert!(nil.is_subset(&one));
    /// assert!(nil.is_subset(&nil));
    /// assert!(one.is_subset(&one));
    /// assert!(!one.is_subset(&nil));
    /// ```
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().intersection(other.iter()).eq(self.iter())
    }

    /// Returns `true` if `self` contains every variable that `other` does.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Variables in either set.
    pub fn union(&self, other: &Self) -> Self {
        VariableSet(self.iter().union(other.iter()).collect())
    }

    /// Variables in both sets.
    ///
    /// ```
    /// use potential_inference::{Variable, VariableSet};
    /// let a = Variable::new(0, 2);
    /// let b = Variable::new(1, 2);
    /// let c = Variable::new(2, 2);
    ///
    /// let ab = VariableSet::new(&[a, b]);
    /// let bc = VariableSet::new(&[b, c]);
    /// assert_eq!(ab.intersection(&bc), VariableSet::new(&[b]));
    /// assert_eq!(ab.union(&bc), VariableSet::new(&[a, b, c]));
    /// assert_eq!(ab.difference(&bc), VariableSet::new(&[a]));
    /// ```
    pub fn intersection(&self, other: &Self) -> Self {
        VariableSet(self.iter().intersection(other.iter()).collect())
    }

    /// Variables in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        VariableSet(self.iter().difference(other.iter()).collect())
    }

    /// Adds a variable, keeping the set sorted.
    pub fn insert(&mut self, variable: Variable) -> bool {
        match self.0.binary_search(&variable) {
            Ok(_) => false,
            Err(at) => {
                self.0.insert(at, variable);
                true
            }
        }
    }

    /// Removes a variable if present.
    pub fn remove(&mut self, variable: Variable) -> bool {
        match self.0.binary_search(&variable) {
            Ok(at) => {
                self.0.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Product of the state counts of every variable in the set; the size of a table over it.
    pub fn weight(&self) -> usize {
        self.0.iter().map(|v| v.num_states()).product()
    }
}

impl fmt::Debug for VariableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl iter::FromIterator<Variable> for VariableSet {
    /// Creates a variable set containing the specified variables.
    ///
    /// It's okay if the provided iterator contains duplicates.
    fn from_iter<I: IntoIterator<Item = Variable>>(iter: I) -> Self {
        let mut v: SmallVec<[Variable; 4]> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        VariableSet(v)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    name: Spur,
    variable: Variable,
    states: Vec<String>,
}

/// Names and state labels for a collection of variables.
///
/// Variable names are interned, so looking a variable up by name doesn't allocate. The catalog
/// only grows: once created, a variable's states never change.
pub struct Catalog {
    names: Rodeo,
    by_name: HashMap<Spur, Variable>,
    entries: Vec<Entry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog {
            names: Rodeo::new(),
            by_name: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (self.names.resolve(&entry.name), &entry.states)),
            )
            .finish()
    }
}

impl Clone for Catalog {
    fn clone(&self) -> Self {
        let mut names = Rodeo::new();
        let mut by_name = HashMap::with_capacity(self.entries.len());
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let name = names.get_or_intern(self.names.resolve(&entry.name));
                by_name.insert(name, entry.variable);
                Entry {
                    name,
                    ..entry.clone()
                }
            })
            .collect();
        Catalog {
            names,
            by_name,
            entries,
        }
    }
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Defines a new variable with the given ordered state labels.
    ///
    /// ```
    /// use potential_inference::Catalog;
    ///
    /// let mut catalog = Catalog::new();
    /// let rain = catalog.add_variable("rain", &["yes", "no"]).unwrap();
    /// assert_eq!(rain.num_states(), 2);
    /// assert_eq!(catalog.variable("rain").unwrap(), rain);
    /// assert_eq!(catalog.state_index(rain, "no"), Some(1));
    /// assert!(catalog.add_variable("rain", &["a"]).is_err());
    /// ```
    pub fn add_variable<S: AsRef<str>>(&mut self, name: &str, states: &[S]) -> Result<Variable> {
        if self.names.get(name).is_some() {
            return Err(Error::DuplicateVariable(name.to_owned()));
        }
        if states.is_empty() {
            return Err(Error::NoStates(name.to_owned()));
        }
        let key = self.names.get_or_intern(name);
        let variable = Variable::new(self.entries.len(), states.len());
        self.by_name.insert(key, variable);
        self.entries.push(Entry {
            name: key,
            variable,
            states: states.iter().map(|s| s.as_ref().to_owned()).collect(),
        });
        Ok(variable)
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> Result<Variable> {
        self.names
            .get(name)
            .and_then(|key| self.by_name.get(&key).copied())
            .ok_or_else(|| Error::UnknownVariable(name.to_owned()))
    }

    /// Returns `true` if `variable` was created by this catalog.
    pub fn contains(&self, variable: Variable) -> bool {
        self.entries
            .get(variable.id())
            .map_or(false, |entry| entry.variable == variable)
    }

    /// The name of a variable.
    ///
    /// # Panics
    ///
    /// Panics if the variable does not belong to this catalog.
    pub fn name(&self, variable: Variable) -> &str {
        self.names.resolve(&self.entries[variable.id()].name)
    }

    /// The ordered state labels of a variable.
    ///
    /// # Panics
    ///
    /// Panics if the variable does not belong to this catalog.
    pub fn states(&self, variable: Variable) -> &[String] {
        &self.entries[variable.id()].states
    }

    /// Finds the index of a state label.
    pub fn state_index(&self, variable: Variable, label: &str) -> Option<usize> {
        self.states(variable).iter().position(|s| s == label)
    }

    /// The number of variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no variables have been defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every variable, in id order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Variable> + ExactSizeIterator + '_ {
        self.entries.iter().map(|entry| entry.variable)
    }
}
