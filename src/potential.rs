//! Potentials that are not stored as a dense table, and the [`Potential`] type that lets a network
//! hold any of them.
//!
//! Every representation can evaluate a single configuration and can materialize itself as a
//! [`TablePotential`]; the inference algorithms only ever work on tables.

use crate::error::{Error, Result};
use crate::table::{Scope, TablePotential};
use crate::variable::{Variable, VariableSet};
use smallvec::SmallVec;

/// A potential in any of the supported representations.
#[derive(Clone, Debug, PartialEq)]
pub enum Potential {
    /// A dense table.
    Table(TablePotential),
    /// A decision tree whose leaves are tables over the variables not yet branched on.
    Tree(TreePotential),
    /// An independence-of-causal-influence model such as noisy-OR or noisy-MAX.
    Canonical(CanonicalPotential),
    /// The same value (one over the number of child states) everywhere.
    Uniform(Scope),
}

impl Potential {
    /// The ordered variables this potential ranges over. For conditional potentials the child
    /// comes first.
    pub fn scope(&self) -> &[Variable] {
        match self {
            Potential::Table(table) => table.scope(),
            Potential::Tree(tree) => &tree.scope,
            Potential::Canonical(canonical) => &canonical.scope,
            Potential::Uniform(scope) => scope,
        }
    }

    /// The value at one configuration, given as a state index per scope variable.
    pub fn evaluate(&self, states: &[usize]) -> Result<f64> {
        let scope = self.scope();
        if states.len() != scope.len() {
            return Err(Error::TableSize {
                scope: scope.to_vec(),
                expected: scope.len(),
                actual: states.len(),
            });
        }
        for (variable, state) in scope.iter().zip(states) {
            variable.check_state(*state)?;
        }
        Ok(match self {
            Potential::Table(table) => table.value(states)?,
            Potential::Tree(tree) => tree.evaluate(states),
            Potential::Canonical(canonical) => canonical.evaluate(states),
            Potential::Uniform(scope) => {
                1.0 / scope.first().map_or(1, |child| child.num_states()) as f64
            }
        })
    }

    /// Materializes this potential as a dense table with the same scope order.
    ///
    /// ```
    /// use potential_inference::{Potential, Variable};
    ///
    /// let a = Variable::new(0, 2);
    /// let b = Variable::new(1, 3);
    /// let uniform = Potential::Uniform([a, b].iter().copied().collect()).to_table();
    /// assert_eq!(uniform.values(), &[0.5; 6]);
    /// ```
    pub fn to_table(&self) -> TablePotential {
        match self {
            Potential::Table(table) => table.clone(),
            Potential::Uniform(scope) => {
                let child = scope.first().map_or(1, |child| child.num_states());
                TablePotential::filled(scope, 1.0 / child as f64)
            }
            Potential::Tree(tree) => tabulate(&tree.scope, |states| tree.evaluate(states)),
            Potential::Canonical(canonical) => {
                tabulate(&canonical.scope, |states| canonical.evaluate(states))
            }
        }
    }
}

fn tabulate(scope: &[Variable], f: impl Fn(&[usize]) -> f64) -> TablePotential {
    let mut table = TablePotential::zeros(scope);
    let configurations = table.configurations();
    for (cell, states) in table.values.iter_mut().zip(configurations) {
        *cell = f(&states);
    }
    table
}

impl From<TablePotential> for Potential {
    fn from(table: TablePotential) -> Self {
        Potential::Table(table)
    }
}

impl From<TreePotential> for Potential {
    fn from(tree: TreePotential) -> Self {
        Potential::Tree(tree)
    }
}

impl From<CanonicalPotential> for Potential {
    fn from(canonical: CanonicalPotential) -> Self {
        Potential::Canonical(canonical)
    }
}

/// A node of a [`TreePotential`].
#[derive(Clone, Debug, PartialEq)]
pub enum TreeNode {
    /// Chooses a subtree by the state of `variable`; `children[s]` applies when it is in state `s`.
    Branch {
        /// The variable branched on.
        variable: Variable,
        /// One subtree per state.
        children: Vec<TreeNode>,
    },
    /// A table over some of the variables not branched on along the path to this leaf. A table
    /// over no variables is a constant.
    Leaf(TablePotential),
}

/// A potential structured as a decision tree, which represents context-specific independence
/// compactly: once the branches have fixed some variables, the leaf may not depend on the rest.
#[derive(Clone, Debug, PartialEq)]
pub struct TreePotential {
    scope: Scope,
    positions: SmallVec<[(Variable, usize); 4]>,
    root: TreeNode,
}

impl TreePotential {
    /// Creates a tree potential over `scope`.
    ///
    /// Every branch must have one child per state of its variable, no variable may be branched on
    /// twice along one path, and every leaf must range over scope variables that its path has not
    /// fixed.
    ///
    /// ```
    /// use potential_inference::{Potential, TablePotential, TreeNode, TreePotential, Variable};
    ///
    /// let alarm = Variable::new(0, 2);
    /// let burglary = Variable::new(1, 2);
    /// let earthquake = Variable::new(2, 2);
    ///
    /// // Given a burglary the alarm rings with probability 0.95 regardless of earthquakes.
    /// let tree = TreePotential::new(
    ///     &[alarm, burglary, earthquake],
    ///     TreeNode::Branch {
    ///         variable: burglary,
    ///         children: vec![
    ///             TreeNode::Leaf(TablePotential::new(&[alarm], vec![0.95, 0.05]).unwrap()),
    ///             TreeNode::Leaf(
    ///                 TablePotential::new(&[alarm, earthquake], vec![0.3, 0.7, 0.01, 0.99])
    ///                     .unwrap(),
    ///             ),
    ///         ],
    ///     },
    /// )
    /// .unwrap();
    ///
    /// let table = Potential::from(tree).to_table();
    /// assert_eq!(table.value(&[0, 0, 1]).unwrap(), 0.95);
    /// assert_eq!(table.value(&[1, 1, 1]).unwrap(), 0.99);
    /// ```
    pub fn new(scope: &[Variable], root: TreeNode) -> Result<Self> {
        let scope_set = VariableSet::new(scope);
        if scope_set.len() != scope.len() {
            let repeated = scope
                .iter()
                .enumerate()
                .find(|(i, v)| scope[i + 1..].contains(v))
                .map(|(_, v)| *v);
            if let Some(variable) = repeated {
                return Err(Error::RepeatedVariable(variable));
            }
        }
        validate(&root, &scope_set, &mut VariableSet::default())?;
        Ok(TreePotential {
            scope: SmallVec::from_slice(scope),
            positions: scope.iter().copied().zip(0..).collect(),
            root,
        })
    }

    /// The root of the tree.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    fn state(&self, states: &[usize], variable: Variable) -> usize {
        let position = self
            .positions
            .iter()
            .find(|(v, _)| *v == variable)
            .map(|(_, p)| *p)
            .unwrap_or_default();
        states[position]
    }

    fn evaluate(&self, states: &[usize]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Branch { variable, children } => {
                    node = &children[self.state(states, *variable)];
                }
                TreeNode::Leaf(table) => {
                    let index: usize = table
                        .scope()
                        .iter()
                        .zip(table.offsets())
                        .map(|(variable, offset)| offset * self.state(states, *variable))
                        .sum();
                    return table.values()[index];
                }
            }
        }
    }
}

fn validate(node: &TreeNode, scope: &VariableSet, fixed: &mut VariableSet) -> Result<()> {
    match node {
        TreeNode::Branch { variable, children } => {
            if !scope.contains(*variable) || fixed.contains(*variable) {
                return Err(Error::VariableNotInScope {
                    variable: *variable,
                    scope: scope.difference(fixed).as_slice().to_vec(),
                });
            }
            if children.len() != variable.num_states() {
                return Err(Error::TableSize {
                    scope: vec![*variable],
                    expected: variable.num_states(),
                    actual: children.len(),
                });
            }
            fixed.insert(*variable);
            for child in children {
                validate(child, scope, fixed)?;
            }
            fixed.remove(*variable);
            Ok(())
        }
        TreeNode::Leaf(table) => {
            let free = scope.difference(fixed);
            for variable in table.scope() {
                if !free.contains(*variable) {
                    return Err(Error::VariableNotInScope {
                        variable: *variable,
                        scope: free.as_slice().to_vec(),
                    });
                }
            }
            Ok(())
        }
    }
}

/// How a [`CanonicalPotential`] combines the effects of its parents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanonicalKind {
    /// The child takes the largest state any cause produces (noisy-OR when everything is binary).
    Max,
    /// The child takes the smallest state any cause produces (noisy-AND when everything is binary).
    Min,
}

/// An independence-of-causal-influence model.
///
/// Each parent independently produces an effect on the child, distributed according to its own
/// link table over `[child, parent]`; a leak table over `[child]` accounts for causes outside the
/// model. The child's state is the maximum (or minimum) of all effects. Child states are ordered,
/// with state 0 meaning "absent" for noisy-OR.
///
/// The conditional table has size exponential in the number of parents, but the model only has
/// parameters linear in it.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalPotential {
    kind: CanonicalKind,
    scope: Scope,
    links: Vec<TablePotential>,
    leak: TablePotential,
}

impl CanonicalPotential {
    /// Creates a canonical model of `child` given `parents`.
    ///
    /// `links[i]` is a conditional table over `[child, parents[i]]` giving the distribution of
    /// the effect parent `i` produces in each of its states; `leak` is a table over `[child]`.
    pub fn new(
        kind: CanonicalKind,
        child: Variable,
        parents: &[Variable],
        links: Vec<TablePotential>,
        leak: TablePotential,
    ) -> Result<Self> {
        if links.len() != parents.len() {
            return Err(Error::InvalidParameter(format!(
                "{} link tables for {} parents",
                links.len(),
                parents.len()
            )));
        }
        for (parent, link) in parents.iter().zip(links.iter()) {
            if link.scope() != [child, *parent] {
                return Err(Error::ScopeMismatch {
                    expected: vec![child, *parent],
                    actual: link.scope().to_vec(),
                });
            }
        }
        if leak.scope() != [child] {
            return Err(Error::ScopeMismatch {
                expected: vec![child],
                actual: leak.scope().to_vec(),
            });
        }
        let mut scope = Scope::new();
        scope.push(child);
        scope.extend_from_slice(parents);
        if let Some(repeated) = scope
            .iter()
            .enumerate()
            .find(|(i, v)| scope[i + 1..].contains(v))
            .map(|(_, v)| *v)
        {
            return Err(Error::RepeatedVariable(repeated));
        }
        Ok(CanonicalPotential {
            kind,
            scope,
            links,
            leak,
        })
    }

    /// A noisy-OR over binary variables, where state 1 means "present".
    ///
    /// `probabilities[i]` is the probability that parent `i` alone, when present, makes the child
    /// present; `leak` is the probability that the child is present with every parent absent.
    ///
    /// ```
    /// use potential_inference::{CanonicalPotential, Potential, Variable};
    ///
    /// let fever = Variable::new(0, 2);
    /// let flu = Variable::new(1, 2);
    /// let cold = Variable::new(2, 2);
    /// let model = CanonicalPotential::noisy_or(fever, &[flu, cold], &[0.8, 0.4], 0.1).unwrap();
    ///
    /// let table = Potential::from(model).to_table();
    /// // P(fever absent | flu, cold) = (1 - 0.8) * (1 - 0.4) * (1 - 0.1)
    /// assert!((table.value(&[0, 1, 1]).unwrap() - 0.108).abs() < 1e-12);
    /// assert!((table.value(&[1, 0, 0]).unwrap() - 0.1).abs() < 1e-12);
    /// ```
    pub fn noisy_or(
        child: Variable,
        parents: &[Variable],
        probabilities: &[f64],
        leak: f64,
    ) -> Result<Self> {
        if child.num_states() != 2 || parents.iter().any(|p| p.num_states() != 2) {
            return Err(Error::InvalidParameter(
                "noisy-OR needs binary variables".to_owned(),
            ));
        }
        if probabilities.len() != parents.len() {
            return Err(Error::InvalidParameter(format!(
                "{} probabilities for {} parents",
                probabilities.len(),
                parents.len()
            )));
        }
        let links = parents
            .iter()
            .zip(probabilities)
            .map(|(parent, p)| TablePotential::new(&[child, *parent], vec![1.0, 0.0, 1.0 - p, *p]))
            .collect::<Result<Vec<_>>>()?;
        let leak = TablePotential::new(&[child], vec![1.0 - leak, leak])?;
        CanonicalPotential::new(CanonicalKind::Max, child, parents, links, leak)
    }

    /// Whether the child is the maximum or the minimum of the effects.
    pub fn kind(&self) -> CanonicalKind {
        self.kind
    }

    /// The link table of each parent, in parent order.
    pub fn links(&self) -> &[TablePotential] {
        &self.links
    }

    /// The leak table.
    pub fn leak(&self) -> &TablePotential {
        &self.leak
    }

    fn evaluate(&self, states: &[usize]) -> f64 {
        let child = self.scope[0];
        let y = states[0];
        match self.kind {
            CanonicalKind::Max => {
                // P(Y = y) = P(Y <= y) - P(Y <= y - 1), and the cumulative distribution of a
                // maximum of independent effects is the product of their cumulatives.
                let at_most = |y: usize| {
                    let mut product = self.leak.values()[..=y].iter().sum::<f64>();
                    for (link, parent_state) in self.links.iter().zip(&states[1..]) {
                        let run = &link.values()[parent_state * child.num_states()..];
                        product *= run[..=y].iter().sum::<f64>();
                    }
                    product
                };
                at_most(y) - if y == 0 { 0.0 } else { at_most(y - 1) }
            }
            CanonicalKind::Min => {
                let n = child.num_states();
                let at_least = |y: usize| {
                    let mut product = self.leak.values()[y..].iter().sum::<f64>();
                    for (link, parent_state) in self.links.iter().zip(&states[1..]) {
                        let run = &link.values()[parent_state * n..(parent_state + 1) * n];
                        product *= run[y..].iter().sum::<f64>();
                    }
                    product
                };
                at_least(y) - if y + 1 == n { 0.0 } else { at_least(y + 1) }
            }
        }
    }
}
