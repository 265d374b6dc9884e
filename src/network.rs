//! Bayesian networks: a catalog of variables, a directed acyclic graph over them, and one
//! conditional potential per node.

use crate::error::{Error, Result};
use crate::graph::UndirectedGraph;
use crate::potential::Potential;
use crate::table::{Scope, TablePotential};
use crate::variable::{Catalog, Variable, VariableSet};
use log::debug;
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default)]
struct Node {
    parents: Vec<Variable>,
    children: VariableSet,
    potential: Option<Potential>,
}

/// A directed acyclic graph of variables, each with an optional potential conditioned on its
/// parents.
///
/// Changing a node's parents discards its potential, since the old table no longer has the right
/// scope.
///
/// ```
/// use potential_inference::Network;
///
/// let mut network = Network::new();
/// let rain = network.add_variable("rain", &["yes", "no"]).unwrap();
/// let wet = network.add_variable("wet grass", &["yes", "no"]).unwrap();
/// network.add_link(rain, wet).unwrap();
/// assert!(network.add_link(wet, rain).is_err());
///
/// network.set_table(rain, vec![0.2, 0.8]).unwrap();
/// network.set_table(wet, vec![0.9, 0.1, 0.1, 0.9]).unwrap();
/// assert_eq!(network.topological_order().unwrap(), vec![rain, wet]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Network {
    catalog: Catalog,
    nodes: Vec<Node>,
}

/// A single change to the links of a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkEdit {
    /// Add a link from the first variable to the second.
    Add(Variable, Variable),
    /// Remove the link from the first variable to the second.
    Remove(Variable, Variable),
    /// Replace the link from the first variable to the second with one in the other direction.
    Invert(Variable, Variable),
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Network::default()
    }

    /// Creates a network with a node for every variable in `catalog` and no links.
    pub fn with_catalog(catalog: Catalog) -> Self {
        let nodes = vec![Node::default(); catalog.len()];
        Network { catalog, nodes }
    }

    /// The names and states of the variables.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Adds a node for a new variable.
    pub fn add_variable<S: AsRef<str>>(&mut self, name: &str, states: &[S]) -> Result<Variable> {
        let variable = self.catalog.add_variable(name, states)?;
        self.nodes.push(Node::default());
        Ok(variable)
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> Result<Variable> {
        self.catalog.variable(name)
    }

    /// Every variable, in id order.
    pub fn variables(&self) -> impl DoubleEndedIterator<Item = Variable> + ExactSizeIterator + '_ {
        self.catalog.iter()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the network has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn check(&self, variable: Variable) -> Result<()> {
        if self.catalog.contains(variable) {
            Ok(())
        } else {
            Err(Error::UnknownVariable(format!("{:?}", variable)))
        }
    }

    fn node(&self, variable: Variable) -> Result<&Node> {
        self.check(variable)?;
        Ok(&self.nodes[variable.id()])
    }

    fn node_mut(&mut self, variable: Variable) -> Result<&mut Node> {
        self.check(variable)?;
        Ok(&mut self.nodes[variable.id()])
    }

    /// The parents of a variable, in the order they were linked. This is the order of the
    /// conditioning variables in its potential.
    pub fn parents(&self, variable: Variable) -> Result<&[Variable]> {
        Ok(&self.node(variable)?.parents)
    }

    /// The children of a variable, in id order.
    pub fn children(&self, variable: Variable) -> Result<&[Variable]> {
        Ok(self.node(variable)?.children.as_slice())
    }

    /// Returns `true` if there is a link from `from` to `to`.
    pub fn has_link(&self, from: Variable, to: Variable) -> bool {
        self.catalog.contains(to) && self.nodes[to.id()].parents.contains(&from)
    }

    /// Every link as `(parent, child)`, grouped by child in id order.
    pub fn links(&self) -> impl Iterator<Item = (Variable, Variable)> + '_ {
        self.catalog.iter().flat_map(move |child| {
            self.nodes[child.id()]
                .parents
                .iter()
                .map(move |parent| (*parent, child))
        })
    }

    /// Returns `true` if a directed path leads from `from` to `to`. Every variable has a path of
    /// length zero to itself.
    pub fn exists_path(&self, from: Variable, to: Variable) -> bool {
        if !self.catalog.contains(from) || !self.catalog.contains(to) {
            return false;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(variable) = stack.pop() {
            if variable == to {
                return true;
            }
            if visited[variable.id()] {
                continue;
            }
            visited[variable.id()] = true;
            stack.extend(
                self.nodes[variable.id()]
                    .children
                    .iter()
                    .filter(|child| !visited[child.id()]),
            );
        }
        false
    }

    /// Adds a link from `from` to `to`.
    ///
    /// Fails with [`Error::DuplicateLink`] if the link exists, or [`Error::Cycle`] if `to`
    /// already reaches `from` (including `from == to`).
    pub fn add_link(&mut self, from: Variable, to: Variable) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if self.has_link(from, to) {
            return Err(Error::DuplicateLink { from, to });
        }
        if self.exists_path(to, from) {
            return Err(Error::Cycle(from));
        }
        let child = &mut self.nodes[to.id()];
        child.parents.push(from);
        child.potential = None;
        self.nodes[from.id()].children.insert(to);
        Ok(())
    }

    /// Removes the link from `from` to `to`.
    pub fn remove_link(&mut self, from: Variable, to: Variable) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        let child = &mut self.nodes[to.id()];
        let position = child
            .parents
            .iter()
            .position(|p| *p == from)
            .ok_or(Error::NoSuchLink { from, to })?;
        child.parents.remove(position);
        child.potential = None;
        self.nodes[from.id()].children.remove(to);
        Ok(())
    }

    /// Reverses the link from `from` to `to`. Fails, leaving the network unchanged, if another
    /// path from `from` to `to` would close a cycle.
    pub fn invert_link(&mut self, from: Variable, to: Variable) -> Result<()> {
        if !self.has_link(from, to) {
            self.check(from)?;
            self.check(to)?;
            return Err(Error::NoSuchLink { from, to });
        }
        let indirect = self.nodes[from.id()]
            .children
            .iter()
            .filter(|child| *child != to)
            .any(|child| self.exists_path(child, to));
        if indirect {
            return Err(Error::Cycle(to));
        }
        self.remove_link(from, to)?;
        self.add_link(to, from)
    }

    /// Applies one edit in place.
    pub fn apply(&mut self, edit: LinkEdit) -> Result<()> {
        match edit {
            LinkEdit::Add(from, to) => self.add_link(from, to),
            LinkEdit::Remove(from, to) => self.remove_link(from, to),
            LinkEdit::Invert(from, to) => self.invert_link(from, to),
        }
    }

    /// Returns a copy of this network with one edit applied.
    pub fn with_edit(&self, edit: LinkEdit) -> Result<Network> {
        let mut network = self.clone();
        network.apply(edit)?;
        Ok(network)
    }

    /// Orders the variables so every parent comes before its children, breaking ties by id.
    pub fn topological_order(&self) -> Result<Vec<Variable>> {
        let mut waiting: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut ready: BTreeSet<Variable> = self
            .catalog
            .iter()
            .filter(|v| waiting[v.id()] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(variable) = ready.iter().next().copied() {
            ready.remove(&variable);
            order.push(variable);
            for child in self.nodes[variable.id()].children.iter() {
                waiting[child.id()] -= 1;
                if waiting[child.id()] == 0 {
                    ready.insert(child);
                }
            }
        }
        if let Some(stuck) = self.catalog.iter().find(|v| waiting[v.id()] > 0) {
            return Err(Error::Cycle(stuck));
        }
        Ok(order)
    }

    /// The scope a potential for `variable` must have: the variable followed by its parents.
    pub fn family(&self, variable: Variable) -> Result<Scope> {
        let mut scope = Scope::new();
        scope.push(variable);
        scope.extend_from_slice(self.parents(variable)?);
        Ok(scope)
    }

    /// Sets the potential of a node.
    ///
    /// The first variable of its scope must be the node's variable and the rest must be exactly
    /// its parents, in any order.
    pub fn set_potential(
        &mut self,
        variable: Variable,
        potential: impl Into<Potential>,
    ) -> Result<()> {
        let potential = potential.into();
        let family = self.family(variable)?;
        let scope = potential.scope();
        if scope.len() != family.len()
            || scope.first() != Some(&variable)
            || VariableSet::new(scope) != VariableSet::new(&family)
        {
            return Err(Error::ScopeMismatch {
                expected: family.to_vec(),
                actual: scope.to_vec(),
            });
        }
        self.node_mut(variable)?.potential = Some(potential);
        Ok(())
    }

    /// Sets a node's potential to a table over the variable and its parents in link order.
    pub fn set_table(&mut self, variable: Variable, values: Vec<f64>) -> Result<()> {
        let table = TablePotential::new(&self.family(variable)?, values)?;
        self.set_potential(variable, table)
    }

    /// The potential of a node, if one has been set.
    pub fn potential(&self, variable: Variable) -> Option<&Potential> {
        self.node(variable).ok()?.potential.as_ref()
    }

    /// Removes every potential, keeping the graph.
    pub fn clear_potentials(&mut self) {
        for node in self.nodes.iter_mut() {
            node.potential = None;
        }
    }

    /// A node's potential as a table over the variable followed by its parents in link order.
    pub fn conditional_table(&self, variable: Variable) -> Result<TablePotential> {
        let potential = self
            .potential(variable)
            .ok_or(Error::MissingPotential(variable))?;
        potential.to_table().reorder(&self.family(variable)?)
    }

    /// Every node's potential as a table, in variable order. Fails if any node lacks a potential.
    pub fn table_potentials(&self) -> Result<Vec<TablePotential>> {
        self.catalog
            .iter()
            .map(|variable| {
                self.potential(variable)
                    .map(Potential::to_table)
                    .ok_or(Error::MissingPotential(variable))
            })
            .collect()
    }

    /// The undirected graph that joins every node to its parents and every pair of parents of a
    /// common child.
    pub fn moral_graph(&self) -> UndirectedGraph {
        let mut graph = UndirectedGraph::new();
        for variable in self.catalog.iter() {
            let family = self.nodes[variable.id()]
                .parents
                .iter()
                .copied()
                .chain(Some(variable))
                .collect::<Vec<_>>();
            graph.connect_all(&family);
        }
        debug!(
            "moral graph has {} nodes and {} edges",
            graph.len(),
            graph.edge_count()
        );
        graph
    }
}
