//! Undirected graphs over variables, elimination orderings, and triangulation.

use crate::variable::{Variable, VariableSet};
use log::trace;
use std::collections::BTreeMap;

/// An undirected graph whose nodes are variables.
///
/// Nodes and neighbour sets are kept in id order, so every traversal is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndirectedGraph {
    adjacency: BTreeMap<Variable, VariableSet>,
}

impl UndirectedGraph {
    /// Creates a graph with no nodes.
    pub fn new() -> Self {
        UndirectedGraph::default()
    }

    /// Creates a graph with an edge between every pair of variables that appear together in one of
    /// `scopes`.
    ///
    /// Building it from the scopes of a network's conditional tables gives the moral graph: each
    /// child is joined to its parents and the parents to each other.
    ///
    /// ```
    /// use potential_inference::{UndirectedGraph, Variable};
    ///
    /// let a = Variable::new(0, 2);
    /// let b = Variable::new(1, 2);
    /// let c = Variable::new(2, 2);
    /// let moral = UndirectedGraph::from_scopes([&[a][..], &[b][..], &[c, a, b][..]]);
    /// assert!(moral.has_edge(a, b));
    /// assert_eq!(moral.edge_count(), 3);
    /// ```
    pub fn from_scopes<'a, I>(scopes: I) -> Self
    where
        I: IntoIterator<Item = &'a [Variable]>,
    {
        let mut graph = UndirectedGraph::new();
        for scope in scopes {
            graph.connect_all(scope);
        }
        graph
    }

    /// Adds a node with no edges, if it isn't already present.
    pub fn add_node(&mut self, variable: Variable) {
        self.adjacency.entry(variable).or_default();
    }

    /// Adds an edge, creating both nodes as needed. Self-loops are ignored.
    pub fn add_edge(&mut self, a: Variable, b: Variable) {
        self.add_node(a);
        self.add_node(b);
        if a != b {
            if let Some(neighbours) = self.adjacency.get_mut(&a) {
                neighbours.insert(b);
            }
            if let Some(neighbours) = self.adjacency.get_mut(&b) {
                neighbours.insert(a);
            }
        }
    }

    /// Removes an edge, returning whether it was present.
    pub fn remove_edge(&mut self, a: Variable, b: Variable) -> bool {
        let removed = self
            .adjacency
            .get_mut(&a)
            .map_or(false, |neighbours| neighbours.remove(b));
        if let Some(neighbours) = self.adjacency.get_mut(&b) {
            neighbours.remove(a);
        }
        removed
    }

    /// Removes a node and all its edges.
    pub fn remove_node(&mut self, variable: Variable) {
        if let Some(neighbours) = self.adjacency.remove(&variable) {
            for neighbour in neighbours.iter() {
                if let Some(others) = self.adjacency.get_mut(&neighbour) {
                    others.remove(variable);
                }
            }
        }
    }

    /// Makes every pair of `variables` adjacent.
    pub fn connect_all(&mut self, variables: &[Variable]) {
        for (i, a) in variables.iter().enumerate() {
            self.add_node(*a);
            for b in &variables[i + 1..] {
                self.add_edge(*a, *b);
            }
        }
    }

    /// Returns `true` if `a` and `b` are adjacent.
    pub fn has_edge(&self, a: Variable, b: Variable) -> bool {
        self.adjacency
            .get(&a)
            .map_or(false, |neighbours| neighbours.contains(b))
    }

    /// Returns `true` if the node is present.
    pub fn contains(&self, variable: Variable) -> bool {
        self.adjacency.contains_key(&variable)
    }

    /// The neighbours of a node; empty if the node is absent.
    pub fn neighbours(&self, variable: Variable) -> &[Variable] {
        self.adjacency
            .get(&variable)
            .map_or(&[][..], |neighbours| neighbours.as_slice())
    }

    /// The nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = Variable> + '_ {
        self.adjacency.keys().copied()
    }

    /// Every edge once, as `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (Variable, Variable)> + '_ {
        self.adjacency.iter().flat_map(|(a, neighbours)| {
            neighbours
                .iter()
                .filter(move |b| a < b)
                .map(move |b| (*a, b))
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|n| n.len()).sum::<usize>() / 2
    }

    /// How many edges eliminating `variable` would add between its neighbours.
    fn fill_in(&self, variable: Variable) -> usize {
        let neighbours = self.neighbours(variable);
        let mut missing = 0;
        for (i, a) in neighbours.iter().enumerate() {
            for b in &neighbours[i + 1..] {
                if !self.has_edge(*a, *b) {
                    missing += 1;
                }
            }
        }
        missing
    }

    /// Connects the neighbours of `variable` to each other, then removes it. Returns the cluster
    /// it formed with its neighbours.
    fn eliminate(&mut self, variable: Variable) -> VariableSet {
        let mut cluster = VariableSet::new(self.neighbours(variable));
        self.connect_all(cluster.as_slice());
        self.remove_node(variable);
        cluster.insert(variable);
        cluster
    }
}

/// Greedy rules for choosing which variable to eliminate next.
///
/// Finding an optimal order is NP-hard; these only bound the size of the cliques in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EliminationHeuristic {
    /// Fewest neighbours.
    MinDegree,
    /// Fewest edges added between the neighbours.
    MinFill,
    /// Smallest table over the variable and its neighbours.
    MinWeight,
}

impl Default for EliminationHeuristic {
    fn default() -> Self {
        EliminationHeuristic::MinFill
    }
}

impl EliminationHeuristic {
    fn cost(self, graph: &UndirectedGraph, variable: Variable) -> usize {
        match self {
            EliminationHeuristic::MinDegree => graph.neighbours(variable).len(),
            EliminationHeuristic::MinFill => graph.fill_in(variable),
            EliminationHeuristic::MinWeight => graph
                .neighbours(variable)
                .iter()
                .fold(variable.num_states(), |weight, n| {
                    weight.saturating_mul(n.num_states())
                }),
        }
    }
}

/// Chooses an order in which to eliminate every node of `graph`.
///
/// Nodes in `last` are only eliminated once everything else is gone, so a prefix of the result
/// is an order for eliminating all but those. Ties go to the lowest id.
///
/// ```
/// use potential_inference::{
///     elimination_order, EliminationHeuristic, UndirectedGraph, Variable, VariableSet,
/// };
///
/// let v: Vec<Variable> = (0..4).map(|i| Variable::new(i, 2)).collect();
/// // A path v0 - v1 - v2 - v3.
/// let graph = UndirectedGraph::from_scopes([&v[0..2], &v[1..3], &v[2..4]]);
///
/// let last = VariableSet::new(&[v[0]]);
/// let order = elimination_order(&graph, EliminationHeuristic::MinDegree, &last);
/// assert_eq!(order, vec![v[3], v[2], v[1], v[0]]);
/// ```
pub fn elimination_order(
    graph: &UndirectedGraph,
    heuristic: EliminationHeuristic,
    last: &VariableSet,
) -> Vec<Variable> {
    let mut graph = graph.clone();
    let mut order = Vec::with_capacity(graph.len());
    while !graph.is_empty() {
        let deferring = graph.nodes().any(|v| !last.contains(v));
        let best = graph
            .nodes()
            .filter(|v| !deferring || !last.contains(*v))
            .map(|v| (heuristic.cost(&graph, v), v))
            .min();
        let (cost, next) = match best {
            Some(best) => best,
            None => break,
        };
        trace!("eliminating {:?} at cost {}", next, cost);
        graph.eliminate(next);
        order.push(next);
    }
    order
}

/// Eliminates the nodes of `graph` in `order` and returns the maximal clusters formed, which are
/// the cliques of the resulting chordal graph. Nodes missing from `order` are eliminated
/// afterwards in id order.
///
/// ```
/// use potential_inference::{triangulate, UndirectedGraph, Variable, VariableSet};
///
/// let v: Vec<Variable> = (0..4).map(|i| Variable::new(i, 2)).collect();
/// // The 4-cycle v0 - v1 - v2 - v3 - v0 needs one chord.
/// let cycle = [v[3], v[0]];
/// let graph = UndirectedGraph::from_scopes([&v[0..2], &v[1..3], &v[2..4], &cycle[..]]);
///
/// let cliques = triangulate(&graph, &[v[0], v[1], v[2], v[3]]);
/// assert_eq!(
///     cliques,
///     vec![VariableSet::new(&[v[0], v[1], v[3]]), VariableSet::new(&[v[1], v[2], v[3]])]
/// );
/// ```
pub fn triangulate(graph: &UndirectedGraph, order: &[Variable]) -> Vec<VariableSet> {
    let mut graph = graph.clone();
    let mut clusters: Vec<VariableSet> = Vec::new();
    let remaining: Vec<Variable> = graph.nodes().filter(|v| !order.contains(v)).collect();
    for variable in order.iter().chain(remaining.iter()) {
        if !graph.contains(*variable) {
            continue;
        }
        let cluster = graph.eliminate(*variable);
        if !clusters.iter().any(|c| cluster.is_subset(c)) {
            clusters.push(cluster);
        }
    }
    // A later cluster can't contain an earlier one: every earlier cluster holds a node that was
    // eliminated before the later cluster formed.
    clusters
}
