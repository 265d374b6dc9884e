//! Clique trees (also called join trees or junction trees).
//!
//! Building one goes: connect the variables of every potential (for a network, this is the moral
//! graph), pick an elimination order, triangulate to find the cliques, link the cliques with a
//! maximum spanning tree weighted by separator size, and finally multiply each potential into the
//! first clique that covers its scope.

use crate::error::{Error, Result};
use crate::graph::{elimination_order, triangulate, EliminationHeuristic, UndirectedGraph};
use crate::network::Network;
use crate::operations::multiply_all;
use crate::table::TablePotential;
use crate::variable::{Variable, VariableSet};
use log::debug;
use std::collections::HashMap;
use std::mem::swap;

/// A set of variables with the product of the potentials assigned to it.
#[derive(Clone, Debug)]
pub struct Clique {
    variables: VariableSet,
    potential: TablePotential,
    assigned: Vec<usize>,
}

impl Clique {
    /// The variables of this clique.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// The product of the potentials assigned to this clique, over all its variables in id order.
    pub fn potential(&self) -> &TablePotential {
        &self.potential
    }

    /// Indices (into the list the tree was built from) of the potentials assigned here.
    pub fn assigned(&self) -> &[usize] {
        &self.assigned
    }
}

/// An undirected tree of cliques satisfying the running intersection property: the cliques
/// containing any given variable form a connected subtree.
#[derive(Clone, Debug)]
pub struct JoinTree {
    cliques: Vec<Clique>,
    edges: Vec<(usize, usize)>,
    neighbours: Vec<Vec<usize>>,
}

impl JoinTree {
    /// Builds a clique tree for the product of `potentials`.
    ///
    /// ```
    /// use potential_inference::{EliminationHeuristic, JoinTree, TablePotential, Variable};
    ///
    /// let v: Vec<Variable> = (0..4).map(|i| Variable::new(i, 2)).collect();
    /// let potentials = vec![
    ///     TablePotential::uniform(&[v[0], v[1]]),
    ///     TablePotential::uniform(&[v[1], v[2]]),
    ///     TablePotential::uniform(&[v[2], v[3]]),
    ///     TablePotential::uniform(&[v[3], v[0]]),
    /// ];
    /// let tree = JoinTree::build(potentials, EliminationHeuristic::MinFill);
    /// assert_eq!(tree.cliques().len(), 2);
    /// assert_eq!(tree.treewidth(), 2);
    /// assert!(tree.verify_running_intersection());
    /// ```
    pub fn build(potentials: Vec<TablePotential>, heuristic: EliminationHeuristic) -> JoinTree {
        let graph = UndirectedGraph::from_scopes(potentials.iter().map(|p| p.scope()));
        let order = elimination_order(&graph, heuristic, &VariableSet::default());
        let clusters = triangulate(&graph, &order);

        let mut assigned = vec![Vec::new(); clusters.len()];
        let mut constants = Vec::new();
        for (index, potential) in potentials.iter().enumerate() {
            let variables = potential.variables();
            // Every scope was made complete in the graph, so some cluster covers it. A potential
            // with an empty scope fits anywhere.
            match clusters.iter().position(|c| variables.is_subset(c)) {
                Some(clique) => assigned[clique].push(index),
                None => constants.push(index),
            }
        }
        if let Some(first) = assigned.first_mut() {
            first.append(&mut constants);
        }

        let cliques: Vec<Clique> = clusters
            .into_iter()
            .zip(assigned)
            .map(|(variables, assigned)| {
                let ones = TablePotential::filled(variables.as_slice(), 1.0);
                let potential = multiply_all(
                    Some(&ones)
                        .into_iter()
                        .chain(assigned.iter().map(|i| &potentials[*i])),
                );
                Clique {
                    variables,
                    potential,
                    assigned,
                }
            })
            .collect();

        let edges = maximum_spanning_tree(&cliques);
        let mut neighbours = vec![Vec::new(); cliques.len()];
        for &(a, b) in edges.iter() {
            neighbours[a].push(b);
            neighbours[b].push(a);
        }
        let tree = JoinTree {
            cliques,
            edges,
            neighbours,
        };
        debug!(
            "built a clique tree with {} cliques, treewidth {}, largest table {}",
            tree.cliques.len(),
            tree.treewidth(),
            tree.cliques.iter().map(|c| c.potential.len()).max().unwrap_or(0)
        );
        tree
    }

    /// Builds a clique tree from the potentials of a network.
    ///
    /// Fails with [`Error::Cycle`] if the network isn't acyclic, or
    /// [`Error::MissingPotential`] if some node has no potential.
    pub fn from_network(network: &Network, heuristic: EliminationHeuristic) -> Result<JoinTree> {
        network.topological_order()?;
        Ok(JoinTree::build(network.table_potentials()?, heuristic))
    }

    /// The cliques.
    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    /// The tree edges as pairs of clique indices.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// The cliques adjacent to `clique`.
    pub fn neighbours(&self, clique: usize) -> &[usize] {
        &self.neighbours[clique]
    }

    /// Every edge with the variables its two cliques share.
    pub fn separators(&self) -> impl Iterator<Item = (usize, usize, VariableSet)> + '_ {
        self.edges.iter().map(move |&(a, b)| {
            let shared = self.cliques[a]
                .variables
                .intersection(&self.cliques[b].variables);
            (a, b, shared)
        })
    }

    /// One less than the size of the largest clique.
    pub fn treewidth(&self) -> usize {
        self.cliques
            .iter()
            .map(|c| c.variables.len())
            .max()
            .unwrap_or(0)
            .saturating_sub(1)
    }

    /// The index of the smallest clique (by table size) containing `variable`.
    pub fn smallest_clique_with(&self, variable: Variable) -> Result<usize> {
        self.cliques
            .iter()
            .enumerate()
            .filter(|(_, c)| c.variables.contains(variable))
            .min_by_key(|(_, c)| c.potential.len())
            .map(|(index, _)| index)
            .ok_or_else(|| Error::UnknownVariable(format!("{:?}", variable)))
    }

    /// Checks that the cliques containing each variable form a connected subtree.
    ///
    /// In a forest, a set of `k` nodes is connected exactly when `k - 1` edges run between them.
    pub fn verify_running_intersection(&self) -> bool {
        let mut counts: HashMap<Variable, (usize, usize)> = HashMap::new();
        for clique in self.cliques.iter() {
            for variable in clique.variables.iter() {
                counts.entry(variable).or_default().0 += 1;
            }
        }
        for (_, _, separator) in self.separators() {
            for variable in separator.iter() {
                counts.entry(variable).or_default().1 += 1;
            }
        }
        self.edges.len() + 1 == self.cliques.len().max(1)
            && counts.values().all(|(cliques, edges)| edges + 1 == *cliques)
    }
}

/// Kruskal's algorithm over every pair of cliques, heaviest separators first. Pairs with nothing
/// in common are still candidates, so the result is a single tree even when the potentials fall
/// into independent groups.
fn maximum_spanning_tree(cliques: &[Clique]) -> Vec<(usize, usize)> {
    let mut candidates = Vec::new();
    for a in 0..cliques.len() {
        for b in a + 1..cliques.len() {
            let weight = cliques[a]
                .variables
                .intersection(&cliques[b].variables)
                .len();
            candidates.push((weight, a, b));
        }
    }
    candidates.sort_by(|x, y| y.0.cmp(&x.0).then((x.1, x.2).cmp(&(y.1, y.2))));

    let mut components = DisjointSets::new(cliques.len());
    let mut edges = Vec::with_capacity(cliques.len().saturating_sub(1));
    for (_, a, b) in candidates {
        if components.union(a, b) {
            edges.push((a, b));
        }
    }
    edges
}

/// Union-find over `0..len` with union by rank and path halving.
struct DisjointSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        DisjointSets {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            let grandparent = self.parent[self.parent[x]];
            self.parent[x] = grandparent;
            x = grandparent;
        }
        x
    }

    /// Merges the sets of `a` and `b`, returning `false` if they were already one set.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let mut a = self.find(a);
        let mut b = self.find(b);
        if a == b {
            return false;
        }
        if self.rank[a] < self.rank[b] {
            swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        if self.rank[a] == self.rank[b] {
            self.rank[a] += 1;
        }
        true
    }
}
