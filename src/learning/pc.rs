use super::independence::g_squared;
use super::parameters::{estimate_parameters, ParameterOptions};
use super::Dataset;
use crate::error::{Error, Result};
use crate::graph::UndirectedGraph;
use crate::inference::CancelToken;
use crate::network::Network;
use crate::variable::{Catalog, Variable, VariableSet};
use log::{debug, trace};
use std::collections::HashMap;

/// A graph with both undirected edges and directed links, as built up by the PC algorithm.
///
/// Orienting an edge never creates a directed cycle: [`orient`](Self::orient) declines any
/// orientation `a -> b` when a directed path already leads from `b` to `a`.
///
/// ```
/// use potential_inference::{Catalog, PartiallyDirectedGraph};
///
/// let mut catalog = Catalog::new();
/// let a = catalog.add_variable("a", &["0", "1"]).unwrap();
/// let b = catalog.add_variable("b", &["0", "1"]).unwrap();
/// let c = catalog.add_variable("c", &["0", "1"]).unwrap();
///
/// let mut graph = PartiallyDirectedGraph::new(catalog);
/// graph.add_undirected(a, b);
/// graph.add_undirected(b, c);
/// graph.add_undirected(c, a);
/// assert!(graph.orient(a, b).unwrap());
/// assert!(graph.orient(b, c).unwrap());
/// // c -> a would close the cycle a -> b -> c -> a.
/// assert!(!graph.orient(c, a).unwrap());
/// assert!(graph.orient(a, c).unwrap());
/// ```
#[derive(Clone, Debug)]
pub struct PartiallyDirectedGraph {
    undirected: UndirectedGraph,
    directed: Network,
}

impl PartiallyDirectedGraph {
    /// Creates a graph over the variables of `catalog` with no edges.
    pub fn new(catalog: Catalog) -> Self {
        let mut undirected = UndirectedGraph::new();
        for variable in catalog.iter() {
            undirected.add_node(variable);
        }
        PartiallyDirectedGraph {
            undirected,
            directed: Network::with_catalog(catalog),
        }
    }

    /// Creates a graph with an undirected edge between every pair of variables of `catalog`.
    pub fn complete(catalog: Catalog) -> Self {
        let variables: Vec<Variable> = catalog.iter().collect();
        let mut graph = PartiallyDirectedGraph::new(catalog);
        graph.undirected.connect_all(&variables);
        graph
    }

    /// Every variable in id order.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.directed.variables()
    }

    /// Adds an undirected edge unless the two variables are already adjacent.
    pub fn add_undirected(&mut self, a: Variable, b: Variable) {
        if a != b && !self.adjacent(a, b) {
            self.undirected.add_edge(a, b);
        }
    }

    /// Removes an undirected edge, returning whether it was present.
    pub fn remove_undirected(&mut self, a: Variable, b: Variable) -> bool {
        self.undirected.remove_edge(a, b)
    }

    /// Returns `true` if `a - b` is an undirected edge.
    pub fn is_undirected(&self, a: Variable, b: Variable) -> bool {
        self.undirected.has_edge(a, b)
    }

    /// Returns `true` if `a -> b` is a directed link.
    pub fn is_directed(&self, a: Variable, b: Variable) -> bool {
        self.directed.has_link(a, b)
    }

    /// Returns `true` if any edge joins `a` and `b`.
    pub fn adjacent(&self, a: Variable, b: Variable) -> bool {
        self.is_undirected(a, b) || self.is_directed(a, b) || self.is_directed(b, a)
    }

    /// The variables joined to `variable` by an undirected edge.
    pub fn undirected_neighbours(&self, variable: Variable) -> Vec<Variable> {
        self.undirected.neighbours(variable).to_vec()
    }

    /// Every undirected edge once, as `(a, b)` with `a < b`.
    pub fn undirected_edges(&self) -> Vec<(Variable, Variable)> {
        self.undirected.edges().collect()
    }

    /// Every directed link as `(parent, child)`.
    pub fn directed_edges(&self) -> Vec<(Variable, Variable)> {
        self.directed.links().collect()
    }

    /// Turns the undirected edge `a - b` into `a -> b`.
    ///
    /// Returns `false`, changing nothing, if there is no such undirected edge or if `b` already
    /// reaches `a` by a directed path.
    pub fn orient(&mut self, a: Variable, b: Variable) -> Result<bool> {
        if !self.is_undirected(a, b) || self.directed.exists_path(b, a) {
            return Ok(false);
        }
        self.directed.add_link(a, b)?;
        self.undirected.remove_edge(a, b);
        trace!("oriented {:?} -> {:?}", a, b);
        Ok(true)
    }

    fn parents(&self, variable: Variable) -> &[Variable] {
        self.directed.parents(variable).unwrap_or(&[])
    }

    fn children(&self, variable: Variable) -> &[Variable] {
        self.directed.children(variable).unwrap_or(&[])
    }

    /// Meek's rule 1: `w -> a - b` with `w` and `b` not adjacent gives `a -> b`.
    fn rule1(&self, a: Variable, b: Variable) -> bool {
        self.parents(a)
            .iter()
            .any(|w| *w != b && !self.adjacent(*w, b))
    }

    /// Meek's rule 2: `a -> w -> b` with `a - b` gives `a -> b`.
    fn rule2(&self, a: Variable, b: Variable) -> bool {
        self.children(a)
            .iter()
            .any(|w| self.is_directed(*w, b))
    }

    /// Meek's rule 3: `a - w1 -> b` and `a - w2 -> b` with `w1`, `w2` not adjacent gives `a -> b`.
    fn rule3(&self, a: Variable, b: Variable) -> bool {
        let candidates: Vec<Variable> = self
            .undirected
            .neighbours(a)
            .iter()
            .copied()
            .filter(|w| *w != b && self.is_directed(*w, b))
            .collect();
        candidates.iter().enumerate().any(|(i, w1)| {
            candidates[i + 1..]
                .iter()
                .any(|w2| !self.adjacent(*w1, *w2))
        })
    }

    /// Applies Meek's rules 1 to 3 until none orients anything more. Returns how many edges
    /// were oriented.
    pub fn apply_meek_rules(&mut self) -> Result<usize> {
        let mut oriented = 0;
        loop {
            let mut changed = false;
            for (x, y) in self.undirected_edges() {
                for &(a, b) in [(x, y), (y, x)].iter() {
                    if self.is_undirected(a, b)
                        && (self.rule1(a, b) || self.rule2(a, b) || self.rule3(a, b))
                        && self.orient(a, b)?
                    {
                        oriented += 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                return Ok(oriented);
            }
        }
    }

    /// Orients every remaining undirected edge, from lower to higher id unless that would close
    /// a cycle.
    pub fn orient_remaining(&mut self) -> Result<()> {
        for (a, b) in self.undirected_edges() {
            if !self.orient(a, b)? && !self.orient(b, a)? {
                return Err(Error::Cycle(a));
            }
        }
        Ok(())
    }

    /// Orients what's left and returns the directed graph as a network without potentials.
    pub fn into_network(mut self) -> Result<Network> {
        self.orient_remaining()?;
        Ok(self.directed)
    }
}

/// Settings for [`learn_pc`].
#[derive(Clone, Debug)]
pub struct PcOptions {
    /// Significance level of the independence tests.
    pub significance: f64,
    /// Largest conditioning set tried when removing an edge.
    pub max_conditioning: usize,
    /// How the conditional tables of the result are estimated.
    pub parameters: ParameterOptions,
    /// Checked before every independence test.
    pub cancel: CancelToken,
}

impl Default for PcOptions {
    fn default() -> Self {
        PcOptions {
            significance: 0.05,
            max_conditioning: 3,
            parameters: ParameterOptions::default(),
            cancel: CancelToken::new(),
        }
    }
}

/// Every `k`-element subset of `items`, in lexicographic order of positions.
fn combinations(items: &[Variable], k: usize) -> Vec<Vec<Variable>> {
    let mut result = Vec::new();
    if k > items.len() {
        return result;
    }
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        result.push(indices.iter().map(|&i| items[i]).collect());
        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if indices[i] != i + items.len() - k {
                break;
            }
        }
        indices[i] += 1;
        for j in i + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

fn sepset_key(a: Variable, b: Variable) -> (Variable, Variable) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Runs the PC algorithm up to the point where the data determines no more orientations: the
/// skeleton, the v-structures, and Meek's rules. Undirected edges remain where the data can't
/// tell the direction apart.
pub fn pc_pattern(dataset: &Dataset, options: &PcOptions) -> Result<PartiallyDirectedGraph> {
    if !(0.0..1.0).contains(&options.significance) {
        return Err(Error::InvalidParameter(format!(
            "significance level must be in [0, 1), got {}",
            options.significance
        )));
    }
    let variables: Vec<Variable> = dataset.catalog().iter().collect();
    let mut graph = PartiallyDirectedGraph::complete(dataset.catalog().clone());
    let mut sepsets: HashMap<(Variable, Variable), VariableSet> = HashMap::new();
    let mut tests = 0;

    for depth in 0..=options.max_conditioning {
        let mut testable = false;
        for &x in variables.iter() {
            for y in graph.undirected_neighbours(x) {
                if !graph.is_undirected(x, y) {
                    continue;
                }
                let others: Vec<Variable> = graph
                    .undirected_neighbours(x)
                    .into_iter()
                    .filter(|v| *v != y)
                    .collect();
                if others.len() < depth {
                    continue;
                }
                testable = true;
                for given in combinations(&others, depth) {
                    options.cancel.check()?;
                    tests += 1;
                    let test = g_squared(dataset, x, y, &given)?;
                    if test.independent(options.significance) {
                        trace!(
                            "{:?} and {:?} independent given {:?} (p = {:.4})",
                            x,
                            y,
                            given,
                            test.p_value
                        );
                        graph.remove_undirected(x, y);
                        sepsets.insert(sepset_key(x, y), VariableSet::new(&given));
                        break;
                    }
                }
            }
        }
        if !testable {
            break;
        }
    }
    debug!(
        "skeleton has {} edges after {} independence tests",
        graph.undirected_edges().len(),
        tests
    );

    let mut colliders = Vec::new();
    for &z in variables.iter() {
        let neighbours = graph.undirected_neighbours(z);
        for (i, &x) in neighbours.iter().enumerate() {
            for &y in neighbours[i + 1..].iter() {
                if graph.adjacent(x, y) {
                    continue;
                }
                let separated = sepsets
                    .get(&sepset_key(x, y))
                    .map_or(false, |s| s.contains(z));
                if !separated {
                    colliders.push((x, z, y));
                }
            }
        }
    }
    for (x, z, y) in colliders {
        graph.orient(x, z)?;
        graph.orient(y, z)?;
    }

    let oriented = graph.apply_meek_rules()?;
    debug!(
        "pattern has {} directed and {} undirected edges ({} from Meek's rules)",
        graph.directed_edges().len(),
        graph.undirected_edges().len(),
        oriented
    );
    Ok(graph)
}

/// Learns a network with the PC algorithm and estimates its parameters.
pub fn learn_pc(dataset: &Dataset, options: &PcOptions) -> Result<Network> {
    let mut network = pc_pattern(dataset, options)?.into_network()?;
    estimate_parameters(&mut network, dataset, &options.parameters)?;
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_in_order() {
        let v: Vec<Variable> = (0..4).map(|i| Variable::new(i, 2)).collect();
        assert_eq!(combinations(&v, 0), vec![Vec::<Variable>::new()]);
        assert_eq!(combinations(&v, 5), Vec::<Vec<Variable>>::new());
        let pairs = combinations(&v, 2);
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], vec![v[0], v[1]]);
        assert_eq!(pairs[5], vec![v[2], v[3]]);
    }
}
