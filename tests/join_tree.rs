mod common;

use common::*;
use potential_inference::*;
use test_log::test;

const HEURISTICS: [EliminationHeuristic; 3] = [
    EliminationHeuristic::MinDegree,
    EliminationHeuristic::MinFill,
    EliminationHeuristic::MinWeight,
];

fn check_tree(network: &Network, tree: &JoinTree) {
    assert!(tree.verify_running_intersection());

    // Every family sits in some clique and every potential is assigned exactly once.
    let mut assigned: Vec<usize> = tree
        .cliques()
        .iter()
        .flat_map(|c| c.assigned().iter().copied())
        .collect();
    assigned.sort_unstable();
    assert_eq!(assigned, (0..network.len()).collect::<Vec<_>>());
    for clique in tree.cliques() {
        for &index in clique.assigned() {
            let variable = network.variables().nth(index).unwrap();
            let family = VariableSet::new(&network.family(variable).unwrap());
            assert!(family.is_subset(clique.variables()));
        }
        assert_eq!(clique.potential().variables(), *clique.variables());
    }

    // The product of the clique potentials is the joint distribution.
    let product = multiply_all(tree.cliques().iter().map(|c| c.potential()));
    assert_close(&product, &joint(network), 1e-12);

    // No clique is contained in another.
    for (i, a) in tree.cliques().iter().enumerate() {
        for (j, b) in tree.cliques().iter().enumerate() {
            if i != j {
                assert!(!a.variables().is_subset(b.variables()));
            }
        }
    }
}

#[test]
fn sprinkler_has_two_cliques() {
    let (network, [cloudy, _, _, wet]) = sprinkler();
    for heuristic in HEURISTICS {
        let tree = JoinTree::from_network(&network, heuristic).unwrap();
        check_tree(&network, &tree);
        assert_eq!(tree.cliques().len(), 2);
        assert_eq!(tree.treewidth(), 2);
        let (_, _, separator) = tree.separators().next().unwrap();
        assert_eq!(separator.len(), 2);
        assert!(!separator.contains(cloudy));
        assert!(!separator.contains(wet));
    }
}

#[test]
fn chain_has_treewidth_one() {
    let mut network = Network::new();
    let variables: Vec<Variable> = (0..6)
        .map(|i| network.add_variable(&format!("x{}", i), &["0", "1"]).unwrap())
        .collect();
    for pair in variables.windows(2) {
        network.add_link(pair[0], pair[1]).unwrap();
    }
    network.set_table(variables[0], vec![0.5, 0.5]).unwrap();
    for &variable in variables[1..].iter() {
        network.set_table(variable, vec![0.9, 0.1, 0.2, 0.8]).unwrap();
    }

    let tree = JoinTree::from_network(&network, EliminationHeuristic::default()).unwrap();
    check_tree(&network, &tree);
    assert_eq!(tree.cliques().len(), 5);
    assert_eq!(tree.treewidth(), 1);
    assert_eq!(tree.edges().len(), 4);
}

#[test]
fn disconnected_networks_make_one_tree() {
    let mut network = Network::new();
    let a = network.add_variable("a", &["0", "1"]).unwrap();
    let b = network.add_variable("b", &["0", "1", "2"]).unwrap();
    network.set_table(a, vec![0.25, 0.75]).unwrap();
    network.set_table(b, vec![0.2, 0.3, 0.5]).unwrap();

    let tree = JoinTree::from_network(&network, EliminationHeuristic::default()).unwrap();
    check_tree(&network, &tree);
    assert_eq!(tree.cliques().len(), 2);
    let (_, _, separator) = tree.separators().next().unwrap();
    assert!(separator.is_empty());
    assert_eq!(tree.neighbours(0), &[1]);
    assert_eq!(tree.smallest_clique_with(a).unwrap(), 0);
    assert!(tree.smallest_clique_with(Variable::new(5, 2)).is_err());
}

#[test]
fn missing_potentials_are_reported() {
    let mut network = Network::new();
    let a = network.add_variable("a", &["0", "1"]).unwrap();
    let b = network.add_variable("b", &["0", "1"]).unwrap();
    network.add_link(a, b).unwrap();
    network.set_table(a, vec![0.5, 0.5]).unwrap();
    assert!(matches!(
        JoinTree::from_network(&network, EliminationHeuristic::default()),
        Err(Error::MissingPotential(v)) if v == b
    ));
}

#[test]
fn elimination_order_defers_kept_variables() {
    let (network, [cloudy, sprinkler, rain, wet]) = sprinkler();
    let graph = network.moral_graph();
    assert!(graph.has_edge(sprinkler, rain));
    assert!(!graph.has_edge(cloudy, wet));
    assert_eq!(graph.edge_count(), 5);

    for heuristic in HEURISTICS {
        let last = VariableSet::new(&[cloudy]);
        let order = elimination_order(&graph, heuristic, &last);
        assert_eq!(order.len(), 4);
        assert_eq!(order.last(), Some(&cloudy));
        let cliques = triangulate(&graph, &order);
        assert_eq!(cliques.len(), 2);
    }
}

macro_rules! random_trees {
    ($($name:ident: $seed:expr, $size:expr;)*) => {
        $(
        #[test]
        fn $name() {
            let network = random_network($seed, $size);
            for heuristic in HEURISTICS {
                let tree = JoinTree::from_network(&network, heuristic).unwrap();
                check_tree(&network, &tree);
            }
        }
        )*
    }
}

random_trees! {
    random_tree_1: 101, 5;
    random_tree_2: 102, 6;
    random_tree_3: 103, 7;
    random_tree_4: 104, 8;
    random_tree_5: 105, 8;
    random_tree_6: 106, 9;
}
