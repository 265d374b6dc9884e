#![allow(dead_code)]

use potential_inference::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// A -> B with P(A=t) = 0.3, P(B=t | A=t) = 0.8, P(B=t | A=f) = 0.1.
pub fn two_nodes() -> (Network, Variable, Variable) {
    let mut network = Network::new();
    let a = network.add_variable("A", &["t", "f"]).unwrap();
    let b = network.add_variable("B", &["t", "f"]).unwrap();
    network.add_link(a, b).unwrap();
    network.set_table(a, vec![0.3, 0.7]).unwrap();
    network.set_table(b, vec![0.8, 0.2, 0.1, 0.9]).unwrap();
    (network, a, b)
}

/// A -> C <- B, C -> D, with a three-state C.
pub fn v_structure() -> (Network, [Variable; 4]) {
    let mut network = Network::new();
    let a = network.add_variable("A", &["0", "1"]).unwrap();
    let b = network.add_variable("B", &["0", "1"]).unwrap();
    let c = network.add_variable("C", &["low", "mid", "high"]).unwrap();
    let d = network.add_variable("D", &["0", "1"]).unwrap();
    network.add_link(a, c).unwrap();
    network.add_link(b, c).unwrap();
    network.add_link(c, d).unwrap();
    network.set_table(a, vec![0.4, 0.6]).unwrap();
    network.set_table(b, vec![0.7, 0.3]).unwrap();
    #[rustfmt::skip]
    network
        .set_table(c, vec![
            0.8, 0.15, 0.05, // a=0, b=0
            0.3, 0.4, 0.3,   // a=1, b=0
            0.2, 0.5, 0.3,   // a=0, b=1
            0.05, 0.15, 0.8, // a=1, b=1
        ])
        .unwrap();
    network
        .set_table(d, vec![0.9, 0.1, 0.5, 0.5, 0.1, 0.9])
        .unwrap();
    (network, [a, b, c, d])
}

/// The sprinkler network, whose moral graph has a loop.
pub fn sprinkler() -> (Network, [Variable; 4]) {
    let mut network = Network::new();
    let cloudy = network.add_variable("cloudy", &["t", "f"]).unwrap();
    let sprinkler = network.add_variable("sprinkler", &["t", "f"]).unwrap();
    let rain = network.add_variable("rain", &["t", "f"]).unwrap();
    let wet = network.add_variable("wet", &["t", "f"]).unwrap();
    network.add_link(cloudy, sprinkler).unwrap();
    network.add_link(cloudy, rain).unwrap();
    network.add_link(sprinkler, wet).unwrap();
    network.add_link(rain, wet).unwrap();
    network.set_table(cloudy, vec![0.5, 0.5]).unwrap();
    network.set_table(sprinkler, vec![0.1, 0.9, 0.5, 0.5]).unwrap();
    network.set_table(rain, vec![0.8, 0.2, 0.2, 0.8]).unwrap();
    #[rustfmt::skip]
    network
        .set_table(wet, vec![
            0.99, 0.01, // s=t, r=t
            0.9, 0.1,   // s=f, r=t
            0.9, 0.1,   // s=t, r=f
            0.0, 1.0,   // s=f, r=f
        ])
        .unwrap();
    (network, [cloudy, sprinkler, rain, wet])
}

/// A random network over `size` variables with two to three states each, at most three parents
/// per node, and random conditional tables.
pub fn random_network(seed: u64, size: usize) -> Network {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut network = Network::new();
    let variables: Vec<Variable> = (0..size)
        .map(|i| {
            let states: Vec<String> = (0..rng.gen_range(2..4)).map(|s| s.to_string()).collect();
            network.add_variable(&format!("x{}", i), &states).unwrap()
        })
        .collect();
    for (i, child) in variables.iter().enumerate() {
        for parent in variables[..i].iter() {
            if network.parents(*child).unwrap().len() < 3 && rng.gen_bool(0.4) {
                network.add_link(*parent, *child).unwrap();
            }
        }
    }
    for variable in variables {
        let size: usize = network
            .family(variable)
            .unwrap()
            .iter()
            .map(|v| v.num_states())
            .product();
        let values: Vec<f64> = (0..size).map(|_| rng.gen_range(0.05..1.0)).collect();
        let table = TablePotential::new(&network.family(variable).unwrap(), values).unwrap();
        let table = normalize_conditional(&table, ZeroSumPolicy::Fail).unwrap();
        network.set_potential(variable, table).unwrap();
    }
    network
}

/// The full joint distribution of a network, over its variables in id order.
pub fn joint(network: &Network) -> TablePotential {
    let potentials = network.table_potentials().unwrap();
    let joint = multiply_all(potentials.iter());
    let order: Vec<Variable> = network.variables().collect();
    joint.reorder(&order).unwrap()
}

/// Posterior of `query` by summing the full joint, for checking the real algorithms.
pub fn brute_force(network: &Network, evidence: &EvidenceCase, query: Variable) -> TablePotential {
    let restricted = restrict(&joint(network), evidence);
    let marginal = project(&restricted, &[query], Reduction::Sum);
    normalize(&marginal, ZeroSumPolicy::Fail).unwrap()
}

/// A dataset whose frequencies are exactly the joint distribution of `network` scaled to `size`
/// cases.
pub fn exact_dataset(network: &Network, size: f64) -> Dataset {
    let joint = joint(network);
    let mut data = Dataset::new(network.catalog().clone());
    for (configuration, p) in joint.configurations().zip(joint.values()) {
        if *p > 0.0 {
            data.add_case(&configuration, p * size).unwrap();
        }
    }
    data
}

pub fn assert_close(a: &TablePotential, b: &TablePotential, tolerance: f64) {
    assert!(
        a.approx_eq(b, tolerance),
        "{:?} and {:?} differ by more than {}",
        a,
        b,
        tolerance
    );
}
