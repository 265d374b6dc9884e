mod common;

use common::*;
use potential_inference::inference::{hugin, variable_elimination};
use potential_inference::*;
use test_log::test;

fn evidence(findings: &[(Variable, usize)]) -> EvidenceCase {
    findings
        .iter()
        .map(|&(variable, state)| Finding { variable, state })
        .collect::<Result<EvidenceCase>>()
        .unwrap()
}

fn exact_algorithms() -> [InferenceOptions; 2] {
    [
        InferenceOptions::new().algorithm(Algorithm::VariableElimination),
        InferenceOptions::new().algorithm(Algorithm::Hugin),
    ]
}

#[test]
fn two_node_posterior() {
    let (network, a, b) = two_nodes();
    let evidence = evidence(&[(b, 0)]);
    for options in exact_algorithms() {
        let posteriors = infer(&network, &evidence, &[a, b], &options).unwrap();
        let p = posteriors.probability(a, 0).unwrap();
        assert!((p - 0.24 / 0.31).abs() < 1e-6, "{}: {}", options.algorithm, p);
        assert_eq!(posteriors.get(b).unwrap().values(), &[1.0, 0.0]);
    }

    let options = &exact_algorithms()[0];
    let p = variable_elimination::probability_of_evidence(&network, &evidence, options).unwrap();
    assert!((p - 0.31).abs() < 1e-12);
}

#[test]
fn exact_algorithms_match_enumeration() {
    let (network, [a, b, c, d]) = v_structure();
    let cases = [
        evidence(&[]),
        evidence(&[(d, 1)]),
        evidence(&[(a, 1), (d, 0)]),
        evidence(&[(c, 2)]),
        evidence(&[(b, 0), (c, 1), (d, 1)]),
    ];
    for case in cases.iter() {
        let queries: Vec<Variable> = [a, b, c, d]
            .iter()
            .copied()
            .filter(|v| !case.contains(*v))
            .collect();
        let ve = infer(&network, case, &queries, &exact_algorithms()[0]).unwrap();
        let hugin = infer(&network, case, &queries, &exact_algorithms()[1]).unwrap();
        assert!(ve.max_difference(&hugin).unwrap() < 1e-6, "{:?}", case);
        for query in queries {
            assert_close(ve.get(query).unwrap(), &brute_force(&network, case, query), 1e-9);
        }
    }
}

#[test]
fn deterministic_tables_divide_zero_by_zero() {
    let (network, [cloudy, sprinkler, rain, wet]) = sprinkler();
    // With the sprinkler off, a wet lawn means it rained, so several separators are zero.
    let case = evidence(&[(wet, 0), (sprinkler, 1)]);
    let ve = infer(&network, &case, &[cloudy, rain], &exact_algorithms()[0]).unwrap();
    let hugin = infer(&network, &case, &[cloudy, rain], &exact_algorithms()[1]).unwrap();
    assert_eq!(ve.get(rain).unwrap().values(), &[1.0, 0.0]);
    assert!(ve.max_difference(&hugin).unwrap() < 1e-9);
    assert_close(
        hugin.get(cloudy).unwrap(),
        &brute_force(&network, &case, cloudy),
        1e-9,
    );
}

#[test]
fn impossible_evidence() {
    let (network, [_, sprinkler, rain, wet]) = sprinkler();
    let case = evidence(&[(wet, 0), (sprinkler, 1), (rain, 1)]);
    for options in exact_algorithms() {
        let result = infer(&network, &case, &[wet], &options);
        assert!(
            matches!(result, Err(Error::ImpossibleEvidence)),
            "{}: {:?}",
            options.algorithm,
            result
        );
    }
}

#[test]
fn unknown_variables_are_rejected() {
    let (network, a, _) = two_nodes();
    let stranger = Variable::new(7, 2);
    for options in exact_algorithms() {
        assert!(infer(&network, &evidence(&[]), &[stranger], &options).is_err());
        assert!(infer(&network, &evidence(&[(stranger, 0)]), &[a], &options).is_err());
    }
}

#[test]
fn explicit_elimination_order() {
    let (network, [a, b, c, d]) = v_structure();
    let case = evidence(&[(d, 0)]);
    let options = InferenceOptions::new();
    let heuristic = variable_elimination::joint_posterior(&network, &case, &[a], &options).unwrap();
    // The order may name kept and observed variables; they're skipped.
    let options = InferenceOptions::new().elimination_order(vec![d, a, c, b]);
    let explicit = variable_elimination::joint_posterior(&network, &case, &[a], &options).unwrap();
    assert_close(&heuristic, &explicit, 1e-12);

    for heuristic in [
        EliminationHeuristic::MinDegree,
        EliminationHeuristic::MinFill,
        EliminationHeuristic::MinWeight,
    ] {
        let options = InferenceOptions::new().heuristic(heuristic);
        let other = variable_elimination::joint_posterior(&network, &case, &[a], &options).unwrap();
        assert_close(&explicit, &other, 1e-12);
    }
}

#[test]
fn joint_posterior_over_two_variables() {
    let (network, [a, b, c, _]) = v_structure();
    let case = evidence(&[(c, 2)]);
    let options = InferenceOptions::new();
    let joint = variable_elimination::joint_posterior(&network, &case, &[b, a], &options).unwrap();
    assert_eq!(joint.scope(), &[b, a]);
    assert!((joint.sum() - 1.0).abs() < 1e-12);

    let mut hugin = HuginPropagation::new(&network, &InferenceOptions::new()).unwrap();
    hugin.propagate(&case).unwrap();
    assert_close(&hugin.clique_marginal(&[a, b]).unwrap(), &joint, 1e-9);
}

#[test]
fn repeated_query_variables_count_once() {
    let (network, [a, b, c, _]) = v_structure();
    let case = evidence(&[(c, 2)]);
    let options = InferenceOptions::new();
    let single = variable_elimination::joint_posterior(&network, &case, &[a], &options).unwrap();
    let repeated =
        variable_elimination::joint_posterior(&network, &case, &[a, a], &options).unwrap();
    assert_eq!(repeated.scope(), &[a]);
    assert_close(&repeated, &single, 1e-12);
    let pair =
        variable_elimination::joint_posterior(&network, &case, &[b, a, b], &options).unwrap();
    assert_eq!(pair.scope(), &[b, a]);

    let mut hugin = HuginPropagation::new(&network, &options).unwrap();
    hugin.propagate(&case).unwrap();
    let marginal = hugin.clique_marginal(&[a, a]).unwrap();
    assert_eq!(marginal.scope(), &[a]);
    assert_close(&marginal, &single, 1e-9);
}

#[test]
fn hugin_runs_in_order() {
    let (network, a, b) = two_nodes();
    let mut hugin = HuginPropagation::new(&network, &InferenceOptions::new()).unwrap();
    assert_eq!(hugin.state(), PropagationState::Built);
    assert!(matches!(
        hugin.finish(),
        Err(Error::PropagationOrder { .. })
    ));
    assert!(hugin.posterior(a).is_err());

    hugin.collect().unwrap();
    assert_eq!(hugin.state(), PropagationState::Collected);
    assert!(hugin.collect().is_err());
    assert!(hugin.probability_of_evidence().is_err());
    hugin.distribute().unwrap();
    assert!(hugin.distribute().is_err());
    hugin.finish().unwrap();
    assert_eq!(hugin.state(), PropagationState::Ready);
    assert!((hugin.probability_of_evidence().unwrap() - 1.0).abs() < 1e-12);
    assert!((hugin.posterior(b).unwrap().values()[0] - 0.31).abs() < 1e-12);

    // Entering evidence starts over from any state.
    hugin.enter_evidence(&evidence(&[(b, 0)])).unwrap();
    assert_eq!(hugin.state(), PropagationState::Built);
    assert!(hugin.posterior(a).is_err());
}

#[test]
fn hugin_reuses_its_tree() {
    let (network, [cloudy, sprinkler, rain, wet]) = sprinkler();
    let mut hugin = HuginPropagation::new(&network, &InferenceOptions::new()).unwrap();
    let first = evidence(&[(wet, 0)]);
    let second = evidence(&[(wet, 0), (cloudy, 1)]);

    hugin.propagate(&first).unwrap();
    let before = hugin.posteriors(&[sprinkler, rain]).unwrap();
    hugin.propagate(&second).unwrap();
    let other = hugin.posteriors(&[sprinkler, rain]).unwrap();
    assert!(before.max_difference(&other).unwrap() > 0.01);
    hugin.propagate(&first).unwrap();
    let again = hugin.posteriors(&[sprinkler, rain]).unwrap();
    assert_eq!(before.max_difference(&again), Some(0.0));

    let ve = infer(&network, &first, &[sprinkler, rain], &InferenceOptions::new()).unwrap();
    assert!(ve.max_difference(&again).unwrap() < 1e-9);
}

#[test]
fn max_reduction_finds_the_most_probable_explanation() {
    let network = random_network(41, 6);
    let variables: Vec<Variable> = network.variables().collect();
    let case = evidence(&[(variables[5], 0)]);
    let queries = &variables[..5];
    let options = InferenceOptions::new().reduction(Reduction::Max);

    let ve = variable_elimination::posteriors(&network, &case, queries, &options).unwrap();
    let hugin = hugin::posteriors(&network, &case, queries, &options).unwrap();
    assert!(ve.max_difference(&hugin).unwrap() < 1e-9);

    let (explanation, _) = restrict(&joint(&network), &case).argmax();
    for (query, state) in queries.iter().zip(explanation) {
        let (best, _) = ve.get(*query).unwrap().argmax();
        assert_eq!(best[0], state, "{:?}", query);
    }
}

#[test]
fn cancelled_before_starting() {
    let (network, [a, _, _, d]) = v_structure();
    let cancel = CancelToken::new();
    cancel.cancel();
    for algorithm in Algorithm::ALL {
        let options = InferenceOptions::new()
            .algorithm(algorithm)
            .samples(100)
            .cancel(cancel.clone());
        let result = infer(&network, &evidence(&[(d, 0)]), &[a], &options);
        assert!(matches!(result, Err(Error::Cancelled)), "{}", algorithm);
    }
}

#[test]
fn algorithm_names() {
    for algorithm in Algorithm::ALL {
        assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
        assert_eq!(algorithm.to_string(), algorithm.name());
    }
    assert!("gibbs".parse::<Algorithm>().is_err());
    assert_eq!(Algorithm::default(), Algorithm::VariableElimination);
    assert!(Algorithm::Hugin.is_exact());
    assert!(!Algorithm::LikelihoodWeighting.is_exact());
}

macro_rules! agree_on_random_networks {
    ($($name:ident: $seed:expr, $size:expr;)*) => {
        $(
        #[test]
        fn $name() {
            check_agreement($seed, $size);
        }
        )*
    }
}

agree_on_random_networks! {
    random_network_1: 1, 4;
    random_network_2: 2, 5;
    random_network_3: 3, 6;
    random_network_4: 4, 7;
    random_network_5: 5, 8;
    random_network_6: 6, 8;
}

fn check_agreement(seed: u64, size: usize) {
    let network = random_network(seed, size);
    let variables: Vec<Variable> = network.variables().collect();
    let case = evidence(&[(variables[0], 1), (variables[size - 1], 0)]);
    let queries = &variables[1..size - 1];

    let ve = infer(&network, &case, queries, &exact_algorithms()[0]).unwrap();
    let hugin = infer(&network, &case, queries, &exact_algorithms()[1]).unwrap();
    assert!(ve.max_difference(&hugin).unwrap() < 1e-6);
    for query in queries {
        assert_close(ve.get(*query).unwrap(), &brute_force(&network, &case, *query), 1e-9);
    }

    let mut propagation = HuginPropagation::new(&network, &InferenceOptions::new()).unwrap();
    propagation.propagate(&case).unwrap();
    let p = variable_elimination::probability_of_evidence(&network, &case, &InferenceOptions::new())
        .unwrap();
    assert!((propagation.probability_of_evidence().unwrap() - p).abs() < 1e-12);
}
