mod common;

use common::*;
use potential_inference::*;
use test_log::test;

#[test]
fn likelihood_weighting_converges() {
    let (network, [a, b, c, d]) = v_structure();
    let mut evidence = EvidenceCase::new();
    evidence.add_finding(d, 1).unwrap();
    let options = InferenceOptions::new().samples(100_000).seed(2024);

    let (estimate, report) =
        likelihood_weighting(&network, &evidence, &[a, b, c], &options).unwrap();
    assert_eq!(report.samples, 100_000);
    assert_eq!(report.accepted, 100_000);
    assert!(report.total_weight > 0.0 && report.total_weight < 100_000.0);

    let exact = infer(&network, &evidence, &[a, b, c], &InferenceOptions::new()).unwrap();
    let error = estimate.max_difference(&exact).unwrap();
    assert!(error < 0.02, "error {}", error);
}

#[test]
fn logic_sampling_rejects_contradicting_samples() {
    let (network, a, b) = two_nodes();
    let mut evidence = EvidenceCase::new();
    evidence.add_finding(b, 0).unwrap();
    let options = InferenceOptions::new().samples(100_000).seed(99);

    let (estimate, report) = logic_sampling(&network, &evidence, &[a, b], &options).unwrap();
    // P(B = t) = 0.31, so roughly that share of the samples survives.
    assert!((report.acceptance_rate() - 0.31).abs() < 0.02);
    assert_eq!(report.total_weight, report.accepted as f64);
    assert!((estimate.probability(a, 0).unwrap() - 0.24 / 0.31).abs() < 0.02);
    assert_eq!(estimate.get(b).unwrap().values(), &[1.0, 0.0]);
}

#[test]
fn the_seed_fixes_the_result() {
    let (network, [cloudy, sprinkler, rain, wet]) = sprinkler();
    let mut evidence = EvidenceCase::new();
    evidence.add_finding(wet, 0).unwrap();
    let options = InferenceOptions::new().samples(5_000).seed(7);
    for algorithm in [Algorithm::LogicSampling, Algorithm::LikelihoodWeighting] {
        let options = options.clone().algorithm(algorithm);
        let first = infer(&network, &evidence, &[cloudy, sprinkler, rain], &options).unwrap();
        let second = infer(&network, &evidence, &[cloudy, sprinkler, rain], &options).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn zero_weight_means_impossible_evidence() {
    let (network, [_, sprinkler, rain, wet]) = sprinkler();
    let mut evidence = EvidenceCase::new();
    evidence.add_finding(wet, 0).unwrap();
    evidence.add_finding(sprinkler, 1).unwrap();
    evidence.add_finding(rain, 1).unwrap();
    let options = InferenceOptions::new().samples(2_000);

    assert!(matches!(
        likelihood_weighting(&network, &evidence, &[wet], &options),
        Err(Error::ImpossibleEvidence)
    ));
    assert!(matches!(
        logic_sampling(&network, &evidence, &[wet], &options),
        Err(Error::ImpossibleEvidence)
    ));
}

#[test]
fn no_samples_no_estimate() {
    let (network, a, _) = two_nodes();
    let options = InferenceOptions::new().samples(0);
    assert!(matches!(
        likelihood_weighting(&network, &EvidenceCase::new(), &[a], &options),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        logic_sampling(&network, &EvidenceCase::new(), &[a], &options),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn sampling_handles_every_potential_kind() {
    let mut network = Network::new();
    let flu = network.add_variable("flu", &["no", "yes"]).unwrap();
    let cold = network.add_variable("cold", &["no", "yes"]).unwrap();
    let fever = network.add_variable("fever", &["no", "yes"]).unwrap();
    network.add_link(flu, fever).unwrap();
    network.add_link(cold, fever).unwrap();
    network
        .set_potential(flu, Potential::Uniform([flu].iter().copied().collect()))
        .unwrap();
    network.set_table(cold, vec![0.7, 0.3]).unwrap();
    let noisy = CanonicalPotential::noisy_or(fever, &[flu, cold], &[0.8, 0.4], 0.1).unwrap();
    network.set_potential(fever, noisy).unwrap();

    let mut evidence = EvidenceCase::new();
    evidence.add_finding(fever, 1).unwrap();
    let exact = infer(&network, &evidence, &[flu, cold], &InferenceOptions::new()).unwrap();
    let options = InferenceOptions::new()
        .algorithm(Algorithm::LikelihoodWeighting)
        .samples(50_000)
        .seed(3);
    let estimate = infer(&network, &evidence, &[flu, cold], &options).unwrap();
    assert!(estimate.max_difference(&exact).unwrap() < 0.02);
}
