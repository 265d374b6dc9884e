use potential_inference::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use test_log::test;

fn random_table(rng: &mut Xoshiro256PlusPlus, scope: &[Variable]) -> TablePotential {
    let size: usize = scope.iter().map(|v| v.num_states()).product();
    let values = (0..size).map(|_| rng.gen_range(0.0..1.0)).collect();
    TablePotential::new(scope, values).unwrap()
}

fn assignment(scope: &[Variable], states: &[usize]) -> EvidenceCase {
    let mut case = EvidenceCase::new();
    for (variable, state) in scope.iter().zip(states) {
        case.add_finding(*variable, *state).unwrap();
    }
    case
}

#[test]
fn multiply_covers_both_scopes() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 3);
    let c = Variable::new(2, 4);
    let ab = random_table(&mut rng, &[a, b]);
    let bc = random_table(&mut rng, &[c, b]);

    let product = multiply(&ab, &bc);
    assert_eq!(product.scope(), &[a, b, c]);
    assert_eq!(product.len(), 2 * 3 * 4);

    for (states, value) in product.configurations().zip(product.values()) {
        let case = assignment(product.scope(), &states);
        let expected = ab.value_at(&case).unwrap() * bc.value_at(&case).unwrap();
        assert_eq!(*value, expected, "at {:?}", states);
    }

    let reversed = multiply(&bc, &ab);
    assert_eq!(reversed.scope(), &[c, b, a]);
    assert!(product.approx_eq(&reversed, 1e-15));
}

#[test]
fn multiply_all_of_nothing_is_one() {
    let product = multiply_all(std::iter::empty());
    assert!(product.scope().is_empty());
    assert_eq!(product.values(), &[1.0]);
}

#[test]
fn marginals_keep_the_mass() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
    let scope = [Variable::new(0, 3), Variable::new(1, 2), Variable::new(2, 4)];
    let table = random_table(&mut rng, &scope);

    for remove in [&scope[..1], &scope[1..2], &scope[..2], &scope[..]] {
        let marginal = sum_out(&table, remove).unwrap();
        assert!((marginal.sum() - table.sum()).abs() < 1e-12);
        for variable in remove {
            assert!(!marginal.contains(*variable));
        }
    }

    let maxed = max_out(&table, &scope).unwrap();
    let largest = table.values().iter().cloned().fold(0.0, f64::max);
    assert_eq!(maxed.values(), &[largest]);
    assert_eq!(table.argmax().1, largest);
}

#[test]
fn project_is_marginalize_of_the_rest() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 3);
    let c = Variable::new(2, 2);
    let table = random_table(&mut rng, &[a, b, c]);

    let projected = project(&table, &[c, a], Reduction::Sum);
    assert_eq!(projected.scope(), &[c, a]);
    let marginal = sum_out(&table, &[b]).unwrap();
    assert!(projected.approx_eq(&marginal, 1e-12));
}

#[test]
fn project_ignores_repeated_variables() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(12);
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 3);
    let table = random_table(&mut rng, &[a, b]);

    let projected = project(&table, &[b, a, b, b], Reduction::Sum);
    assert_eq!(projected.scope(), &[b, a]);
    assert!(projected.approx_eq(&project(&table, &[b, a], Reduction::Sum), 0.0));
    let maxed = project(&table, &[a, a], Reduction::Max);
    assert_eq!(maxed.scope(), &[a]);
}

#[test]
fn marginalize_needs_variables_in_scope() {
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 2);
    let table = TablePotential::uniform(&[a]);
    assert!(matches!(
        marginalize(&table, &[b], Reduction::Sum),
        Err(Error::VariableNotInScope { .. })
    ));
}

#[test]
fn normalize_sums_to_one() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
    let scope = [Variable::new(0, 3), Variable::new(1, 3)];
    for _ in 0..20 {
        let table = random_table(&mut rng, &scope);
        let normalized = normalize(&table, ZeroSumPolicy::Fail).unwrap();
        assert!((normalized.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn normalize_conditional_per_parent_configuration() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);
    let child = Variable::new(0, 3);
    let parent = Variable::new(1, 4);
    let table = random_table(&mut rng, &[child, parent]);
    let cpt = normalize_conditional(&table, ZeroSumPolicy::Fail).unwrap();

    let parent_marginal = sum_out(&cpt, &[child]).unwrap();
    for value in parent_marginal.values() {
        assert!((value - 1.0).abs() < 1e-9);
    }
}

#[test]
fn zero_sum_policies() {
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 2);
    let table = TablePotential::new(&[a, b], vec![0.0, 0.0, 1.0, 3.0]).unwrap();

    assert!(matches!(
        normalize_conditional(&table, ZeroSumPolicy::Fail),
        Err(Error::NormalizeNullVector)
    ));
    let fixed = normalize_conditional(&table, ZeroSumPolicy::Uniform).unwrap();
    assert_eq!(fixed.values(), &[0.5, 0.5, 0.25, 0.75]);
}

#[test]
fn zero_divided_by_zero_is_zero() {
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 2);
    let numerator = TablePotential::new(&[a, b], vec![0.0, 0.5, 0.0, 0.25]).unwrap();
    let denominator = TablePotential::new(&[a], vec![0.0, 0.5]).unwrap();

    let ratio = divide(&numerator, &denominator).unwrap();
    assert_eq!(ratio.scope(), &[a, b]);
    assert_eq!(ratio.values(), &[0.0, 1.0, 0.0, 0.5]);
}

#[test]
fn nonzero_divided_by_zero_fails() {
    let a = Variable::new(0, 2);
    let numerator = TablePotential::new(&[a], vec![0.1, 0.0]).unwrap();
    let denominator = TablePotential::new(&[a], vec![0.0, 1.0]).unwrap();
    assert!(matches!(
        divide(&numerator, &denominator),
        Err(Error::DivisionByZero)
    ));
}

#[test]
fn divide_undoes_multiply() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(19);
    let a = Variable::new(0, 3);
    let b = Variable::new(1, 2);
    let ab = random_table(&mut rng, &[a, b]);
    let mut b_only = random_table(&mut rng, &[b]);
    b_only.values_mut().iter_mut().for_each(|v| *v += 0.1);

    let back = divide(&multiply(&ab, &b_only), &b_only).unwrap();
    assert!(back.approx_eq(&ab, 1e-12));

    let c = Variable::new(2, 2);
    let stranger = TablePotential::uniform(&[c]);
    assert!(divide(&ab, &stranger).is_err());
}

#[test]
fn restrict_slices_and_is_idempotent() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(23);
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 3);
    let c = Variable::new(2, 2);
    let unrelated = Variable::new(3, 5);
    let table = random_table(&mut rng, &[a, b, c]);

    let mut evidence = EvidenceCase::new();
    evidence.add_finding(b, 1).unwrap();
    evidence.add_finding(unrelated, 4).unwrap();

    let restricted = restrict(&table, &evidence);
    assert_eq!(restricted.scope(), &[a, c]);
    for states in restricted.configurations() {
        let full = table.value(&[states[0], 1, states[1]]).unwrap();
        assert_eq!(restricted.value(&states).unwrap(), full);
    }
    assert_eq!(restrict(&restricted, &evidence), restricted);

    let nothing = EvidenceCase::new();
    assert_eq!(restrict(&table, &nothing), table);
}

#[test]
fn restrict_everything_leaves_a_constant() {
    let a = Variable::new(0, 2);
    let b = Variable::new(1, 2);
    let table = TablePotential::new(&[a, b], vec![0.1, 0.2, 0.3, 0.4]).unwrap();
    let mut evidence = EvidenceCase::new();
    evidence.add_finding(a, 0).unwrap();
    evidence.add_finding(b, 1).unwrap();

    let restricted = restrict(&table, &evidence);
    assert!(restricted.scope().is_empty());
    assert_eq!(restricted.values(), &[0.3]);
}

#[test]
fn evidence_conflicts_are_rejected() {
    let a = Variable::new(0, 3);
    let mut first = EvidenceCase::new();
    first.add_finding(a, 1).unwrap();
    let mut second = EvidenceCase::new();
    second.add_finding(a, 2).unwrap();

    assert!(matches!(
        first.merge(&second),
        Err(Error::InconsistentEvidence { .. })
    ));
    assert_eq!(first.state_of(a), Some(1));
    assert!(matches!(
        first.add_finding(a, 3),
        Err(Error::StateOutOfRange { .. })
    ));
}

#[test]
fn structured_potentials_are_conditional_tables() {
    let child = Variable::new(0, 2);
    let p1 = Variable::new(1, 2);
    let p2 = Variable::new(2, 2);

    let noisy = CanonicalPotential::noisy_or(child, &[p1, p2], &[0.8, 0.6], 0.1).unwrap();
    let table = Potential::from(noisy).to_table();
    assert_eq!(table.scope(), &[child, p1, p2]);
    let normalized = normalize_conditional(&table, ZeroSumPolicy::Fail).unwrap();
    assert!(table.approx_eq(&normalized, 1e-12));

    let uniform = Potential::Uniform([child, p1].iter().copied().collect());
    assert_eq!(uniform.to_table().values(), &[0.5; 4]);
}

#[test]
fn catalog_names_are_unique() {
    let mut catalog = Catalog::new();
    catalog.add_variable("x", &["a", "b"]).unwrap();
    assert!(matches!(
        catalog.add_variable("x", &["c", "d"]),
        Err(Error::DuplicateVariable(_))
    ));
    assert!(matches!(
        catalog.add_variable("y", &[] as &[&str]),
        Err(Error::NoStates(_))
    ));
    assert!(matches!(
        catalog.variable("z"),
        Err(Error::UnknownVariable(_))
    ));
}

#[test]
fn catalog_finds_variables_by_name() {
    let mut catalog = Catalog::new();
    let names = ["wet", "rain", "cloudy", "sprinkler", "season"];
    let variables: Vec<Variable> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let states: Vec<String> = (0..=i).map(|s| s.to_string()).collect();
            catalog.add_variable(name, &states).unwrap()
        })
        .collect();

    let copy = catalog.clone();
    for (i, (name, variable)) in names.iter().zip(variables.iter()).enumerate() {
        assert_eq!(variable.id(), i);
        assert_eq!(variable.num_states(), i + 1);
        assert_eq!(catalog.variable(name).unwrap(), *variable);
        assert_eq!(catalog.name(*variable), *name);
        assert_eq!(copy.variable(name).unwrap(), *variable);
        assert_eq!(copy.name(*variable), *name);
    }
    assert!(copy.variable("fog").is_err());
}

#[test]
#[cfg(all(debug_assertions, target_pointer_width = "64"))]
#[should_panic(expected = "exceeds u32")]
fn variable_ids_must_fit_in_u32() {
    Variable::new(1 << 32, 2);
}
