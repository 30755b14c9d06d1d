//! Linearization of a three-region chain against the nonlinear step.

use nalgebra::DVector;
use rf_core::{m, s, to_hours};
use rf_mfd::{Polynomial, Pwa, RegionMfd};
use rf_model::{
    CompletionRate, LinearDynamicsModel, RoutingTable, central_difference_jacobian,
};
use rf_network::{NetworkBuilder, RegionPartition};

fn parabola(jam: f64) -> RegionMfd {
    let curve = Polynomial::new(vec![0.0, jam, -1.0]);
    RegionMfd {
        pwa: Pwa::build(&curve, jam / 2.0, jam, 4).unwrap(),
        curve,
        critical_density: jam / 2.0,
        jam_density: jam,
    }
}

fn chain_model() -> LinearDynamicsModel {
    let mut b = NetworkBuilder::new();
    let e: Vec<_> = (0..6)
        .map(|i| b.add_edge(format!("e{i}"), m(200.0 + 50.0 * i as f64), 1 + (i % 2) as u32))
        .collect();
    for w in e.windows(2) {
        b.connect(w[0], w[1]);
    }
    let network = b.build().unwrap();
    let partition = RegionPartition::from_labels(&network, &[0, 0, 1, 1, 2, 2]).unwrap();
    let routing = RoutingTable::uniform(partition.adjacency(), 0.5).unwrap();
    LinearDynamicsModel::from_partition(
        &network,
        &partition,
        vec![parabola(80.0), parabola(100.0), parabola(120.0)],
        routing,
        CompletionRate::default(),
    )
    .unwrap()
}

#[test]
fn affine_model_matches_step_at_reference() {
    let model = chain_model();
    let ts = s(90.0);
    let rho = DVector::from_vec(vec![25.0, 40.0, 70.0]);
    let u = DVector::from_vec(vec![0.8, 1.0, 0.7]);
    let q = DVector::from_vec(vec![300.0, 0.0, 150.0]);

    let affine = model.linearize(ts, &rho, &u).unwrap();
    let exact = model.step(ts, &rho, &u, &q).unwrap();
    let approx = affine.predict(&rho, &u, &q);
    assert!((exact - approx).norm() < 1e-9);

    for i in 0..3 {
        let expected = to_hours(ts) / model.capacities()[i];
        assert!((affine.c[(i, i)] - expected).abs() < 1e-15);
    }
}

#[test]
fn jacobians_match_finite_differences() {
    let model = chain_model();
    let ts = s(60.0);
    let rho = DVector::from_vec(vec![30.0, 55.0, 20.0]);
    let u = DVector::from_vec(vec![0.9, 0.6, 1.0]);
    let zero = DVector::zeros(3);
    let affine = model.linearize(ts, &rho, &u).unwrap();

    let a_fd = central_difference_jacobian(&rho, |x| model.step(ts, x, &u, &zero), 1e-6).unwrap();
    let b_fd = central_difference_jacobian(&u, |x| model.step(ts, &rho, x, &zero), 1e-6).unwrap();
    assert!((&affine.a - a_fd).amax() < 1e-6);
    assert!((&affine.b - b_fd).amax() < 1e-6);

    // Region 1 receives half of region 0's outflow.
    assert!(affine.b[(1, 0)] > 0.0);
    assert!(affine.b[(0, 0)] < 0.0);
    // Regions 0 and 2 are not adjacent.
    assert_eq!(affine.b[(2, 0)], 0.0);
}

#[test]
fn linearize_is_deterministic_and_tracks_operating_point() {
    let model = chain_model();
    let ts = s(90.0);
    let rho = DVector::from_vec(vec![25.0, 40.0, 70.0]);
    let u = DVector::from_element(3, 1.0);

    let first = model.linearize(ts, &rho, &u).unwrap();
    let second = model.linearize(ts, &rho, &u).unwrap();
    assert_eq!(first, second);

    let moved = model
        .linearize(ts, &DVector::from_vec(vec![26.0, 40.0, 70.0]), &u)
        .unwrap();
    assert_ne!(first.a, moved.a);
    assert_ne!(first.d, moved.d);
}

#[test]
fn rollout_chains_predictions() {
    let model = chain_model();
    let ts = s(90.0);
    let rho = DVector::from_vec(vec![25.0, 40.0, 70.0]);
    let u = DVector::from_element(3, 1.0);
    let affine = model.linearize(ts, &rho, &u).unwrap();

    let inputs = nalgebra::DMatrix::from_element(3, 2, 1.0);
    let demands = nalgebra::DMatrix::zeros(3, 2);
    let traj = affine.rollout(&rho, &inputs, &demands);
    let one = affine.predict(&rho, &u, &DVector::zeros(3));
    let two = affine.predict(&one, &u, &DVector::zeros(3));
    assert!((traj.column(0) - one).norm() < 1e-12);
    assert!((traj.column(1) - two).norm() < 1e-12);
}

proptest::proptest! {
    #[test]
    fn affine_model_is_exact_at_any_operating_point(
        rho in proptest::collection::vec(1.0f64..70.0, 3),
        u in proptest::collection::vec(0.5f64..1.0, 3),
        q in proptest::collection::vec(0.0f64..400.0, 3),
    ) {
        let model = chain_model();
        let ts = s(90.0);
        let rho = DVector::from_vec(rho);
        let u = DVector::from_vec(u);
        let q = DVector::from_vec(q);
        let affine = model.linearize(ts, &rho, &u).unwrap();
        let exact = model.step(ts, &rho, &u, &q).unwrap();
        proptest::prop_assert!((exact - affine.predict(&rho, &u, &q)).norm() < 1e-8);
    }
}
