mod common;

use common::{assert_partials_consistent, random_pair, randomize_parameters};
use geonet::network::Network;
use geonet::observations::ObservationId;
use geonet::reduction::{PrincipalPoint, ProjectionType, Reduction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Add one observation of every type between `S` and `E` with random instrument heights.
fn observe_everything(net: &mut Network, rng: &mut StdRng) -> Vec<ObservationId> {
    let mut heights = || (rng.random_range(0.0..2.0), rng.random_range(0.0..2.0));
    let mut ids = Vec::new();

    let (ih, th) = heights();
    ids.push(net.add_direction(1, "S", "E", ih, th, 1.0).unwrap());
    let (ih, th) = heights();
    ids.push(net.add_zenith_angle(2, "S", "E", ih, th, 1.5).unwrap());
    let (ih, th) = heights();
    ids.push(net.add_horizontal_distance(3, "S", "E", ih, th, 500.0).unwrap());
    let (ih, th) = heights();
    ids.push(net.add_slope_distance(4, "S", "E", ih, th, 500.0).unwrap());
    let (ih, th) = heights();
    ids.push(net.add_delta_z(5, "S", "E", ih, th, 1.0).unwrap());
    let (ih, th) = heights();
    ids.push(net.add_gnss_baseline_1d(6, "S", "E", ih, th, 1.0).unwrap());
    let (ih, th) = heights();
    ids.extend(net.add_gnss_baseline_2d(7, "S", "E", ih, th, 1.0, 1.0).unwrap());
    let (ih, th) = heights();
    ids.extend(
        net.add_gnss_baseline_3d(8, "S", "E", ih, th, 1.0, 1.0, 1.0)
            .unwrap(),
    );
    ids
}

#[test]
fn test_partials_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..25 {
        let mut net = random_pair(&mut rng);
        let ids = observe_everything(&mut net, &mut rng);
        randomize_parameters(&mut net, &mut rng);
        for id in ids {
            assert_partials_consistent(&mut net, id);
        }
    }
}

#[test]
fn test_partials_match_finite_differences_in_local_ellipsoidal_frame() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let mut net = random_pair(&mut rng);
        let ids = observe_everything(&mut net, &mut rng);
        randomize_parameters(&mut net, &mut rng);

        let reduction = Reduction::builder()
            .projection_type(ProjectionType::LocalEllipsoidal)
            .principal_point(PrincipalPoint::new(
                0.0,
                0.0,
                0.0,
                rng.random_range(-1.2..1.2),
                rng.random_range(-3.0..3.0),
                rng.random_range(0.0..500.0),
            ))
            .build()
            .unwrap();
        let rid = net.add_reduction(reduction);
        for &id in &ids {
            net.attach_reduction(id, rid).unwrap();
        }
        assert_eq!(net.update_spherical_deflections(rid), Ok(2));

        for id in ids {
            assert_partials_consistent(&mut net, id);
        }
    }
}

#[test]
fn test_partials_with_shared_orientation() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut net = random_pair(&mut rng);
    let a = net.add_direction(1, "S", "E", 1.5, 1.2, 0.4).unwrap();
    let orientation = net
        .observation(a)
        .unwrap()
        .as_direction()
        .unwrap()
        .orientation();
    let b = net
        .add_direction_with_orientation(2, "S", "E", 1.5, 0.0, 0.4, orientation)
        .unwrap();
    randomize_parameters(&mut net, &mut rng);

    assert_partials_consistent(&mut net, a);
    assert_partials_consistent(&mut net, b);
}
