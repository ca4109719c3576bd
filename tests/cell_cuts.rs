use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vorocore::{Cell, Config, NeighborCell, VoronoiCell};

fn unit_vector(rng: &mut StdRng) -> [f64; 3] {
    loop {
        let v: [f64; 3] = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)];
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if len > 0.1 && len <= 1.0 {
            return [v[0] / len, v[1] / len, v[2] / len];
        }
    }
}

#[test]
fn test_tangent_planes_approach_sphere() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut cell: VoronoiCell = Cell::new_box([-1.0; 3], [1.0; 3], Config::default());
    let r = 0.8;
    for i in 0..2000 {
        let n = unit_vector(&mut rng);
        // plane at distance r along n
        assert!(cell.cut(n, 2.0 * r, i).unwrap());
        if i % 250 == 0 {
            cell.check_relations().unwrap();
        }
    }
    cell.check_relations().unwrap();
    assert_eq!(cell.euler_characteristic(), 2);
    let expected = 4.0 / 3.0 * PI * r * r * r;
    let error = (cell.volume() - expected) / expected;
    println!("Sphere approximation: {} vertices, error {:.4}%", cell.vertex_count(), error * 100.0);
    assert!(error > 0.0 && error < 0.02);
    assert!(cell.max_radius_squared() > r * r);
}

#[test]
fn test_planes_through_vertices() {
    // every plane passes through vertices of the cube or of earlier cuts
    let mut cell: NeighborCell = Cell::new_box([-1.0; 3], [1.0; 3], Config::default());
    let planes: [[f64; 3]; 4] = [[1.0, 1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 0.0]];
    for (k, &n) in planes.iter().enumerate() {
        assert!(cell.cut(n, 0.0, 10 + k as i32).unwrap());
        cell.check_relations().unwrap();
        cell.check_duplicates().unwrap();
    }
    assert_eq!(cell.euler_characteristic(), 2);
    // x <= -|y| and z <= -y inside the cube
    assert!((cell.volume() - 1.0).abs() < 1e-12, "volume {}", cell.volume());
    let tags = cell.neighbors();
    for k in 10..13 {
        assert!(tags.contains(&k), "missing face {}", k);
    }
    assert!(!tags.contains(&13));
}

#[test]
fn test_coplanar_cut_leaves_cell_unchanged() {
    let mut cell: NeighborCell = Cell::new_box([-1.0; 3], [1.0; 3], Config::default());
    // the plane x = 1 is the cube's own face
    assert!(cell.cut([1.0, 0.0, 0.0], 2.0, 99).unwrap());
    cell.check_relations().unwrap();
    assert!((cell.volume() - 8.0).abs() < 1e-12);
    assert_eq!(cell.vertex_count(), 8);
}

#[test]
fn test_random_bisectors_keep_relations() {
    let mut rng = StdRng::seed_from_u64(5);
    for trial in 0..50 {
        let mut cell: NeighborCell = Cell::new_box([-1.0; 3], [1.0; 3], Config::default());
        let mut volume = cell.volume();
        for id in 0..40 {
            let rel = [rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0)];
            assert!(cell.cut_through(rel, id).unwrap());
            let next = cell.volume();
            assert!(next <= volume + 1e-12, "trial {} cut {} grew the cell", trial, id);
            volume = next;
        }
        cell.check_relations().unwrap();
        cell.check_duplicates().unwrap();
        assert_eq!(cell.euler_characteristic(), 2);
        assert_eq!(cell.face_areas().len(), cell.neighbors().len());
        let total: f64 = cell.face_areas().iter().sum();
        assert!((total - cell.surface_area()).abs() < 1e-12);
    }
}

#[test]
fn test_repeated_degenerate_cuts_on_octahedron() {
    let mut cell: VoronoiCell = Cell::new(12.0, Config::default());
    cell.init_octahedron(1.0);
    assert!((cell.volume() - 4.0 / 3.0).abs() < 1e-12);
    // x + y = 1 only touches an edge
    assert!(cell.cut([1.0, 1.0, 0.0], 2.0, 0).unwrap());
    assert!((cell.volume() - 4.0 / 3.0).abs() < 1e-12);
    // planes through pairs of opposite vertices, applied twice
    let mut volumes = Vec::new();
    for _ in 0..2 {
        for n in [[1.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 0.0, 1.0]] {
            assert!(cell.cut(n, 0.0, 0).unwrap());
            cell.check_relations().unwrap();
        }
        volumes.push(cell.volume());
    }
    assert_eq!(cell.euler_characteristic(), 2);
    assert!(volumes[0] > 0.0 && volumes[0] < 2.0 / 3.0);
    assert!((volumes[0] - volumes[1]).abs() < 1e-12);
}

#[test]
fn test_tetrahedron_cut() {
    let mut cell: NeighborCell = Cell::new(4.0, Config::default());
    cell.init_tetrahedron([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
    assert!((cell.volume() - 1.0 / 6.0).abs() < 1e-12);
    // keep z < 0.5, removing the top half of the height
    assert!(cell.cut([0.0, 0.0, 1.0], 1.0, 5).unwrap());
    cell.check_relations().unwrap();
    assert!((cell.volume() - (1.0 / 6.0) * (1.0 - 0.125)).abs() < 1e-12);
    assert!(cell.neighbors().contains(&5));
}

#[test]
fn test_plane_intersection_queries() {
    let mut cell: VoronoiCell = Cell::new_box([-1.0; 3], [1.0; 3], Config::default());
    let n = [1.0, 1.0, 1.0];
    // the farthest vertex reaches 2 x·n = 6
    assert!(cell.plane_intersects(n, 5.9));
    assert!(!cell.plane_intersects(n, 6.1));
    assert!(cell.plane_intersects_guess(n, 5.9));
    assert!(!cell.plane_intersects_guess(n, 6.1));
    cell.translate([1.0, 0.0, 0.0]);
    assert!(cell.plane_intersects(n, 7.9));
}
