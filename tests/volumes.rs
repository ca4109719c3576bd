use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vorocore::{
    random_points, BoundingBox, ConeGeometry, Container, ContainerKind, CylinderGeometry, Lattice, PeriodicContainer,
    PlaneGeometry, SphereGeometry, Tessellation, Wall, WALL_ID_START,
};

const GRID_SIZE: usize = 20;
const SIZE: f64 = 10.0;

fn generate_grid(size: f64) -> Vec<[f64; 3]> {
    let n = GRID_SIZE;
    let step = size / n as f64;
    let offset = step / 2.0;
    let mut generators = Vec::with_capacity(n * n * n);
    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                generators.push([x as f64 * step + offset, y as f64 * step + offset, z as f64 * step + offset]);
            }
        }
    }
    generators
}

fn relative_error(got: f64, expected: f64) -> f64 {
    (got - expected).abs() / expected
}

macro_rules! test_volume {
    ($test_name:ident, $kind:expr, $setup:expr, $expected:expr, $max_error:expr) => {
        #[test]
        fn $test_name() {
            let bounds = BoundingBox::new([0.0; 3], [SIZE; 3]);
            let mut container = Container::new(bounds, [5, 5, 5], [false; 3], $kind).unwrap();
            for (i, p) in generate_grid(SIZE).into_iter().enumerate() {
                container.put(i as i32, p).unwrap();
            }
            $setup(&mut container, SIZE);

            let tess = Tessellation::<i32>::compute(&container).unwrap();
            let total_volume = tess.total_volume();
            let expected_volume = $expected;

            let error = relative_error(total_volume, expected_volume);
            println!(
                "{} Volume: Got {:.4}, Expected {:.4}, Error {:.4}%",
                stringify!($test_name),
                total_volume,
                expected_volume,
                error * 100.0
            );
            assert!(error < $max_error, "Volume error too high: {:.4}%", error * 100.0);
        }
    };
}

test_volume!(test_box_volume_grid, ContainerKind::Mono, |_: &mut Container, _: f64| {}, SIZE.powi(3), 1e-12);

test_volume!(test_box_volume_poly_zero_radii, ContainerKind::Poly, |_: &mut Container, _: f64| {}, SIZE.powi(3), 1e-12);

test_volume!(
    test_sphere_volume_grid,
    ContainerKind::Mono,
    |c: &mut Container, size: f64| {
        c.add_wall(Wall::new(WALL_ID_START, Box::new(SphereGeometry::new([size / 2.0; 3], 4.0))));
    },
    4.0 / 3.0 * std::f64::consts::PI * 4.0f64.powi(3),
    0.01
);

test_volume!(
    test_cylinder_volume_grid,
    ContainerKind::Mono,
    |c: &mut Container, size: f64| {
        c.add_wall(Wall::new(WALL_ID_START, Box::new(CylinderGeometry::new([size / 2.0; 3], [0.0, 0.0, 1.0], 4.0))));
    },
    std::f64::consts::PI * 4.0f64.powi(2) * SIZE,
    0.01
);

test_volume!(
    test_half_space_volume_grid,
    ContainerKind::Mono,
    |c: &mut Container, size: f64| {
        // the plane coincides with a layer of cell faces
        c.add_wall(Wall::new(WALL_ID_START, Box::new(PlaneGeometry::new([size / 2.0; 3], [-1.0, 0.0, 0.0]))));
    },
    SIZE.powi(3) / 2.0,
    1e-9
);

test_volume!(
    test_cone_volume_grid,
    ContainerKind::Mono,
    |c: &mut Container, size: f64| {
        // apex at the top face, opening downwards with a half-angle of 0.3 rad
        c.add_wall(Wall::new(
            WALL_ID_START,
            Box::new(ConeGeometry::new([size / 2.0, size / 2.0, size], [0.0, 0.0, -1.0], 0.3)),
        ));
    },
    std::f64::consts::PI * (SIZE * 0.3f64.tan()).powi(2) * SIZE / 3.0,
    0.05
);

#[test]
fn test_random_volume_with_sphere_wall() {
    let bounds = BoundingBox::new([0.0; 3], [SIZE; 3]);
    let walls = vec![Wall::new(WALL_ID_START, Box::new(SphereGeometry::new([SIZE / 2.0; 3], 4.0)))];
    let points = random_points(&bounds, &walls, 4000, 3);
    let mut container = Container::new(bounds, [8, 8, 8], [false; 3], ContainerKind::Mono).unwrap();
    for (i, p) in points.into_iter().enumerate() {
        container.put(i as i32, p).unwrap();
    }
    for wall in walls {
        container.add_wall(wall);
    }
    let tess = Tessellation::<()>::compute(&container).unwrap();
    let expected = 4.0 / 3.0 * std::f64::consts::PI * 4.0f64.powi(3);
    let error = relative_error(tess.total_volume(), expected);
    println!("Random sphere volume error {:.4}%", error * 100.0);
    // tangent planes of the outermost generators overshoot the surface slightly
    assert!(error < 0.03);
    // every generator lies inside the wall, so no cell is removed
    assert_eq!(tess.empty_cells(), 0);
}

#[test]
fn test_periodic_volume_random() {
    for periodic in [[true; 3], [true, false, false], [false, true, true]] {
        let bounds = BoundingBox::new([-1.0, 0.0, 2.0], [3.0, 2.0, 5.0]);
        let mut container = Container::new(bounds, [4, 2, 3], periodic, ContainerKind::Mono).unwrap();
        for (i, p) in random_points(&bounds, &[], 600, 5).into_iter().enumerate() {
            container.put(i as i32, p).unwrap();
        }
        let total = container.sum_cell_volumes().unwrap();
        let error = relative_error(total, bounds.volume());
        println!("Periodic {:?} volume error {:e}", periodic, error);
        assert!(error < 1e-9);
    }
}

#[test]
fn test_poly_volume_random_radii() {
    let bounds = BoundingBox::new([0.0; 3], [SIZE; 3]);
    let mut rng = StdRng::seed_from_u64(17);
    for periodic in [[false; 3], [true; 3]] {
        let mut container = Container::new(bounds, [6, 6, 6], periodic, ContainerKind::Poly).unwrap();
        for (i, p) in random_points(&bounds, &[], 1500, 9).into_iter().enumerate() {
            container.put_poly(i as i32, p, rng.gen_range(0.05..0.4)).unwrap();
        }
        let tess = Tessellation::<i32>::compute(&container).unwrap();
        let error = relative_error(tess.total_volume(), bounds.volume());
        println!("Poly {:?} volume error {:e}", periodic, error);
        assert!(error < 1e-9);
    }
}

#[test]
fn test_triclinic_volume_random() {
    let lattice = Lattice::new(4.0, 1.3, 3.5, -0.7, 0.9, 3.0);
    let mut container = PeriodicContainer::new(lattice, [4, 4, 3], ContainerKind::Mono).unwrap();
    let mut rng = StdRng::seed_from_u64(23);
    for i in 0..500 {
        let p = [rng.gen_range(0.0..4.0), rng.gen_range(0.0..3.5), rng.gen_range(0.0..3.0)];
        container.put(i, p).unwrap();
    }
    let tess = Tessellation::<i32>::compute(&container).unwrap();
    let error = relative_error(tess.total_volume(), lattice.volume());
    println!("Triclinic volume: Got {:.6}, Expected {:.6}", tess.total_volume(), lattice.volume());
    assert!(error < 1e-9);
    assert_eq!(tess.empty_cells(), 0);
}

#[test]
fn test_triclinic_poly_volume() {
    let lattice = Lattice::new(3.0, 0.5, 3.0, 0.25, -0.5, 3.0);
    let mut container = PeriodicContainer::new(lattice, [3, 3, 3], ContainerKind::Poly).unwrap();
    let mut rng = StdRng::seed_from_u64(29);
    for i in 0..200 {
        let p = [rng.gen_range(0.0..3.0), rng.gen_range(0.0..3.0), rng.gen_range(0.0..3.0)];
        container.put_poly(i, p, rng.gen_range(0.0..0.3)).unwrap();
    }
    let total = container.sum_cell_volumes().unwrap();
    assert!(relative_error(total, lattice.volume()) < 1e-9);
}
