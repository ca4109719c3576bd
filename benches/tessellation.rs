use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vorocore::{optimal_grid, random_points, BoundingBox, Container, ContainerKind, Lattice, PeriodicContainer, Tessellation};

const NUM_POINTS: usize = 1000;

fn benchmark_container_put(c: &mut Criterion) {
    let bounds = BoundingBox::new([0.0; 3], [100.0; 3]);
    let points = random_points(&bounds, &[], NUM_POINTS, 3);
    let grid = optimal_grid(&bounds, NUM_POINTS);

    c.bench_function(&format!("put_{}_points", NUM_POINTS), |b| {
        b.iter(|| {
            let mut container = Container::new(bounds, grid, [false; 3], ContainerKind::Mono).unwrap();
            for (i, &p) in points.iter().enumerate() {
                container.put(i as i32, black_box(p)).unwrap();
            }
            container
        })
    });
}

fn benchmark_tessellation_calculate(c: &mut Criterion) {
    let bounds = BoundingBox::new([0.0; 3], [100.0; 3]);
    let grid = optimal_grid(&bounds, NUM_POINTS);
    let points = random_points(&bounds, &[], NUM_POINTS, 3);

    let mut container = Container::new(bounds, grid, [false; 3], ContainerKind::Mono).unwrap();
    for (i, &p) in points.iter().enumerate() {
        container.put(i as i32, p).unwrap();
    }
    c.bench_function(&format!("calculate_{}_points", NUM_POINTS), |b| {
        b.iter(|| Tessellation::<()>::compute(&container).unwrap())
    });
    c.bench_function(&format!("calculate_sequential_{}_points", NUM_POINTS), |b| {
        b.iter(|| container.sum_cell_volumes().unwrap())
    });

    let mut periodic = Container::new(bounds, grid, [true; 3], ContainerKind::Mono).unwrap();
    for (i, &p) in points.iter().enumerate() {
        periodic.put(i as i32, p).unwrap();
    }
    c.bench_function(&format!("calculate_periodic_{}_points", NUM_POINTS), |b| {
        b.iter(|| Tessellation::<i32>::compute(&periodic).unwrap())
    });

    let mut triclinic =
        PeriodicContainer::new(Lattice::new(100.0, 20.0, 100.0, -10.0, 15.0, 100.0), grid, ContainerKind::Mono).unwrap();
    for (i, &p) in points.iter().enumerate() {
        triclinic.put(i as i32, p).unwrap();
    }
    triclinic.create_all_images().unwrap();
    c.bench_function(&format!("calculate_triclinic_{}_points", NUM_POINTS), |b| {
        b.iter(|| Tessellation::<i32>::compute(&triclinic).unwrap())
    });
}

fn benchmark_find_voronoi_cell(c: &mut Criterion) {
    let bounds = BoundingBox::new([0.0; 3], [100.0; 3]);
    let mut container = Container::new(bounds, optimal_grid(&bounds, NUM_POINTS), [false; 3], ContainerKind::Mono).unwrap();
    for (i, p) in random_points(&bounds, &[], NUM_POINTS, 3).into_iter().enumerate() {
        container.put(i as i32, p).unwrap();
    }
    let queries = random_points(&bounds, &[], 1000, 4);
    c.bench_function("find_voronoi_cell_1000_queries", |b| {
        b.iter(|| {
            for &q in &queries {
                black_box(container.find_voronoi_cell(q).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_container_put,
    benchmark_tessellation_calculate,
    benchmark_find_voronoi_cell
);
criterion_main!(benches);
