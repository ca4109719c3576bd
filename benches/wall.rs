use criterion::{criterion_group, criterion_main, Criterion};
use vorocore::{
    random_points, BoundingBox, ConeGeometry, Container, ContainerKind, CylinderGeometry, PlaneGeometry, SphereGeometry,
    Tessellation, Wall, WallGeometry, WALL_ID_START,
};

const NUM_POINTS: usize = 1000;

fn bench_wall(c: &mut Criterion, name: &str, geometry: Box<dyn WallGeometry>) {
    let bounds = BoundingBox::new([0.0; 3], [100.0; 3]);
    let wall = Wall::new(WALL_ID_START, geometry);
    let points = random_points(&bounds, std::slice::from_ref(&wall), NUM_POINTS, 5);

    let mut container = Container::new(bounds, [6, 6, 6], [false; 3], ContainerKind::Mono).unwrap();
    for (i, p) in points.into_iter().enumerate() {
        container.put(i as i32, p).unwrap();
    }
    container.add_wall(wall);

    c.bench_function(&format!("calculate_wall_{}_{}_points", name, NUM_POINTS), |b| {
        b.iter(|| Tessellation::<i32>::compute(&container).unwrap())
    });
}

fn benchmark_wall_plane(c: &mut Criterion) {
    bench_wall(c, "plane", Box::new(PlaneGeometry::new([50.0; 3], [-1.0, -1.0, -1.0])));
}

fn benchmark_wall_sphere(c: &mut Criterion) {
    bench_wall(c, "sphere", Box::new(SphereGeometry::new([50.0; 3], 40.0)));
}

fn benchmark_wall_cylinder(c: &mut Criterion) {
    bench_wall(c, "cylinder", Box::new(CylinderGeometry::new([50.0; 3], [0.0, 0.0, 1.0], 40.0)));
}

fn benchmark_wall_cone(c: &mut Criterion) {
    bench_wall(c, "cone", Box::new(ConeGeometry::new([50.0, 50.0, 100.0], [0.0, 0.0, -1.0], 0.4)));
}

criterion_group!(
    benches,
    benchmark_wall_plane,
    benchmark_wall_sphere,
    benchmark_wall_cylinder,
    benchmark_wall_cone
);
criterion_main!(benches);
