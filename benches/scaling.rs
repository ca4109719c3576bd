mod common;

use common::{Figure, Timing};
use criterion::{criterion_group, BenchmarkId, Criterion, Throughput};
use vorocore::{optimal_grid, random_points, BoundingBox, Container, ContainerKind, Lattice, PeriodicContainer, Tessellation};

const SIZES: [usize; 5] = [10, 100, 1000, 10_000, 100_000];
const METHODS: [&str; 4] = ["mono", "poly", "periodic", "triclinic"];

fn benchmark_scaling(c: &mut Criterion) {
    let bounds = BoundingBox::new([0.0; 3], [100.0; 3]);

    let mut group = c.benchmark_group("scaling");
    group.sample_size(10);

    for &size in &SIZES {
        let grid = optimal_grid(&bounds, size);
        let blocks = grid[0] * grid[1] * grid[2];
        println!(
            "N: {:7}, Grid: {:3}x{:3}x{:3}, Blocks: {:9}, Density: {:.3}",
            size,
            grid[0],
            grid[1],
            grid[2],
            blocks,
            size as f64 / blocks as f64
        );
        let points = random_points(&bounds, &[], size, size as u64);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("mono", size), &size, |b, _| {
            let mut container = Container::new(bounds, grid, [false; 3], ContainerKind::Mono).unwrap();
            for (i, &p) in points.iter().enumerate() {
                container.put(i as i32, p).unwrap();
            }
            b.iter(|| Tessellation::<()>::compute(&container).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("poly", size), &size, |b, _| {
            let mut container = Container::new(bounds, grid, [false; 3], ContainerKind::Poly).unwrap();
            for (i, &p) in points.iter().enumerate() {
                container.put_poly(i as i32, p, 0.1 * (i % 7) as f64).unwrap();
            }
            b.iter(|| Tessellation::<()>::compute(&container).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("periodic", size), &size, |b, _| {
            let mut container = Container::new(bounds, grid, [true; 3], ContainerKind::Mono).unwrap();
            for (i, &p) in points.iter().enumerate() {
                container.put(i as i32, p).unwrap();
            }
            b.iter(|| Tessellation::<i32>::compute(&container).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("triclinic", size), &size, |b, _| {
            let lattice = Lattice::new(100.0, 25.0, 100.0, 10.0, -20.0, 100.0);
            let mut container = PeriodicContainer::new(lattice, grid, ContainerKind::Mono).unwrap();
            for (i, &p) in points.iter().enumerate() {
                container.put(i as i32, p).unwrap();
            }
            container.create_all_images().unwrap();
            b.iter(|| Tessellation::<i32>::compute(&container).unwrap())
        });
    }
    group.finish();
}

/// Plots the cost per particle; linear scaling shows up as a flat line.
fn plot_scaling_results() -> Result<(), Box<dyn std::error::Error>> {
    let mut data = common::load("scaling", &METHODS, &SIZES)?;
    for timings in data.values_mut() {
        for t in timings.iter_mut() {
            // milliseconds per run to microseconds per particle
            let per = 1000.0 / t.input as f64;
            *t = Timing { input: t.input, mean: t.mean * per, lower: t.lower * per, upper: t.upper * per };
        }
    }
    let reference = data.get("mono").and_then(|t| t.last()).map(|last| {
        ("Linear", vec![(SIZES[0] as f64, last.mean), (SIZES[SIZES.len() - 1] as f64, last.mean)])
    });
    let figure = Figure {
        stem: "bench_scaling".to_string(),
        caption: "Tessellation cost per particle".to_string(),
        x_desc: "Number of particles (N)",
        y_desc: "Time per particle (µs)",
        reference,
    };
    common::plot(&figure, &data)
}

criterion_group!(benches, benchmark_scaling);

fn main() {
    benches();
    if let Err(e) = plot_scaling_results() {
        eprintln!("Error generating plot: {}", e);
    }
}
