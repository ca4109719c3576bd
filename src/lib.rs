//! # vorocore
//!
//! `vorocore` computes 3D Voronoi and radical (power) tessellations of particle sets, one
//! cell at a time. Every cell is built by cutting an initial polyhedron with the bisecting
//! planes of nearby particles; a block grid and precomputed visiting orders keep the
//! neighbor search local and stop it as soon as no remaining particle can reach the cell.
//!
//! ## Features
//!
//! - **Exact cell topology**: Cells are vertex/edge graphs with per-face neighbor ids, robust
//!   to coplanar and degenerate cuts.
//! - **Domains**: Rectangular boxes, periodic or not per axis ([`Container`]), and fully
//!   periodic triclinic cells ([`PeriodicContainer`]).
//! - **Radical tessellation**: Particles with radii ([`ContainerKind::Poly`]).
//! - **Walls**: Clip cells against planes, spheres, cylinders, cones or custom geometries.
//! - **Parallel**: [`Tessellation::compute`] spreads the cells over a `rayon` pool.
//! - **Output**: Format-string rendering of per-cell statistics ([`format::render`]).
//!
//! ## Example
//!
//! ```
//! use vorocore::{BoundingBox, Container, ContainerKind, Tessellation};
//!
//! let bounds = BoundingBox::new([0.0; 3], [1.0; 3]);
//! let mut container = Container::new(bounds, [2, 2, 2], [false; 3], ContainerKind::Mono).unwrap();
//! container.put(0, [0.25, 0.5, 0.5]).unwrap();
//! container.put(1, [0.75, 0.5, 0.5]).unwrap();
//!
//! let tessellation = Tessellation::<i32>::compute(&container).unwrap();
//! assert!((tessellation.total_volume() - 1.0).abs() < 1e-12);
//! assert!(tessellation.cells[0].cell.neighbors().contains(&1));
//! ```

pub mod bounds;
pub mod cell;
pub mod compute;
pub mod config;
pub mod container;
pub mod error;
pub mod format;
pub mod radius;
pub mod tessellation;
pub mod wall;
pub mod worklist;

pub use bounds::{box_side, BoundingBox};
pub use cell::{Cell, FaceTag, NeighborCell, VoronoiCell};
pub use compute::SearchContext;
pub use config::{grid_from_length_scale, optimal_grid, Config};
pub use container::periodic::{Lattice, GHOST_SELF_ID};
pub use container::{Container, ContainerKind, Particle, PeriodicContainer};
pub use error::{Result, VoroError};
pub use radius::{Mono, Poly, RadiusPolicy};
pub use tessellation::{random_points, CellReport, ParticleContainer, Tessellation};
pub use wall::geometries::{ConeGeometry, CylinderGeometry, PlaneGeometry, SphereGeometry};
pub use wall::{Wall, WallGeometry, WALL_ID_START};
