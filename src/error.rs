use thiserror::Error as ThisError;

/// Error type shared by every fallible operation of the crate.
///
/// The variants fall into three groups: resource ceilings that were hit while growing an
/// internal buffer, invalid input, and violated internal invariants of the cell graph.
/// An empty cell (every vertex cut away) is a regular outcome and never reported here.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum VoroError {
    /// A growable buffer would exceed its configured maximum
    #[error("memory ceiling reached for {what} (limit {limit})")]
    Memory { what: &'static str, limit: usize },
    /// A particle was inserted at (almost) the same position as an existing particle
    #[error("particle {id} at {position:?} coincides with particle {other}")]
    DuplicateParticle {
        id: i32,
        other: i32,
        position: [f64; 3],
    },
    /// The lower bound of a domain axis is not below its upper bound
    #[error("invalid bounds on axis {axis}: min {min} must be below max {max}")]
    InvalidBounds { axis: usize, min: f64, max: f64 },
    /// The block grid or lattice parameters cannot describe a domain
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    /// A particle record could not be read
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    /// A particle lies outside a non-periodic domain
    #[error("particle {id} at {position:?} lies outside the domain")]
    OutsideDomain { id: i32, position: [f64; 3] },
    /// The vertex graph of a cell or the block search reached an impossible state
    #[error("internal error: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, VoroError>;
