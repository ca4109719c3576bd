use crate::error::{Result, VoroError};

/// Axis-aligned box in N-dimensional space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    /// Checks that every axis has a positive extent.
    pub fn validate(&self) -> Result<()> {
        for axis in 0..D {
            if !(self.min[axis] < self.max[axis]) {
                return Err(VoroError::InvalidBounds {
                    axis,
                    min: self.min[axis],
                    max: self.max[axis],
                });
            }
        }
        Ok(())
    }

    pub fn extent(&self) -> [f64; D] {
        let mut e = [0.0; D];
        for axis in 0..D {
            e[axis] = self.max[axis] - self.min[axis];
        }
        e
    }

    pub fn volume(&self) -> f64 {
        self.extent().iter().product()
    }

    /// Half-open containment test, `min <= p < max` on every axis.
    pub fn contains(&self, point: &[f64; D]) -> bool {
        (0..D).all(|axis| point[axis] >= self.min[axis] && point[axis] < self.max[axis])
    }
}

/// Calculates the face id reported for a side of the domain box.
///
/// The ids start at -1 and decrease.
/// - Axis 0 (X) Min: -1
/// - Axis 0 (X) Max: -2
/// - Axis 1 (Y) Min: -3
/// - Axis 1 (Y) Max: -4
/// - Axis 2 (Z) Min: -5
/// - Axis 2 (Z) Max: -6
pub fn box_side(axis: usize, is_max: bool) -> i32 {
    -1 - (axis * 2 + if is_max { 1 } else { 0 }) as i32
}
