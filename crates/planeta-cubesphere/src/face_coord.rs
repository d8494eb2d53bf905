//! Parametric position on one cube face.

use crate::CubeFace;

/// A point on `face` in unit face parameters.
///
/// `u` grows along [`CubeFace::right`] and `v` along [`CubeFace::forward`];
/// `(0.5, 0.5)` is the face center. Node lattices use dyadic fractions
/// here, which keeps every projection step exact up to normalization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceCoord {
    pub face: CubeFace,
    pub u: f64,
    pub v: f64,
}

impl FaceCoord {
    /// Clamps `u` and `v` into \[0, 1\].
    #[must_use]
    pub fn new(face: CubeFace, u: f64, v: f64) -> Self {
        Self {
            face,
            u: u.clamp(0.0, 1.0),
            v: v.clamp(0.0, 1.0),
        }
    }

    /// Keeps `u` and `v` as given. Normal-estimation samples step one cell
    /// past a node edge, which may leave the face.
    #[must_use]
    pub fn new_unchecked(face: CubeFace, u: f64, v: f64) -> Self {
        Self { face, u, v }
    }

    #[must_use]
    pub fn center(face: CubeFace) -> Self {
        Self { face, u: 0.5, v: 0.5 }
    }
}
