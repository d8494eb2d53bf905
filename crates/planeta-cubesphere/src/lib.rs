//! Cube-sphere geometry: the six cube faces, face coordinates, cube-to-sphere
//! projection by normalization, and arc-length helpers.

mod arc;
mod cube_face;
mod face_coord;
mod projection;

pub use arc::{arc_between, chord_to_arc};
pub use cube_face::CubeFace;
pub use face_coord::FaceCoord;
pub use projection::{cube_to_sphere, face_coord_to_cube_point, face_coord_to_sphere};
