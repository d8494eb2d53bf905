//! Height/attribute fields sampled by the terrain mesher.
//!
//! A field is a pure function of a unit direction from the body center. It
//! returns the radial distance of the surface along that direction plus a
//! pair of surface attributes (temperature and humidity for [`NoiseField`]).

mod fbm;
mod field;
mod noise_field;

pub use fbm::{FbmParams, FbmSampler};
pub use field::{HeightField, SphereField, SurfaceSample};
pub use noise_field::{NoiseField, NoiseFieldParams};
