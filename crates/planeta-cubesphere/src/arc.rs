//! Chordal and great-circle distances on a sphere.

use glam::DVec3;

/// Convert a chordal (straight-line) distance to the arc length along a
/// sphere of the given radius.
///
/// Chords longer than the diameter are clamped to half the circumference.
#[inline]
#[must_use]
pub fn chord_to_arc(chord: f64, radius: f64) -> f64 {
    let half = (chord / (2.0 * radius)).clamp(-1.0, 1.0);
    2.0 * half.asin() * radius
}

/// Great-circle distance between two unit directions on a sphere of the
/// given radius.
#[inline]
#[must_use]
pub fn arc_between(dir_a: DVec3, dir_b: DVec3, radius: f64) -> f64 {
    chord_to_arc(((dir_a - dir_b) * radius).length(), radius)
}
