//! Scripted descent from orbit to low altitude.

use glam::{DMat4, DQuat, DVec3};
use planeta_config::CameraConfig;
use planeta_cubesphere::{CubeFace, FaceCoord, face_coord_to_sphere};
use planeta_lod::ScaleSpace;

/// Simulated frame time.
pub const FRAME_DT: f64 = 1.0 / 60.0;

const ASPECT: f64 = 16.0 / 9.0;

/// A camera sweeping down toward the surface while drifting sideways.
///
/// Altitude falls geometrically from `start_altitude` to `end_altitude`
/// over `frames` frames, so every LOD level gets roughly equal screen time.
#[derive(Clone, Debug)]
pub struct FlightPath {
    radius: f64,
    start_altitude: f64,
    end_altitude: f64,
    frames: u32,
    speed: f64,
    start_direction: DVec3,
    drift_axis: DVec3,
}

/// Camera state for one frame, in body-centered coordinates.
#[derive(Clone, Copy, Debug)]
pub struct CameraPose {
    pub position: DVec3,
    pub forward: DVec3,
    pub up: DVec3,
    pub altitude: f64,
}

impl FlightPath {
    pub fn new(radius: f64, terrain_height: f64, camera: &CameraConfig, frames: u32) -> Self {
        let start_direction = face_coord_to_sphere(&FaceCoord::new(CubeFace::PosY, 0.35, 0.6));
        let drift_axis = start_direction.cross(DVec3::X).normalize();
        Self {
            radius,
            start_altitude: camera.start_altitude_m.max(1.0),
            end_altitude: (terrain_height * 1.5).max(10.0),
            frames: frames.max(1),
            speed: camera.speed_m_s,
            start_direction,
            drift_axis,
        }
    }

    pub fn pose(&self, frame: u32) -> CameraPose {
        let t = (frame.min(self.frames) as f64) / self.frames as f64;
        let ratio = self.end_altitude / self.start_altitude;
        let altitude = self.start_altitude * ratio.powf(t);

        let travelled = self.speed * FRAME_DT * frame as f64;
        let angle = travelled / self.radius;
        let direction = DQuat::from_axis_angle(self.drift_axis, angle) * self.start_direction;

        let position = direction * (self.radius + altitude);
        let tangent = self.drift_axis.cross(direction).normalize();
        // Look ahead and down; steeper from orbit, grazing near the ground.
        let pitch = 0.25 + 1.2 * (1.0 - t);
        let forward = (tangent * pitch.cos() - direction * pitch.sin()).normalize();
        CameraPose {
            position,
            forward,
            up: direction,
            altitude,
        }
    }
}

impl CameraPose {
    /// Camera-relative view-projection (the eye sits at the origin).
    pub fn view_projection(&self, camera: &CameraConfig) -> DMat4 {
        let near = (self.altitude * 0.01).clamp(0.1, 1000.0);
        let projection =
            DMat4::perspective_rh(camera.fov_y_deg.to_radians(), ASPECT, near, camera.far_plane_m);
        let view = DMat4::look_to_rh(DVec3::ZERO, self.forward, self.up);
        projection * view
    }
}

pub fn scale_space(camera: &CameraConfig) -> ScaleSpace {
    ScaleSpace::for_camera(camera.far_plane_m, camera.fov_y_deg.to_radians())
}
