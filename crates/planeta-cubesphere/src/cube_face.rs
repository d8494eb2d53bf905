//! The six faces of a cubesphere and their orientation bases.

use glam::{DMat3, DVec3};

/// A face of the cube that is projected onto the sphere, named after the
/// axis its outward normal points along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

/// Per-face `(right, normal, forward)`, indexed by [`CubeFace::index`].
///
/// Every triple is right-handed in the sense `right x normal = forward`.
const BASES: [[DVec3; 3]; 6] = [
    [DVec3::Y, DVec3::X, DVec3::NEG_Z],
    [DVec3::Y, DVec3::NEG_X, DVec3::Z],
    [DVec3::NEG_Z, DVec3::Y, DVec3::X],
    [DVec3::Z, DVec3::NEG_Y, DVec3::X],
    [DVec3::Y, DVec3::Z, DVec3::X],
    [DVec3::Y, DVec3::NEG_Z, DVec3::NEG_X],
];

impl CubeFace {
    /// Root order of a forest.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Outward unit normal.
    #[inline]
    #[must_use]
    pub fn normal(self) -> DVec3 {
        BASES[self.index()][1]
    }

    /// Direction of a node grid's +X axis.
    #[inline]
    #[must_use]
    pub fn right(self) -> DVec3 {
        BASES[self.index()][0]
    }

    /// Direction of a node grid's +Z axis.
    #[inline]
    #[must_use]
    pub fn forward(self) -> DVec3 {
        BASES[self.index()][2]
    }

    /// Rotation taking node-local axes onto the face.
    ///
    /// Columns are `(right, normal, forward)`, so local +Y points out of the
    /// cube and node meshes are built flat in the XZ plane.
    #[must_use]
    pub fn orientation(self) -> DMat3 {
        let [right, normal, forward] = BASES[self.index()];
        DMat3::from_cols(right, normal, forward)
    }
}
