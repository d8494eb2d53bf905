//! Precomputed index lists for every combination of coarser neighbors.
//!
//! The grid is tiled with 2x2-cell blocks, each triangulated as a fan of
//! eight triangles around its center vertex. Along an edge whose neighbor is
//! one level coarser, the two triangles touching that edge collapse into one,
//! skipping the odd edge vertex so the edge matches the neighbor's spacing.

use crate::node_id::Direction;

/// 4-bit set of edges that must stitch to a coarser neighbor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FanMask(u8);

impl FanMask {
    pub const NONE: FanMask = FanMask(0);
    /// The -x edge.
    pub const LEFT: FanMask = FanMask(1);
    /// The +z edge.
    pub const UP: FanMask = FanMask(2);
    /// The +x edge.
    pub const RIGHT: FanMask = FanMask(4);
    /// The -z edge.
    pub const DOWN: FanMask = FanMask(8);
    pub const ALL: FanMask = FanMask(15);

    /// Build a mask from its low four bits.
    pub fn from_bits(bits: u8) -> FanMask {
        FanMask(bits & 15)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// The single-edge mask for `direction`.
    pub fn edge(direction: Direction) -> FanMask {
        match direction {
            Direction::Left => Self::LEFT,
            Direction::Up => Self::UP,
            Direction::Right => Self::RIGHT,
            Direction::Down => Self::DOWN,
        }
    }

    pub fn contains(self, other: FanMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, direction: Direction) -> FanMask {
        FanMask(self.0 | Self::edge(direction).0)
    }
}

/// Ring around a block center, in grid steps, wound so that every
/// `(center, ring[k], ring[k + 1])` triangle faces +y. Each side of the block
/// is three consecutive entries: corner, midpoint, corner.
const RING: [(Direction, [(i32, i32); 3]); 4] = [
    (Direction::Up, [(-1, 1), (0, 1), (1, 1)]),
    (Direction::Right, [(1, 1), (1, 0), (1, -1)]),
    (Direction::Down, [(1, -1), (0, -1), (-1, -1)]),
    (Direction::Left, [(-1, -1), (-1, 0), (-1, 1)]),
];

/// The 16 index lists for one grid resolution.
///
/// Built once and shared read-only by every node and worker.
#[derive(Debug)]
pub struct TriangleFanCache {
    resolution: u32,
    lists: Vec<Vec<u16>>,
}

impl TriangleFanCache {
    /// Build all 16 lists for a grid of `resolution` cells per edge.
    ///
    /// `resolution` must be even and small enough for 16-bit indices; a
    /// validated [`LodSettings`](crate::LodSettings) guarantees both.
    pub fn new(resolution: u32) -> Self {
        debug_assert!(resolution >= 2 && resolution % 2 == 0);
        debug_assert!((resolution as usize + 1).pow(2) <= usize::from(u16::MAX) + 1);
        let lists = (0..16u8)
            .map(|bits| build_indices(resolution, FanMask::from_bits(bits)))
            .collect();
        Self { resolution, lists }
    }

    /// Index list for `mask`.
    pub fn indices(&self, mask: FanMask) -> &[u16] {
        &self.lists[usize::from(mask.bits())]
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Vertices per node mesh, `(resolution + 1)^2`.
    pub fn vertex_count(&self) -> usize {
        let side = self.resolution as usize + 1;
        side * side
    }
}

fn build_indices(resolution: u32, mask: FanMask) -> Vec<u16> {
    let g = resolution as i32;
    let side = g + 1;
    let blocks = g / 2;
    let index = |x: i32, z: i32| (z * side + x) as u16;

    let mut out = Vec::with_capacity((blocks * blocks * 8 * 3) as usize);
    for bz in 0..blocks {
        for bx in 0..blocks {
            let (cx, cz) = (bx * 2 + 1, bz * 2 + 1);
            let center = index(cx, cz);
            for (direction, [a, mid, b]) in RING {
                let on_edge = match direction {
                    Direction::Left => bx == 0,
                    Direction::Right => bx == blocks - 1,
                    Direction::Down => bz == 0,
                    Direction::Up => bz == blocks - 1,
                };
                let a = index(cx + a.0, cz + a.1);
                let b = index(cx + b.0, cz + b.1);
                if on_edge && mask.contains(FanMask::edge(direction)) {
                    out.extend_from_slice(&[center, a, b]);
                } else {
                    let mid = index(cx + mid.0, cz + mid.1);
                    out.extend_from_slice(&[center, a, mid, center, mid, b]);
                }
            }
        }
    }
    out
}
