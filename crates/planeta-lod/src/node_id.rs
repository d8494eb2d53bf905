//! Path-encoded quadtree node identifiers and neighbor lookup.
//!
//! A [`NodeId`] stores the path from the face root as base-4 digits behind a
//! leading sentinel bit: the root is `1`, and a child is `parent * 4 + sibling`.
//! Sibling indices lay out a node's quadrants as seen from above the face:
//!
//! ```text
//!   +z
//!  | 0 | 1 |
//!  | 2 | 3 |   -> +x
//! ```

use planeta_cubesphere::CubeFace;

/// One of the four in-face grid directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward -x.
    Left,
    /// Toward +z.
    Up,
    /// Toward +x.
    Right,
    /// Toward -z.
    Down,
}

impl Direction {
    /// All four directions, in fan-mask bit order.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Up,
        Direction::Right,
        Direction::Down,
    ];

    /// The direction pointing the other way.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
        }
    }

    /// Cell offset `(dx, dz)` of a one-step move.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
        }
    }
}

/// Identity of a node within one face quadtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// The face root.
    pub const ROOT: NodeId = NodeId(1);

    /// Deepest level representable in 64 bits.
    pub const MAX_DEPTH: u32 = 30;

    /// Rebuild an id from its raw encoding.
    ///
    /// Returns `None` unless the sentinel bit sits at an even position.
    pub fn from_raw(raw: u64) -> Option<NodeId> {
        if raw == 0 {
            return None;
        }
        let top_bit = 63 - raw.leading_zeros();
        (top_bit % 2 == 0 && top_bit / 2 <= Self::MAX_DEPTH).then_some(NodeId(raw))
    }

    /// The raw path encoding.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Depth below the face root (root = 0).
    pub fn depth(self) -> u32 {
        (63 - self.0.leading_zeros()) / 2
    }

    pub fn is_root(self) -> bool {
        self.0 == 1
    }

    /// The child in quadrant `sibling` (0..4).
    ///
    /// Returns `None` past [`MAX_DEPTH`](Self::MAX_DEPTH).
    pub fn child(self, sibling: u8) -> Option<NodeId> {
        debug_assert!(sibling < 4, "sibling index {sibling} out of range");
        if self.depth() >= Self::MAX_DEPTH {
            return None;
        }
        Some(NodeId(self.0 << 2 | u64::from(sibling & 3)))
    }

    /// The four children in sibling order.
    pub fn children(self) -> Option<[NodeId; 4]> {
        Some([self.child(0)?, self.child(1)?, self.child(2)?, self.child(3)?])
    }

    pub fn parent(self) -> Option<NodeId> {
        (!self.is_root()).then(|| NodeId(self.0 >> 2))
    }

    /// Quadrant of this node within its parent, `None` for the root.
    pub fn sibling_index(self) -> Option<u8> {
        (!self.is_root()).then(|| (self.0 & 3) as u8)
    }

    /// Ancestor at `depth`, or `self` when `depth` is at or below this node.
    pub fn ancestor_at(self, depth: u32) -> NodeId {
        let own = self.depth();
        if depth >= own {
            self
        } else {
            NodeId(self.0 >> (2 * (own - depth)))
        }
    }

    /// Sibling digits from the root down to this node.
    pub fn path(self) -> impl Iterator<Item = u8> {
        let depth = self.depth();
        let raw = self.0;
        (0..depth).rev().map(move |level| ((raw >> (2 * level)) & 3) as u8)
    }

    /// Integer cell coordinates `(i, j)` of this node among the
    /// `2^depth x 2^depth` nodes of its level; `i` grows along +x, `j` along +z.
    pub fn cell(self) -> (u64, u64) {
        self.path().fold((0, 0), |(i, j), sibling| {
            let right = u64::from(sibling & 1);
            let top = u64::from(1 - (sibling >> 1));
            (i << 1 | right, j << 1 | top)
        })
    }

    /// The same-level node adjacent in `direction`, within the same face.
    ///
    /// Walks up the path: a quadrant whose neighbor is a sibling resolves
    /// locally; otherwise the parent's neighbor in the same direction is found
    /// first and its mirrored child is returned. Returns `None` when the
    /// neighbor would lie across a cube edge.
    pub fn neighbor(self, direction: Direction) -> Option<NodeId> {
        let sibling = self.sibling_index()?;
        let parent = self.parent()?;
        let (target, crosses_parent) = match direction {
            Direction::Left => (sibling ^ 1, sibling & 1 == 0),
            Direction::Right => (sibling ^ 1, sibling & 1 == 1),
            Direction::Up => (sibling ^ 2, sibling >> 1 == 0),
            Direction::Down => (sibling ^ 2, sibling >> 1 == 1),
        };
        if crosses_parent {
            parent.neighbor(direction)?.child(target)
        } else {
            parent.child(target)
        }
    }
}

/// A node's identity across the whole planet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub face: CubeFace,
    pub id: NodeId,
}

impl NodeKey {
    pub fn new(face: CubeFace, id: NodeId) -> Self {
        Self { face, id }
    }

    /// The root of `face`.
    pub fn root(face: CubeFace) -> Self {
        Self::new(face, NodeId::ROOT)
    }

    pub fn depth(self) -> u32 {
        self.id.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_at_cell(depth: u32, i: u64, j: u64) -> NodeId {
        let mut id = NodeId::ROOT;
        for level in (0..depth).rev() {
            let right = (i >> level) & 1;
            let top = (j >> level) & 1;
            let sibling = (right | (1 - top) << 1) as u8;
            id = id.child(sibling).unwrap();
        }
        id
    }

    #[test]
    fn test_root_properties() {
        assert_eq!(NodeId::ROOT.depth(), 0);
        assert!(NodeId::ROOT.is_root());
        assert_eq!(NodeId::ROOT.parent(), None);
        assert_eq!(NodeId::ROOT.sibling_index(), None);
        assert_eq!(NodeId::ROOT.cell(), (0, 0));
        for dir in Direction::ALL {
            assert_eq!(NodeId::ROOT.neighbor(dir), None);
        }
    }

    #[test]
    fn test_child_parent_round_trip() {
        let id = NodeId::ROOT.child(2).unwrap().child(1).unwrap().child(3).unwrap();
        assert_eq!(id.depth(), 3);
        assert_eq!(id.sibling_index(), Some(3));
        assert_eq!(id.path().collect::<Vec<_>>(), vec![2, 1, 3]);
        assert_eq!(id.parent().unwrap().sibling_index(), Some(1));
        assert_eq!(id.ancestor_at(1), NodeId::ROOT.child(2).unwrap());
        assert_eq!(id.ancestor_at(5), id);
        assert_eq!(NodeId::from_raw(id.raw()), Some(id));
    }

    #[test]
    fn test_from_raw_rejects_odd_sentinel() {
        assert_eq!(NodeId::from_raw(0), None);
        assert_eq!(NodeId::from_raw(2), None);
        assert_eq!(NodeId::from_raw(0b1000), None);
        assert!(NodeId::from_raw(0b100).is_some());
    }

    #[test]
    fn test_max_depth_stops_subdivision() {
        let mut id = NodeId::ROOT;
        for _ in 0..NodeId::MAX_DEPTH {
            id = id.child(0).unwrap();
        }
        assert_eq!(id.depth(), NodeId::MAX_DEPTH);
        assert_eq!(id.child(0), None);
        assert_eq!(id.children(), None);
    }

    #[test]
    fn test_sibling_quadrant_layout() {
        let cells: Vec<(u64, u64)> = NodeId::ROOT
            .children()
            .unwrap()
            .iter()
            .map(|c| c.cell())
            .collect();
        assert_eq!(cells, vec![(0, 1), (1, 1), (0, 0), (1, 0)]);
    }

    #[test]
    fn test_neighbor_walk_matches_cell_arithmetic() {
        let depth = 4;
        let n = 1_i64 << depth;
        for i in 0..n {
            for j in 0..n {
                let id = id_at_cell(depth, i as u64, j as u64);
                assert_eq!(id.cell(), (i as u64, j as u64));
                for dir in Direction::ALL {
                    let (dx, dz) = dir.offset();
                    let (ni, nj) = (i + dx, j + dz);
                    let expected = (ni >= 0 && nj >= 0 && ni < n && nj < n)
                        .then(|| id_at_cell(depth, ni as u64, nj as u64));
                    assert_eq!(
                        id.neighbor(dir),
                        expected,
                        "neighbor {dir:?} of cell ({i}, {j}) is wrong"
                    );
                }
            }
        }
    }

    #[test]
    fn test_neighbor_is_symmetric() {
        let id = id_at_cell(3, 5, 2);
        for dir in Direction::ALL {
            let other = id.neighbor(dir).unwrap();
            assert_eq!(other.neighbor(dir.opposite()), Some(id));
        }
    }
}
