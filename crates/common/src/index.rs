use serde::{Deserialize, Serialize};

/// Integer triple addressing one cell of a dense grid or, after chunk-level
/// scaling, one chunk of a dynamic spatially hashed grid.
///
/// Equality is component-wise. The lexicographic ordering exists so indices
/// can serve as deterministic map keys; it carries no spatial meaning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GridIndex {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl GridIndex {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}
