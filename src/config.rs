/// Minimum vector length (in geometry units) to be considered non-degenerate.
pub const VEC_LENGTH_THRESHOLD: f64 = 1e-12;
/// Relative tolerance for prism vertices to be considered coplanar.
pub const COPLANAR_TOLERANCE: f64 = 1e-6;
/// Minimum absolute determinant for a block basis to be considered non-coplanar.
pub const BASIS_DET_THRESHOLD: f64 = 1e-12;
/// Relative nudge applied to candidate cuts when partitioning the box tree.
pub const PARTITION_NUDGE: f64 = 1e-7;
/// Nodes holding this many objects or fewer are never partitioned.
pub const MAX_LEAF_OBJECTS: usize = 2;
/// Minimum value of `1 + cos` between adjacent edge normals when mitering a slanted prism.
pub const MITER_THRESHOLD: f64 = 1e-9;
