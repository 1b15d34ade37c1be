use crate::GridIndex;

/// Errors from sizing construction and cell addressing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error(
        "invalid grid sizes: cell_size={cell_size}, extents=({x_size}, {y_size}, {z_size}); \
         all must be finite and positive"
    )]
    InvalidSizes {
        cell_size: f64,
        x_size: f64,
        y_size: f64,
        z_size: f64,
    },
    #[error("index {index:?} outside grid of {num_x}x{num_y}x{num_z} cells")]
    OutOfBounds {
        index: GridIndex,
        num_x: i64,
        num_y: i64,
        num_z: i64,
    },
    #[error("location ({x}, {y}, {z}) cannot be resolved to a cell")]
    InvalidLocation { x: f64, y: f64, z: f64 },
}
