use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::{GridError, GridIndex};

/// Immutable sizing descriptor: cell resolution plus per-axis physical extents.
///
/// Cell counts are derived as `ceil(extent / cell_size)` and are always at
/// least 1. The grid frame is centered on the realized volume
/// (`count * cell_size` per axis), so cell centers run symmetrically about
/// zero along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSizes {
    cell_size: f64,
    x_size: f64,
    y_size: f64,
    z_size: f64,
    num_x_cells: i64,
    num_y_cells: i64,
    num_z_cells: i64,
}

impl GridSizes {
    /// Validate resolution and extents and derive the cell counts.
    ///
    /// Fails with [`GridError::InvalidSizes`] when the cell size or any
    /// extent is non-finite or not strictly positive.
    pub fn new(cell_size: f64, x_size: f64, y_size: f64, z_size: f64) -> Result<Self, GridError> {
        let all_valid = [cell_size, x_size, y_size, z_size]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !all_valid {
            return Err(GridError::InvalidSizes {
                cell_size,
                x_size,
                y_size,
                z_size,
            });
        }
        let num_x_cells = (x_size / cell_size).ceil() as i64;
        let num_y_cells = (y_size / cell_size).ceil() as i64;
        let num_z_cells = (z_size / cell_size).ceil() as i64;
        // The total cell count must stay representable; a descriptor whose
        // product overflows cannot back a real grid.
        if num_x_cells
            .checked_mul(num_y_cells)
            .and_then(|v| v.checked_mul(num_z_cells))
            .is_none()
        {
            return Err(GridError::InvalidSizes {
                cell_size,
                x_size,
                y_size,
                z_size,
            });
        }
        Ok(Self {
            cell_size,
            x_size,
            y_size,
            z_size,
            num_x_cells,
            num_y_cells,
            num_z_cells,
        })
    }

    /// Edge length of one cubic cell.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Requested physical extent along the X axis.
    pub fn x_size(&self) -> f64 {
        self.x_size
    }

    /// Requested physical extent along the Y axis.
    pub fn y_size(&self) -> f64 {
        self.y_size
    }

    /// Requested physical extent along the Z axis.
    pub fn z_size(&self) -> f64 {
        self.z_size
    }

    pub fn num_x_cells(&self) -> i64 {
        self.num_x_cells
    }

    pub fn num_y_cells(&self) -> i64 {
        self.num_y_cells
    }

    pub fn num_z_cells(&self) -> i64 {
        self.num_z_cells
    }

    /// Total number of cells in the described volume.
    pub fn total_cells(&self) -> i64 {
        self.num_x_cells * self.num_y_cells * self.num_z_cells
    }

    /// Realized per-axis extents, `count * cell_size`.
    ///
    /// This is the physical footprint the grid actually covers; the dynamic
    /// grid tiles space with blocks of exactly this size.
    pub fn realized_extents(&self) -> DVec3 {
        DVec3::new(
            self.num_x_cells as f64 * self.cell_size,
            self.num_y_cells as f64 * self.cell_size,
            self.num_z_cells as f64 * self.cell_size,
        )
    }

    /// Corner of the grid frame (most negative cell corner).
    fn origin(&self) -> DVec3 {
        -0.5 * self.realized_extents()
    }

    /// Whether an index addresses a cell inside the derived counts.
    pub fn index_in_bounds(&self, index: &GridIndex) -> bool {
        index.x >= 0
            && index.x < self.num_x_cells
            && index.y >= 0
            && index.y < self.num_y_cells
            && index.z >= 0
            && index.z < self.num_z_cells
    }

    /// Bounds-check an index, producing the full error on failure.
    pub fn check_index(&self, index: &GridIndex) -> Result<(), GridError> {
        if self.index_in_bounds(index) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                index: *index,
                num_x: self.num_x_cells,
                num_y: self.num_y_cells,
                num_z: self.num_z_cells,
            })
        }
    }

    /// Resolve a location given as per-axis scalars to a cell index.
    ///
    /// Per axis: `floor((coordinate - origin) / cell_size)`. The result is
    /// not bounds-checked; callers that require an in-bounds cell apply
    /// [`GridSizes::check_index`]. Non-finite coordinates fail with
    /// [`GridError::InvalidLocation`].
    pub fn index_from_location(&self, x: f64, y: f64, z: f64) -> Result<GridIndex, GridError> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(GridError::InvalidLocation { x, y, z });
        }
        let origin = self.origin();
        Ok(GridIndex::new(
            ((x - origin.x) / self.cell_size).floor() as i64,
            ((y - origin.y) / self.cell_size).floor() as i64,
            ((z - origin.z) / self.cell_size).floor() as i64,
        ))
    }

    /// Resolve a 3-component location to a cell index.
    pub fn index_from_location3(&self, location: DVec3) -> Result<GridIndex, GridError> {
        self.index_from_location(location.x, location.y, location.z)
    }

    /// Resolve a 4-component homogeneous location to a cell index.
    ///
    /// The scale component must be exactly 1.0 (a point); anything else is
    /// rejected, since direction vectors do not address cells.
    pub fn index_from_location4(&self, location: DVec4) -> Result<GridIndex, GridError> {
        if location.w != 1.0 {
            return Err(GridError::InvalidLocation {
                x: location.x,
                y: location.y,
                z: location.z,
            });
        }
        self.index_from_location(location.x, location.y, location.z)
    }

    /// The center of the addressed cell as a homogeneous point (`w == 1.0`).
    pub fn location_from_index(&self, index: &GridIndex) -> DVec4 {
        let origin = self.origin();
        DVec4::new(
            origin.x + (index.x as f64 + 0.5) * self.cell_size,
            origin.y + (index.y as f64 + 0.5) * self.cell_size,
            origin.z + (index.z as f64 + 0.5) * self.cell_size,
            1.0,
        )
    }
}
