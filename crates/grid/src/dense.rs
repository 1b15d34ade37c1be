use glam::{DVec3, DVec4};
use voxelspace_common::{GridError, GridIndex, GridSizes};
use voxelspace_serialize::{Deserialized, SerializeError, deserialize_pod, serialize_pod};

/// Dense fixed-extent voxel grid: one `T` per cell in a flat array.
///
/// Cells are stored with the Z axis varying fastest, so iterating `x`, then
/// `y`, then `z` walks the array front to back. The array length always
/// equals the cell count derived from the sizes; neither changes after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid<T: Clone> {
    sizes: GridSizes,
    default_value: T,
    data: Vec<T>,
}

impl<T: Clone> VoxelGrid<T> {
    /// Build a grid with every cell initialized to the default value.
    ///
    /// `sizes` was validated at its own construction, so this cannot fail.
    pub fn new(sizes: GridSizes, default_value: T) -> Self {
        let data = vec![default_value.clone(); sizes.total_cells() as usize];
        Self {
            sizes,
            default_value,
            data,
        }
    }

    pub fn sizes(&self) -> &GridSizes {
        &self.sizes
    }

    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    pub fn num_x_cells(&self) -> i64 {
        self.sizes.num_x_cells()
    }

    pub fn num_y_cells(&self) -> i64 {
        self.sizes.num_y_cells()
    }

    pub fn num_z_cells(&self) -> i64 {
        self.sizes.num_z_cells()
    }

    /// Flat offset of an in-bounds index. Callers bounds-check first.
    fn data_index(&self, index: &GridIndex) -> usize {
        ((index.x * self.sizes.num_y_cells() + index.y) * self.sizes.num_z_cells() + index.z)
            as usize
    }

    /// Read the cell addressed by `index`.
    pub fn get(&self, index: &GridIndex) -> Result<&T, GridError> {
        self.sizes.check_index(index)?;
        Ok(&self.data[self.data_index(index)])
    }

    /// Read the cell containing the location given as per-axis scalars.
    pub fn get_at(&self, x: f64, y: f64, z: f64) -> Result<&T, GridError> {
        let index = self.sizes.index_from_location(x, y, z)?;
        self.get(&index)
    }

    /// Read the cell containing a 3-component location.
    pub fn get_at3(&self, location: DVec3) -> Result<&T, GridError> {
        let index = self.sizes.index_from_location3(location)?;
        self.get(&index)
    }

    /// Read the cell containing a 4-component homogeneous location.
    pub fn get_at4(&self, location: DVec4) -> Result<&T, GridError> {
        let index = self.sizes.index_from_location4(location)?;
        self.get(&index)
    }

    /// Overwrite the cell addressed by `index`.
    ///
    /// Bounds are checked before any write, so a failed call leaves the grid
    /// unchanged.
    pub fn set_value(&mut self, index: &GridIndex, value: T) -> Result<(), GridError> {
        self.sizes.check_index(index)?;
        let data_index = self.data_index(index);
        self.data[data_index] = value;
        Ok(())
    }

    /// Overwrite the cell containing the location given as per-axis scalars.
    pub fn set_value_at(&mut self, x: f64, y: f64, z: f64, value: T) -> Result<(), GridError> {
        let index = self.sizes.index_from_location(x, y, z)?;
        self.set_value(&index, value)
    }

    /// Overwrite the cell containing a 3-component location.
    pub fn set_value_at3(&mut self, location: DVec3, value: T) -> Result<(), GridError> {
        let index = self.sizes.index_from_location3(location)?;
        self.set_value(&index, value)
    }

    /// Overwrite the cell containing a 4-component homogeneous location.
    pub fn set_value_at4(&mut self, location: DVec4, value: T) -> Result<(), GridError> {
        let index = self.sizes.index_from_location4(location)?;
        self.set_value(&index, value)
    }

    /// Convert a per-axis scalar location to a cell index (unchecked bounds).
    pub fn location_to_grid_index(&self, x: f64, y: f64, z: f64) -> Result<GridIndex, GridError> {
        self.sizes.index_from_location(x, y, z)
    }

    /// Convert a 3-component location to a cell index (unchecked bounds).
    pub fn location_to_grid_index3(&self, location: DVec3) -> Result<GridIndex, GridError> {
        self.sizes.index_from_location3(location)
    }

    /// Convert a 4-component homogeneous location to a cell index (unchecked bounds).
    pub fn location_to_grid_index4(&self, location: DVec4) -> Result<GridIndex, GridError> {
        self.sizes.index_from_location4(location)
    }

    /// The center of the addressed cell as a homogeneous point (`w == 1.0`).
    pub fn grid_index_to_location(&self, index: &GridIndex) -> DVec4 {
        self.sizes.location_from_index(index)
    }

    /// Append the grid to `buffer` using the caller's value encoder.
    ///
    /// Layout: cell size and extents (4 x f64), derived cell counts
    /// (3 x i64, redundant but validated on read), the default value, then
    /// every cell in flat iteration order. Returns bytes written.
    pub fn serialize<F>(&self, buffer: &mut Vec<u8>, value_serializer: &F) -> usize
    where
        F: Fn(&T, &mut Vec<u8>) -> usize,
    {
        let start = buffer.len();
        serialize_pod(&self.sizes.cell_size(), buffer);
        serialize_pod(&self.sizes.x_size(), buffer);
        serialize_pod(&self.sizes.y_size(), buffer);
        serialize_pod(&self.sizes.z_size(), buffer);
        serialize_pod(&self.sizes.num_x_cells(), buffer);
        serialize_pod(&self.sizes.num_y_cells(), buffer);
        serialize_pod(&self.sizes.num_z_cells(), buffer);
        value_serializer(&self.default_value, buffer);
        for value in &self.data {
            value_serializer(value, buffer);
        }
        buffer.len() - start
    }

    /// Reconstruct a grid from `buffer` starting at `starting_offset`.
    ///
    /// Returns the grid and the number of bytes consumed, so multiple
    /// objects packed in one buffer can be decoded sequentially. A header
    /// whose sizes are invalid or whose declared counts disagree with the
    /// sizes fails with [`SerializeError::InvalidHeader`]; a payload shorter
    /// than the header promises fails with
    /// [`SerializeError::TruncatedBuffer`].
    pub fn deserialize<F>(
        buffer: &[u8],
        starting_offset: usize,
        value_deserializer: &F,
    ) -> Result<Deserialized<Self>, SerializeError>
    where
        F: Fn(&[u8], usize) -> Result<Deserialized<T>, SerializeError>,
    {
        let mut offset = starting_offset;

        let read_f64 = |offset: &mut usize| -> Result<f64, SerializeError> {
            let field = deserialize_pod::<f64>(buffer, *offset)?;
            *offset += field.bytes_read();
            Ok(field.into_value())
        };
        let cell_size = read_f64(&mut offset)?;
        let x_size = read_f64(&mut offset)?;
        let y_size = read_f64(&mut offset)?;
        let z_size = read_f64(&mut offset)?;

        let sizes = GridSizes::new(cell_size, x_size, y_size, z_size)
            .map_err(|e| SerializeError::InvalidHeader(e.to_string()))?;

        let read_i64 = |offset: &mut usize| -> Result<i64, SerializeError> {
            let field = deserialize_pod::<i64>(buffer, *offset)?;
            *offset += field.bytes_read();
            Ok(field.into_value())
        };
        let declared = [
            read_i64(&mut offset)?,
            read_i64(&mut offset)?,
            read_i64(&mut offset)?,
        ];
        let derived = [
            sizes.num_x_cells(),
            sizes.num_y_cells(),
            sizes.num_z_cells(),
        ];
        if declared != derived {
            return Err(SerializeError::InvalidHeader(format!(
                "declared cell counts {declared:?} do not match counts {derived:?} derived from sizes"
            )));
        }

        let default_field = value_deserializer(buffer, offset)?;
        offset += default_field.bytes_read();
        let default_value = default_field.into_value();

        // No upfront reservation: the header alone must not drive allocation.
        let total_cells = sizes.total_cells() as usize;
        let mut data = Vec::new();
        for _ in 0..total_cells {
            let cell = value_deserializer(buffer, offset)?;
            offset += cell.bytes_read();
            data.push(cell.into_value());
        }

        Ok(Deserialized::new(
            Self {
                sizes,
                default_value,
                data,
            },
            offset - starting_offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> VoxelGrid<i32> {
        VoxelGrid::new(GridSizes::new(1.0, 4.0, 4.0, 4.0).unwrap(), 0)
    }

    #[test]
    fn cells_initialize_to_default() {
        let grid = small_grid();
        for x in 0..grid.num_x_cells() {
            for y in 0..grid.num_y_cells() {
                for z in 0..grid.num_z_cells() {
                    assert_eq!(*grid.get(&GridIndex::new(x, y, z)).unwrap(), 0);
                }
            }
        }
    }

    #[test]
    fn write_then_read_by_index() {
        let mut grid = small_grid();
        let index = GridIndex::new(1, 2, 3);
        grid.set_value(&index, 17).unwrap();
        assert_eq!(*grid.get(&index).unwrap(), 17);
        // Neighboring cells untouched.
        assert_eq!(*grid.get(&GridIndex::new(1, 2, 2)).unwrap(), 0);
        assert_eq!(*grid.get(&GridIndex::new(1, 3, 3)).unwrap(), 0);
    }

    #[test]
    fn all_addressing_forms_resolve_the_same_cell() {
        let mut grid = small_grid();
        // Grid spans [-2, 2) per axis; (0.5, 0.5, 0.5) is a cell center.
        grid.set_value_at(0.5, 0.5, 0.5, 99).unwrap();

        assert_eq!(*grid.get_at(0.5, 0.5, 0.5).unwrap(), 99);
        assert_eq!(*grid.get_at3(DVec3::new(0.5, 0.5, 0.5)).unwrap(), 99);
        assert_eq!(*grid.get_at4(DVec4::new(0.5, 0.5, 0.5, 1.0)).unwrap(), 99);

        let index = grid.location_to_grid_index(0.5, 0.5, 0.5).unwrap();
        assert_eq!(*grid.get(&index).unwrap(), 99);
    }

    #[test]
    fn out_of_bounds_index_fails_both_ways() {
        let mut grid = small_grid();
        let outside = GridIndex::new(4, 0, 0);
        assert!(grid.get(&outside).is_err());
        assert!(grid.set_value(&outside, 1).is_err());
        assert!(grid.get(&GridIndex::new(0, -1, 0)).is_err());
    }

    #[test]
    fn location_outside_volume_fails() {
        let grid = small_grid();
        // Volume spans [-2, 2) per axis.
        assert!(grid.get_at(2.5, 0.0, 0.0).is_err());
        assert!(grid.get_at(0.0, -2.1, 0.0).is_err());
    }

    #[test]
    fn nonfinite_location_fails_without_mutation() {
        let mut grid = small_grid();
        assert!(grid.set_value_at(f64::NAN, 0.0, 0.0, 5).is_err());
        assert!(grid.get_at(0.0, f64::INFINITY, 0.0).is_err());
        // The failed write must not have touched cell (0, 0, 0) or any other.
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    assert_eq!(*grid.get(&GridIndex::new(x, y, z)).unwrap(), 0);
                }
            }
        }
    }

    #[test]
    fn z_axis_varies_fastest_in_storage() {
        let mut grid = small_grid();
        let mut fill = 0;
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    grid.set_value(&GridIndex::new(x, y, z), fill).unwrap();
                    fill += 1;
                }
            }
        }
        assert_eq!(grid.data, (0..64).collect::<Vec<i32>>());
    }

    #[test]
    fn serialize_roundtrip_preserves_everything() {
        let mut grid = VoxelGrid::new(GridSizes::new(0.5, 2.0, 1.0, 1.5).unwrap(), -1_i32);
        grid.set_value(&GridIndex::new(0, 0, 0), 10).unwrap();
        grid.set_value(&GridIndex::new(3, 1, 2), 20).unwrap();

        let mut buffer = Vec::new();
        let written = grid.serialize(&mut buffer, &serialize_pod);
        assert_eq!(written, buffer.len());

        let decoded = VoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod).unwrap();
        assert_eq!(decoded.bytes_read(), buffer.len());
        assert_eq!(*decoded.value(), grid);
    }

    #[test]
    fn deserialize_rejects_count_mismatch() {
        let grid = small_grid();
        let mut buffer = Vec::new();
        grid.serialize(&mut buffer, &serialize_pod);

        // Corrupt the declared X count (first i64 after the 4 f64 fields).
        buffer[32..40].copy_from_slice(&5_i64.to_ne_bytes());
        let err = VoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod).unwrap_err();
        assert!(matches!(err, SerializeError::InvalidHeader(_)));
    }

    #[test]
    fn deserialize_rejects_nonpositive_sizes() {
        let grid = small_grid();
        let mut buffer = Vec::new();
        grid.serialize(&mut buffer, &serialize_pod);

        // Corrupt the cell size to zero.
        buffer[0..8].copy_from_slice(&0.0_f64.to_ne_bytes());
        let err = VoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod).unwrap_err();
        assert!(matches!(err, SerializeError::InvalidHeader(_)));
    }

    #[test]
    fn deserialize_rejects_truncated_payload() {
        let grid = small_grid();
        let mut buffer = Vec::new();
        grid.serialize(&mut buffer, &serialize_pod);

        buffer.truncate(buffer.len() - 2);
        let err = VoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod).unwrap_err();
        assert!(matches!(err, SerializeError::TruncatedBuffer { .. }));
    }
}
