use std::collections::HashMap;
use std::collections::hash_map::Entry;

use glam::{DVec3, DVec4};
use voxelspace_common::{GridError, GridIndex, GridSizes};
use voxelspace_serialize::{Deserialized, SerializeError, deserialize_pod, serialize_pod};

use crate::VoxelGrid;

/// How a dynamic-grid write treats missing storage.
///
/// Only `SetCell` is defined today: create the addressed chunk if absent,
/// then write the one cell. The enum is the extension point for future write
/// policies and is therefore non-exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SetType {
    SetCell,
}

/// Where a dynamic-grid read found its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FoundStatus {
    /// No chunk covers the queried location; the value is the grid default.
    NotFound,
    /// The value was read from an allocated chunk's cell storage.
    FoundInCell,
}

/// Result of a dynamic-grid read: the value plus where it came from.
#[derive(Debug, Clone, Copy)]
pub struct GridQuery<'a, T> {
    value: &'a T,
    status: FoundStatus,
}

impl<'a, T> GridQuery<'a, T> {
    pub fn value(&self) -> &'a T {
        self.value
    }

    pub fn found_status(&self) -> FoundStatus {
        self.status
    }
}

/// Unbounded sparse voxel grid backed by on-demand fixed-size chunks.
///
/// Chunks tile space without gaps or overlap: the chunk at coordinate `c`
/// covers `[c * extent, (c + 1) * extent)` per axis, where `extent` is the
/// chunk sizing's realized extent. Each chunk is a [`VoxelGrid`] at the
/// shared chunk sizing, fully initialized to the default value when
/// allocated. Reads never allocate.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicSpatialHashedVoxelGrid<T: Clone> {
    chunk_sizes: GridSizes,
    default_value: T,
    chunks: HashMap<GridIndex, VoxelGrid<T>>,
}

impl<T: Clone> DynamicSpatialHashedVoxelGrid<T> {
    /// Build an empty grid; `chunk_sizes` defines the shape of every chunk.
    pub fn new(chunk_sizes: GridSizes, default_value: T) -> Self {
        Self {
            chunk_sizes,
            default_value,
            chunks: HashMap::new(),
        }
    }

    pub fn chunk_sizes(&self) -> &GridSizes {
        &self.chunk_sizes
    }

    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn has_chunk(&self, coord: &GridIndex) -> bool {
        self.chunks.contains_key(coord)
    }

    /// Coordinate of the chunk tiling the given (finite) location.
    ///
    /// Floor division keeps negative locations in the chunk below zero
    /// rather than truncating toward it.
    fn chunk_coord(&self, x: f64, y: f64, z: f64) -> GridIndex {
        let extents = self.chunk_sizes.realized_extents();
        GridIndex::new(
            (x / extents.x).floor() as i64,
            (y / extents.y).floor() as i64,
            (z / extents.z).floor() as i64,
        )
    }

    /// Within-chunk cell index for a (finite) location, re-expressed in the
    /// chunk's own frame.
    ///
    /// Rounding at a chunk seam can push the raw index one cell outside the
    /// chunk; it is clamped back in, so the result is always a valid cell of
    /// the chunk sizing.
    fn local_index(&self, coord: &GridIndex, x: f64, y: f64, z: f64) -> GridIndex {
        let extents = self.chunk_sizes.realized_extents();
        let cell_size = self.chunk_sizes.cell_size();
        let local = |position: f64, chunk: i64, extent: f64, num_cells: i64| -> i64 {
            let offset = position - chunk as f64 * extent;
            ((offset / cell_size).floor() as i64).clamp(0, num_cells - 1)
        };
        GridIndex::new(
            local(x, coord.x, extents.x, self.chunk_sizes.num_x_cells()),
            local(y, coord.y, extents.y, self.chunk_sizes.num_y_cells()),
            local(z, coord.z, extents.z, self.chunk_sizes.num_z_cells()),
        )
    }

    /// Write `value` into the cell containing the location.
    ///
    /// With [`SetType::SetCell`] the addressed chunk is created first if
    /// absent, fully initialized to the default value. Any finite location
    /// is writable; non-finite coordinates fail with
    /// [`GridError::InvalidLocation`] before anything is touched.
    pub fn set_value(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        set_type: SetType,
        value: T,
    ) -> Result<(), GridError> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(GridError::InvalidLocation { x, y, z });
        }
        match set_type {
            SetType::SetCell => {
                let coord = self.chunk_coord(x, y, z);
                let local = self.local_index(&coord, x, y, z);
                let chunk = match self.chunks.entry(coord) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(slot) => {
                        tracing::debug!(
                            x = coord.x,
                            y = coord.y,
                            z = coord.z,
                            "allocating chunk"
                        );
                        slot.insert(VoxelGrid::new(self.chunk_sizes, self.default_value.clone()))
                    }
                };
                chunk.set_value(&local, value)
            }
        }
    }

    /// Write through a 3-component location.
    pub fn set_value3(
        &mut self,
        location: DVec3,
        set_type: SetType,
        value: T,
    ) -> Result<(), GridError> {
        self.set_value(location.x, location.y, location.z, set_type, value)
    }

    /// Write through a 4-component homogeneous location (`w` must be 1.0).
    pub fn set_value4(
        &mut self,
        location: DVec4,
        set_type: SetType,
        value: T,
    ) -> Result<(), GridError> {
        if location.w != 1.0 {
            return Err(GridError::InvalidLocation {
                x: location.x,
                y: location.y,
                z: location.z,
            });
        }
        self.set_value(location.x, location.y, location.z, set_type, value)
    }

    /// Read the cell containing the location.
    ///
    /// Returns the stored value with [`FoundStatus::FoundInCell`] when a
    /// chunk covers the location, otherwise the default value with
    /// [`FoundStatus::NotFound`]. Reads are side-effect-free and absorb any
    /// location, including non-finite ones, as not found.
    pub fn get(&self, x: f64, y: f64, z: f64) -> GridQuery<'_, T> {
        let not_found = GridQuery {
            value: &self.default_value,
            status: FoundStatus::NotFound,
        };
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return not_found;
        }
        let coord = self.chunk_coord(x, y, z);
        match self.chunks.get(&coord) {
            Some(chunk) => {
                let local = self.local_index(&coord, x, y, z);
                match chunk.get(&local) {
                    Ok(value) => GridQuery {
                        value,
                        status: FoundStatus::FoundInCell,
                    },
                    Err(_) => not_found,
                }
            }
            None => not_found,
        }
    }

    /// Read through a 3-component location.
    pub fn get3(&self, location: DVec3) -> GridQuery<'_, T> {
        self.get(location.x, location.y, location.z)
    }

    /// Read through a 4-component homogeneous location; a scale other than
    /// 1.0 does not address a cell and reads as not found.
    pub fn get4(&self, location: DVec4) -> GridQuery<'_, T> {
        if location.w != 1.0 {
            return GridQuery {
                value: &self.default_value,
                status: FoundStatus::NotFound,
            };
        }
        self.get(location.x, location.y, location.z)
    }

    /// Append the grid to `buffer` using the caller's value encoder.
    ///
    /// Layout: chunk cell size and extents (4 x f64), the default value, the
    /// chunk count (i64), then per chunk its coordinate (3 x i64) followed
    /// by the chunk's full dense serialization. Chunks are emitted in
    /// ascending coordinate order so output is deterministic. Returns bytes
    /// written.
    pub fn serialize<F>(&self, buffer: &mut Vec<u8>, value_serializer: &F) -> usize
    where
        F: Fn(&T, &mut Vec<u8>) -> usize,
    {
        let start = buffer.len();
        serialize_pod(&self.chunk_sizes.cell_size(), buffer);
        serialize_pod(&self.chunk_sizes.x_size(), buffer);
        serialize_pod(&self.chunk_sizes.y_size(), buffer);
        serialize_pod(&self.chunk_sizes.z_size(), buffer);
        value_serializer(&self.default_value, buffer);
        serialize_pod(&(self.chunks.len() as i64), buffer);

        let mut coords: Vec<&GridIndex> = self.chunks.keys().collect();
        coords.sort();
        for coord in coords {
            serialize_pod(&coord.x, buffer);
            serialize_pod(&coord.y, buffer);
            serialize_pod(&coord.z, buffer);
            self.chunks[coord].serialize(buffer, value_serializer);
        }
        let written = buffer.len() - start;
        tracing::trace!(
            chunks = self.chunks.len(),
            bytes = written,
            "serialized dynamic grid"
        );
        written
    }

    /// Reconstruct a grid from `buffer` starting at `starting_offset`.
    ///
    /// Returns the grid and the number of bytes consumed. Fails with
    /// [`SerializeError::InvalidHeader`] on invalid chunk sizes, a negative
    /// chunk count, a duplicate chunk coordinate, or a chunk whose sizing
    /// disagrees with the grid header; with
    /// [`SerializeError::TruncatedBuffer`] when the payload runs out early.
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

        let chunk_sizes = GridSizes::new(cell_size, x_size, y_size, z_size)
            .map_err(|e| SerializeError::InvalidHeader(e.to_string()))?;

        let default_field = value_deserializer(buffer, offset)?;
        offset += default_field.bytes_read();
        let default_value = default_field.into_value();

        let read_i64 = |offset: &mut usize| -> Result<i64, SerializeError> {
            let field = deserialize_pod::<i64>(buffer, *offset)?;
            *offset += field.bytes_read();
            Ok(field.into_value())
        };
        let chunk_count = read_i64(&mut offset)?;
        if chunk_count < 0 {
            return Err(SerializeError::InvalidHeader(format!(
                "negative chunk count {chunk_count}"
            )));
        }

        // No upfront reservation: the header alone must not drive allocation.
        let mut chunks = HashMap::new();
        for _ in 0..chunk_count {
            let coord = GridIndex::new(
                read_i64(&mut offset)?,
                read_i64(&mut offset)?,
                read_i64(&mut offset)?,
            );
            let chunk_field = VoxelGrid::deserialize(buffer, offset, value_deserializer)?;
            offset += chunk_field.bytes_read();
            let chunk = chunk_field.into_value();
            if chunk.sizes() != &chunk_sizes {
                return Err(SerializeError::InvalidHeader(format!(
                    "chunk at {coord:?} has sizing {:?}, grid header declares {chunk_sizes:?}",
                    chunk.sizes()
                )));
            }
            if chunks.insert(coord, chunk).is_some() {
                return Err(SerializeError::InvalidHeader(format!(
                    "duplicate chunk coordinate {coord:?}"
                )));
            }
        }

        Ok(Deserialized::new(
            Self {
                chunk_sizes,
                default_value,
                chunks,
            },
            offset - starting_offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked_grid() -> DynamicSpatialHashedVoxelGrid<i32> {
        DynamicSpatialHashedVoxelGrid::new(GridSizes::new(1.0, 4.0, 4.0, 4.0).unwrap(), 0)
    }

    #[test]
    fn starts_with_zero_chunks() {
        let grid = chunked_grid();
        assert_eq!(grid.num_chunks(), 0);
    }

    #[test]
    fn read_of_absent_chunk_returns_default_without_allocating() {
        let grid = chunked_grid();
        let query = grid.get(100.0, -50.0, 3.0);
        assert_eq!(*query.value(), 0);
        assert_eq!(query.found_status(), FoundStatus::NotFound);
        assert_eq!(grid.num_chunks(), 0);
    }

    #[test]
    fn set_cell_allocates_exactly_one_chunk() {
        let mut grid = chunked_grid();
        grid.set_value(0.5, 0.5, 0.5, SetType::SetCell, 7).unwrap();
        assert_eq!(grid.num_chunks(), 1);
        assert!(grid.has_chunk(&GridIndex::new(0, 0, 0)));

        let query = grid.get(0.5, 0.5, 0.5);
        assert_eq!(*query.value(), 7);
        assert_eq!(query.found_status(), FoundStatus::FoundInCell);

        // A different cell of the same chunk reads the default, found in cell.
        let sibling = grid.get(1.5, 0.5, 0.5);
        assert_eq!(*sibling.value(), 0);
        assert_eq!(sibling.found_status(), FoundStatus::FoundInCell);
    }

    #[test]
    fn negative_locations_map_to_negative_chunks() {
        let mut grid = chunked_grid();
        grid.set_value(-0.5, -0.5, -0.5, SetType::SetCell, 11)
            .unwrap();
        assert!(grid.has_chunk(&GridIndex::new(-1, -1, -1)));

        let query = grid.get(-0.5, -0.5, -0.5);
        assert_eq!(*query.value(), 11);
        assert_eq!(query.found_status(), FoundStatus::FoundInCell);
        // The mirror location on the positive side is a different chunk.
        assert_eq!(grid.get(0.5, 0.5, 0.5).found_status(), FoundStatus::NotFound);
    }

    #[test]
    fn chunks_tile_without_overlap() {
        let mut grid = chunked_grid();
        // Chunk extent is 4.0; these straddle the x = 4 seam.
        grid.set_value(3.5, 0.5, 0.5, SetType::SetCell, 1).unwrap();
        grid.set_value(4.5, 0.5, 0.5, SetType::SetCell, 2).unwrap();
        assert_eq!(grid.num_chunks(), 2);
        assert!(grid.has_chunk(&GridIndex::new(0, 0, 0)));
        assert!(grid.has_chunk(&GridIndex::new(1, 0, 0)));
        assert_eq!(*grid.get(3.5, 0.5, 0.5).value(), 1);
        assert_eq!(*grid.get(4.5, 0.5, 0.5).value(), 2);
    }

    #[test]
    fn addressing_forms_agree() {
        let mut grid = chunked_grid();
        grid.set_value3(DVec3::new(-2.5, 1.5, 0.5), SetType::SetCell, 5)
            .unwrap();
        assert_eq!(*grid.get(-2.5, 1.5, 0.5).value(), 5);
        assert_eq!(*grid.get3(DVec3::new(-2.5, 1.5, 0.5)).value(), 5);
        assert_eq!(*grid.get4(DVec4::new(-2.5, 1.5, 0.5, 1.0)).value(), 5);
    }

    #[test]
    fn homogeneous_scale_must_be_one() {
        let mut grid = chunked_grid();
        assert!(grid
            .set_value4(DVec4::new(0.5, 0.5, 0.5, 2.0), SetType::SetCell, 1)
            .is_err());
        assert_eq!(grid.num_chunks(), 0);
        assert_eq!(
            grid.get4(DVec4::new(0.5, 0.5, 0.5, 0.0)).found_status(),
            FoundStatus::NotFound
        );
    }

    #[test]
    fn nonfinite_write_fails_and_read_is_not_found() {
        let mut grid = chunked_grid();
        assert!(grid
            .set_value(f64::NAN, 0.0, 0.0, SetType::SetCell, 1)
            .is_err());
        assert_eq!(grid.num_chunks(), 0);
        assert_eq!(
            grid.get(f64::INFINITY, 0.0, 0.0).found_status(),
            FoundStatus::NotFound
        );
    }

    #[test]
    fn overwrite_does_not_allocate_again() {
        let mut grid = chunked_grid();
        grid.set_value(0.5, 0.5, 0.5, SetType::SetCell, 1).unwrap();
        grid.set_value(0.5, 0.5, 0.5, SetType::SetCell, 2).unwrap();
        assert_eq!(grid.num_chunks(), 1);
        assert_eq!(*grid.get(0.5, 0.5, 0.5).value(), 2);
    }

    #[test]
    fn serialize_roundtrip_preserves_chunks_and_default() {
        let mut grid = chunked_grid();
        grid.set_value(0.5, 0.5, 0.5, SetType::SetCell, 1).unwrap();
        grid.set_value(-3.5, 7.5, -0.5, SetType::SetCell, 2).unwrap();
        grid.set_value(12.5, -12.5, 12.5, SetType::SetCell, 3)
            .unwrap();

        let mut buffer = Vec::new();
        let written = grid.serialize(&mut buffer, &serialize_pod);
        assert_eq!(written, buffer.len());

        let decoded =
            DynamicSpatialHashedVoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod)
                .unwrap();
        assert_eq!(decoded.bytes_read(), buffer.len());
        assert_eq!(*decoded.value(), grid);
    }

    #[test]
    fn deserialize_rejects_negative_chunk_count() {
        let grid = chunked_grid();
        let mut buffer = Vec::new();
        grid.serialize(&mut buffer, &serialize_pod);

        // Chunk count sits after 4 f64 fields and the i32 default value.
        buffer[36..44].copy_from_slice(&(-1_i64).to_ne_bytes());
        let err =
            DynamicSpatialHashedVoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod)
                .unwrap_err();
        assert!(matches!(err, SerializeError::InvalidHeader(_)));
    }

    #[test]
    fn deserialize_rejects_truncated_chunk() {
        let mut grid = chunked_grid();
        grid.set_value(0.5, 0.5, 0.5, SetType::SetCell, 1).unwrap();
        let mut buffer = Vec::new();
        grid.serialize(&mut buffer, &serialize_pod);

        buffer.truncate(buffer.len() - 1);
        let err =
            DynamicSpatialHashedVoxelGrid::<i32>::deserialize(&buffer, 0, &deserialize_pod)
                .unwrap_err();
        assert!(matches!(err, SerializeError::TruncatedBuffer { .. }));
    }
}
