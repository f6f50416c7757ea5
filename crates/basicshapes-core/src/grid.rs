//! Regular voxel grids.

use glam::{DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapesError};
use crate::voxel::Voxel;

/// Upper bound on the number of voxels in a grid.
pub const MAX_VOXELS: u64 = 1 << 31;

/// Geometry of a regular axis-aligned voxel grid.
///
/// The centre of voxel `(i, j, k)` sits at `origin + (i, j, k) * spacing`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of voxels along X, Y and Z.
    pub dimensions: UVec3,
    /// Distance between adjacent voxel centres.
    pub spacing: DVec3,
    /// World position of voxel `(0, 0, 0)`.
    #[serde(default)]
    pub origin: DVec3,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::new(UVec3::splat(64), DVec3::ONE)
    }
}

impl GridSpec {
    /// Creates a grid spec with its first voxel at the world origin.
    pub fn new(dimensions: UVec3, spacing: DVec3) -> Self {
        Self {
            dimensions,
            spacing,
            origin: DVec3::ZERO,
        }
    }

    /// Creates a cubic grid with unit spacing.
    pub fn uniform(dim: u32) -> Self {
        Self::new(UVec3::splat(dim), DVec3::ONE)
    }

    /// Sets the world position of voxel `(0, 0, 0)`.
    #[must_use]
    pub fn with_origin(mut self, origin: DVec3) -> Self {
        self.origin = origin;
        self
    }

    /// Checks dimensions, spacing and origin.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.min_element() == 0 {
            return Err(ShapesError::InvalidGrid(format!(
                "dimensions must be positive, got {}x{}x{}",
                self.dimensions.x, self.dimensions.y, self.dimensions.z
            )));
        }
        if !self.spacing.is_finite() || self.spacing.min_element() <= 0.0 {
            return Err(ShapesError::InvalidGrid(format!(
                "spacing must be finite and positive, got {}",
                self.spacing
            )));
        }
        if !self.origin.is_finite() {
            return Err(ShapesError::InvalidGrid("origin must be finite".into()));
        }
        if self.num_voxels_u64() > MAX_VOXELS {
            return Err(ShapesError::InvalidGrid(format!(
                "{} voxels exceeds the limit of {MAX_VOXELS}",
                self.num_voxels_u64()
            )));
        }
        Ok(())
    }

    fn num_voxels_u64(&self) -> u64 {
        u64::from(self.dimensions.x) * u64::from(self.dimensions.y) * u64::from(self.dimensions.z)
    }

    /// Returns the total number of voxels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_voxels(&self) -> usize {
        self.num_voxels_u64() as usize
    }

    /// Flattens a 3D voxel index to a row-major linear index (`z` fastest).
    #[must_use]
    pub fn flatten_index(&self, i: u32, j: u32, k: u32) -> usize {
        let ny = self.dimensions.y as usize;
        let nz = self.dimensions.z as usize;
        (i as usize * ny + j as usize) * nz + k as usize
    }

    /// Unflattens a linear index produced by [`GridSpec::flatten_index`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn unflatten_index(&self, idx: usize) -> UVec3 {
        let ny = self.dimensions.y as usize;
        let nz = self.dimensions.z as usize;
        let k = idx % nz;
        let j = (idx / nz) % ny;
        let i = idx / (ny * nz);
        UVec3::new(i as u32, j as u32, k as u32)
    }

    /// Returns the world position of the centre of voxel `(i, j, k)`.
    #[must_use]
    pub fn voxel_center(&self, i: u32, j: u32, k: u32) -> DVec3 {
        self.origin + UVec3::new(i, j, k).as_dvec3() * self.spacing
    }

    /// World position of the last voxel centre.
    #[must_use]
    pub fn max_center(&self) -> DVec3 {
        self.origin + (self.dimensions - UVec3::ONE).as_dvec3() * self.spacing
    }

    /// Midpoint between the first and last voxel centres.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.origin + self.max_center()) * 0.5
    }

    /// Voxel index range `[lo, hi)` whose centres may fall inside the world box
    /// `[min, max]`, clipped to the grid. `None` if the box misses the grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn index_range(&self, min: DVec3, max: DVec3) -> Option<(UVec3, UVec3)> {
        let lo = ((min - self.origin) / self.spacing).ceil().max(DVec3::ZERO);
        let hi = ((max - self.origin) / self.spacing).floor() + DVec3::ONE;
        let hi = hi.min(self.dimensions.as_dvec3());
        if lo.cmpge(hi).any() {
            return None;
        }
        Some((lo.as_uvec3(), hi.as_uvec3()))
    }
}

/// A dense grid of voxel values indexed `[x][y][z]` in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGrid<T> {
    spec: GridSpec,
    data: Vec<T>,
}

impl<T: Voxel> VolumeGrid<T> {
    /// Creates a grid with every voxel set to `background`.
    pub fn filled(spec: GridSpec, background: T) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            data: vec![background; spec.num_voxels()],
            spec,
        })
    }

    /// Wraps existing data, checking its length against the spec.
    pub fn from_data(spec: GridSpec, data: Vec<T>) -> Result<Self> {
        spec.validate()?;
        if data.len() != spec.num_voxels() {
            return Err(ShapesError::InvalidGrid(format!(
                "data length {} does not match {} voxels",
                data.len(),
                spec.num_voxels()
            )));
        }
        Ok(Self { spec, data })
    }

    /// Returns the grid geometry.
    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Returns the number of voxels in each dimension.
    #[must_use]
    pub fn dimensions(&self) -> UVec3 {
        self.spec.dimensions
    }

    /// Returns the voxel spacing.
    #[must_use]
    pub fn spacing(&self) -> DVec3 {
        self.spec.spacing
    }

    /// Returns the voxel values in row-major order.
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the voxel values.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the grid, returning its values.
    #[must_use]
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Returns the value of voxel `(i, j, k)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, i: u32, j: u32, k: u32) -> Option<T> {
        let dims = self.spec.dimensions;
        if i >= dims.x || j >= dims.y || k >= dims.z {
            return None;
        }
        Some(self.data[self.spec.flatten_index(i, j, k)])
    }

    /// Number of voxels holding something other than `background`.
    #[must_use]
    pub fn count_not(&self, background: T) -> usize {
        self.data.iter().filter(|v| **v != background).count()
    }
}
