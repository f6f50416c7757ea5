//! Point-sampling rasterizer.
//!
//! Each voxel centre inside a shape's clipped bounding box is mapped into the
//! shape's local frame and tested against the kind's inclusion predicate.
//! There is no sub-voxel averaging: a voxel is either covered or not.

use std::ops::Range;

use crate::error::Result;
use crate::grid::{GridSpec, VolumeGrid};
use crate::options::RasterOptions;
use crate::shape::ShapeDescriptor;
use crate::voxel::{label_as, Voxel};

/// The voxels one shape covers on a grid, kept as ascending runs of
/// consecutive flat indices. A row of a solid shape along `k` is one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Footprint {
    runs: Vec<Range<usize>>,
    len: usize,
}

impl Footprint {
    /// Appends `idx`, which must be greater than every index already held.
    fn push(&mut self, idx: usize) {
        match self.runs.last_mut() {
            Some(run) if run.end == idx => run.end += 1,
            _ => self.runs.push(idx..idx + 1),
        }
        self.len += 1;
    }

    /// Disjoint, ascending runs of covered flat indices.
    #[must_use]
    pub fn runs(&self) -> &[Range<usize>] {
        &self.runs
    }

    /// Covered flat indices, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs.iter().flat_map(Clone::clone)
    }

    /// Number of covered voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the shape covers no voxel of the grid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Computes the voxels of `grid` whose centres lie inside `shape`.
///
/// Parts of the shape outside the grid are clipped silently.
pub fn footprint(shape: &ShapeDescriptor, grid: &GridSpec) -> Result<Footprint> {
    shape.validate()?;
    grid.validate()?;

    let (min, max) = shape.world_bounds();
    let Some((lo, hi)) = grid.index_range(min, max) else {
        log::warn!("{shape} lies entirely outside the grid");
        return Ok(Footprint::default());
    };

    let mut covered = Footprint::default();
    for i in lo.x..hi.x {
        for j in lo.y..hi.y {
            for k in lo.z..hi.z {
                if shape.contains_world(grid.voxel_center(i, j, k)) {
                    covered.push(grid.flatten_index(i, j, k));
                }
            }
        }
    }

    if covered.is_empty() {
        log::warn!("{shape} covers no voxel centre");
    }
    Ok(covered)
}

/// Rasterizes one shape into a fresh grid filled with the background value.
pub fn rasterize<T: Voxel>(
    shape: &ShapeDescriptor,
    grid: &GridSpec,
    options: &RasterOptions,
) -> Result<VolumeGrid<T>> {
    shape.validate()?;
    grid.validate()?;
    let label: T = label_as(shape.label)?;
    let background: T = label_as(options.background)?;

    let covered = footprint(shape, grid)?;
    let mut volume = VolumeGrid::filled(*grid, background)?;
    let data = volume.data_mut();
    for run in covered.runs() {
        data[run.clone()].fill(label);
    }
    log::debug!("rasterized {shape}: {} voxels", covered.len());
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use glam::{DQuat, DVec3, UVec3};

    use super::*;
    use crate::error::ShapesError;

    #[test]
    fn test_sphere_radius_two_covers_33_voxels() {
        let grid = GridSpec::uniform(10);
        let shape = ShapeDescriptor::sphere(DVec3::splat(5.0), 2.0, 1.0);
        let volume: VolumeGrid<u8> = rasterize(&shape, &grid, &RasterOptions::default()).unwrap();

        assert_eq!(volume.data().len(), 1000);
        assert_eq!(volume.data().iter().filter(|v| **v == 1).count(), 33);
        assert_eq!(volume.data().iter().filter(|v| **v == 0).count(), 967);
    }

    #[test]
    fn test_every_voxel_matches_predicate() {
        let grid = GridSpec::new(UVec3::new(12, 9, 7), DVec3::new(0.5, 0.75, 1.0))
            .with_origin(DVec3::new(-2.0, -1.0, 0.0));
        let shape = ShapeDescriptor::cuboid(DVec3::new(1.0, 2.0, 3.0), DVec3::new(1.5, 1.0, 2.0), 4.0)
            .with_rotation(DQuat::from_rotation_x(0.4));
        let volume: VolumeGrid<u16> = rasterize(&shape, &grid, &RasterOptions::default()).unwrap();

        for (idx, value) in volume.data().iter().enumerate() {
            let ijk = grid.unflatten_index(idx);
            let inside = shape.contains_world(grid.voxel_center(ijk.x, ijk.y, ijk.z));
            assert_eq!(*value == 4, inside, "voxel {ijk}");
            assert!(*value == 4 || *value == 0);
        }
    }

    #[test]
    fn test_sphere_on_edge_is_clipped() {
        let grid = GridSpec::uniform(10);
        let shape = ShapeDescriptor::sphere(DVec3::new(0.0, 5.0, 5.0), 5.0, 1.0);
        let volume: VolumeGrid<u8> = rasterize(&shape, &grid, &RasterOptions::default()).unwrap();
        // Lattice points of the x >= 0 half ball that also fit in y, z < 10.
        assert_eq!(volume.count_not(0), 296);
    }

    #[test]
    fn test_shape_outside_grid_is_empty() {
        let grid = GridSpec::uniform(8);
        let shape = ShapeDescriptor::sphere(DVec3::splat(100.0), 3.0, 1.0);
        assert!(footprint(&shape, &grid).unwrap().is_empty());
        let volume: VolumeGrid<u8> = rasterize(&shape, &grid, &RasterOptions::default()).unwrap();
        assert_eq!(volume.count_not(0), 0);
    }

    #[test]
    fn test_degenerate_shape_rejected() {
        let grid = GridSpec::uniform(8);
        let shape = ShapeDescriptor::sphere(DVec3::splat(4.0), 0.0, 1.0);
        let err = rasterize::<u8>(&shape, &grid, &RasterOptions::default()).unwrap_err();
        assert!(matches!(err, ShapesError::InvalidShape { .. }));
    }

    #[test]
    fn test_label_out_of_range_rejected() {
        let grid = GridSpec::uniform(8);
        let shape = ShapeDescriptor::sphere(DVec3::splat(4.0), 2.0, 300.0);
        let err = rasterize::<u8>(&shape, &grid, &RasterOptions::default()).unwrap_err();
        assert!(matches!(err, ShapesError::InvalidShape { .. }));
        assert!(rasterize::<u16>(&shape, &grid, &RasterOptions::default()).is_ok());
    }

    #[test]
    fn test_background_value() {
        let grid = GridSpec::uniform(6);
        let shape = ShapeDescriptor::sphere(DVec3::splat(3.0), 1.0, 2.0);
        let options = RasterOptions::default().with_background(-1.0);
        let volume: VolumeGrid<f32> = rasterize(&shape, &grid, &options).unwrap();
        assert_eq!(volume.count_not(-1.0), 7);
        assert_eq!(volume.get(0, 0, 0), Some(-1.0));
        assert_eq!(volume.get(3, 3, 3), Some(2.0));
    }

    #[test]
    fn test_footprint_is_sorted() {
        let grid = GridSpec::uniform(16);
        let shape = ShapeDescriptor::torus(DVec3::splat(8.0), 4.0, 1.5, 1.0)
            .with_rotation(DQuat::from_rotation_y(0.7));
        let fp = footprint(&shape, &grid).unwrap();
        assert!(!fp.is_empty());
        let indices: Vec<usize> = fp.indices().collect();
        assert_eq!(indices.len(), fp.len());
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(fp.runs().windows(2).all(|w| w[0].end < w[1].start));
    }

    #[test]
    fn test_footprint_rows_collapse_into_runs() {
        let grid = GridSpec::uniform(6);
        let whole = ShapeDescriptor::cuboid(DVec3::splat(2.5), DVec3::splat(3.5), 1.0);
        let fp = footprint(&whole, &grid).unwrap();
        assert_eq!(fp.runs(), &[0..216]);
        assert_eq!(fp.len(), 216);

        let grid = GridSpec::uniform(20);
        let ball = ShapeDescriptor::sphere(DVec3::splat(10.0), 6.0, 1.0);
        let fp = footprint(&ball, &grid).unwrap();
        // At most one run per (i, j) row, far fewer than voxels.
        assert!(fp.runs().len() <= 20 * 20);
        assert!(fp.runs().len() * 4 < fp.len());
        let total: usize = fp.runs().iter().map(ExactSizeIterator::len).sum();
        assert_eq!(total, fp.len());
    }

    #[test]
    fn test_quarter_turn_swaps_cuboid_extents() {
        let grid = GridSpec::uniform(21);
        let center = DVec3::splat(10.0);
        let flat = ShapeDescriptor::cuboid(center, DVec3::new(6.5, 2.5, 1.5), 1.0);
        let turned = ShapeDescriptor::cuboid(center, DVec3::new(2.5, 6.5, 1.5), 1.0)
            .with_rotation(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let a: VolumeGrid<u8> = rasterize(&flat, &grid, &RasterOptions::default()).unwrap();
        let b: VolumeGrid<u8> = rasterize(&turned, &grid, &RasterOptions::default()).unwrap();
        assert_eq!(a.count_not(0), 13 * 5 * 3);
        assert_eq!(a, b);
    }
}
