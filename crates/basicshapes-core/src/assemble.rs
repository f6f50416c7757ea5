//! Volume assembly: rasterize an ordered list of shapes and composite them.
//!
//! Shapes are rasterized in batches, one shape per rayon thread, and each
//! batch is merged before the next is rasterized, so at most one batch of
//! footprints is alive. The merge always runs in input order so `Overwrite`
//! stays deterministic.

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{Result, ShapesError};
use crate::grid::{GridSpec, VolumeGrid};
use crate::options::{CompositePolicy, RasterOptions};
use crate::rasterize::{footprint, Footprint};
use crate::shape::ShapeDescriptor;
use crate::voxel::{label_as, Voxel};

/// A volume built from several shapes, together with everything needed to
/// rebuild it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeVolume<T> {
    grid: VolumeGrid<T>,
    shapes: Vec<ShapeDescriptor>,
    policy: CompositePolicy,
    background: T,
}

impl<T: Voxel> CompositeVolume<T> {
    /// Reassembles a composite from stored parts, e.g. when reading a file.
    /// The parts are not checked here; writing validates them.
    pub fn from_parts(
        grid: VolumeGrid<T>,
        shapes: Vec<ShapeDescriptor>,
        policy: CompositePolicy,
        background: T,
    ) -> Self {
        Self {
            grid,
            shapes,
            policy,
            background,
        }
    }

    /// Returns the voxel grid.
    #[must_use]
    pub fn grid(&self) -> &VolumeGrid<T> {
        &self.grid
    }

    /// Returns the grid geometry.
    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        self.grid.spec()
    }

    /// Returns the voxel values in row-major order.
    #[must_use]
    pub fn data(&self) -> &[T] {
        self.grid.data()
    }

    /// Returns the shapes in the order they were composited.
    #[must_use]
    pub fn shapes(&self) -> &[ShapeDescriptor] {
        &self.shapes
    }

    /// Returns the compositing policy.
    #[must_use]
    pub fn policy(&self) -> CompositePolicy {
        self.policy
    }

    /// Returns the background value.
    #[must_use]
    pub fn background(&self) -> T {
        self.background
    }

    /// Returns the value of voxel `(i, j, k)`, or `None` outside the grid.
    #[must_use]
    pub fn value_at(&self, i: u32, j: u32, k: u32) -> Option<T> {
        self.grid.get(i, j, k)
    }

    /// Number of voxels covered by at least one shape with a non-background result.
    #[must_use]
    pub fn count_not_background(&self) -> usize {
        self.grid.count_not(self.background)
    }

    /// Voxel counts per distinct value, keyed by the value widened to `f64`.
    #[must_use]
    pub fn histogram(&self) -> Vec<(f64, usize)> {
        let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
        for value in self.grid.data() {
            let wide = value.to_f64();
            counts.entry(order_key(wide)).or_insert((wide, 0)).1 += 1;
        }
        counts.into_values().collect()
    }

    /// Splits the composite into its grid and shape list.
    #[must_use]
    pub fn into_parts(self) -> (VolumeGrid<T>, Vec<ShapeDescriptor>) {
        (self.grid, self.shapes)
    }
}

/// Maps an `f64` to a `u64` with the same total order.
fn order_key(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

/// Rasterizes `shapes` onto `grid` and merges them in sequence order.
///
/// Every shape and the grid are validated before the output buffer is
/// allocated; the first bad shape is reported with its position.
pub fn assemble<T: Voxel>(
    shapes: Vec<ShapeDescriptor>,
    grid: &GridSpec,
    policy: CompositePolicy,
    options: &RasterOptions,
) -> Result<CompositeVolume<T>> {
    if shapes.is_empty() {
        return Err(ShapesError::EmptyShapeList);
    }
    grid.validate()?;
    let background: T = label_as(options.background)
        .map_err(|_| ShapesError::Config(format!(
            "background {} is not representable as {}",
            options.background,
            T::DTYPE
        )))?;
    let labels = shapes
        .iter()
        .enumerate()
        .map(|(position, shape)| {
            shape
                .validate()
                .and_then(|()| label_as::<T>(shape.label))
                .map_err(|e| e.at_shape(position))
        })
        .collect::<Result<Vec<T>>>()?;

    let start = Instant::now();
    let batch = if options.parallel {
        rayon::current_num_threads().max(1)
    } else {
        1
    };
    let mut volume = VolumeGrid::filled(*grid, background)?;
    for (number, chunk) in shapes.chunks(batch).enumerate() {
        let offset = number * batch;
        let footprints = rasterize_batch(chunk, offset, grid, options.parallel)?;
        for (footprint, &label) in footprints.iter().zip(&labels[offset..]) {
            merge(volume.data_mut(), footprint, label, policy)?;
        }
    }
    log::debug!(
        "rasterized and merged {} shapes in {:?} (parallel: {}, batch: {batch})",
        shapes.len(),
        start.elapsed(),
        options.parallel
    );
    log::info!(
        "assembled {} shapes on a {}x{}x{} grid with policy {policy}",
        shapes.len(),
        grid.dimensions.x,
        grid.dimensions.y,
        grid.dimensions.z
    );

    Ok(CompositeVolume {
        grid: volume,
        shapes,
        policy,
        background,
    })
}

/// Computes the footprints of one batch, in input order. `offset` is the
/// position of the batch's first shape in the full list.
fn rasterize_batch(
    shapes: &[ShapeDescriptor],
    offset: usize,
    grid: &GridSpec,
    parallel: bool,
) -> Result<Vec<Footprint>> {
    let one = |(position, shape): (usize, &ShapeDescriptor)| {
        footprint(shape, grid).map_err(|e| e.at_shape(offset + position))
    };
    if parallel {
        shapes.par_iter().enumerate().map(one).collect()
    } else {
        shapes.iter().enumerate().map(one).collect()
    }
}

/// Applies one shape's footprint to the output buffer.
fn merge<T: Voxel>(
    data: &mut [T],
    footprint: &Footprint,
    label: T,
    policy: CompositePolicy,
) -> Result<()> {
    for run in footprint.runs() {
        let span = &mut data[run.clone()];
        match policy {
            CompositePolicy::Overwrite => span.fill(label),
            CompositePolicy::Max => {
                for value in span.iter_mut() {
                    *value = value.max_value(label);
                }
            }
            CompositePolicy::Add => {
                for (offset, value) in span.iter_mut().enumerate() {
                    *value = value
                        .checked_accumulate(label)
                        .ok_or(ShapesError::VoxelOverflow {
                            index: run.start + offset,
                        })?;
                }
            }
        }
    }
    Ok(())
}
