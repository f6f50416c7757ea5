//! basicshapes: voxelized 3D primitives in a hierarchical binary container.
//!
//! # Quick Start
//!
//! ```no_run
//! use basicshapes::*;
//!
//! fn main() -> Result<()> {
//!     let shapes = vec![
//!         ShapeDescriptor::sphere(DVec3::splat(16.0), 6.0, 1.0),
//!         ShapeDescriptor::cuboid(DVec3::new(8.0, 16.0, 16.0), DVec3::new(2.0, 4.0, 4.0), 2.0),
//!     ];
//!     let volume: CompositeVolume<u8> = assemble(
//!         shapes,
//!         &GridSpec::uniform(32),
//!         CompositePolicy::Overwrite,
//!         &RasterOptions::default(),
//!     )?;
//!     write(&volume, "shapes.bsv")?;
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `basicshapes-core`: shapes, grids, rasterization and compositing
//! - `basicshapes-io`: the container format and volume files
//! - this crate: run-time voxel types, scene files and the command line

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod scene;
pub mod volume;

// Re-export core types
pub use basicshapes_core::{
    assemble, footprint, rasterize, CompositePolicy, CompositeVolume, DQuat, DVec3, Dtype,
    Footprint, GridSpec, RasterOptions, Result, Rotation, ShapeDescriptor, ShapeKind,
    ShapesError, UVec3, Voxel, VolumeGrid, MAX_VOXELS,
};

// Re-export serialization
pub use basicshapes_io::{read, read_info, write, VolumeInfo};

pub use scene::{SceneConfig, SceneShape};
pub use volume::{generate, read_any, AnyVolume};
