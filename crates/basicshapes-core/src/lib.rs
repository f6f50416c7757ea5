//! Core of basicshapes.
//!
//! This crate turns parametric primitives into voxel volumes:
//! - [`ShapeDescriptor`] describes a placed, labelled primitive
//! - [`rasterize`] point-samples one shape onto a [`GridSpec`]
//! - [`assemble`] composites an ordered list of shapes into a [`CompositeVolume`]
//!
//! Serialization lives in `basicshapes-io`.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Exact float comparisons are intentional for label values
#![allow(clippy::float_cmp)]
// Grid indices are bounded by MAX_VOXELS
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod assemble;
pub mod error;
pub mod grid;
pub mod options;
pub mod orientation;
pub mod rasterize;
pub mod shape;
pub mod voxel;

pub use assemble::{assemble, CompositeVolume};
pub use error::{Result, ShapesError};
pub use grid::{GridSpec, VolumeGrid, MAX_VOXELS};
pub use options::{CompositePolicy, RasterOptions};
pub use orientation::Rotation;
pub use rasterize::{footprint, rasterize, Footprint};
pub use shape::{ShapeDescriptor, ShapeKind};
pub use voxel::{Dtype, Voxel};

// Re-export glam types for convenience
pub use glam::{DQuat, DVec3, UVec3};
