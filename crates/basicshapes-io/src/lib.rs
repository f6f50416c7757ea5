//! Serialization for basicshapes volumes.
//!
//! This crate provides:
//! - A small hierarchical binary container (groups, typed datasets, attributes)
//! - Reading and writing of [`CompositeVolume`](basicshapes_core::CompositeVolume)s on top of it

// Byte offsets and lengths are bounded by the input size
#![allow(clippy::cast_possible_truncation)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod container;
pub mod volume_file;

pub use container::{AttrValue, Attributes, ContainerError, Dataset, Group, Node};
pub use volume_file::{read, read_info, write, VolumeInfo, GENERATOR};
