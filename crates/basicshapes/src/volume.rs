//! Volumes whose voxel type is chosen at run time.

use std::path::Path;

use basicshapes_core::{
    assemble, CompositePolicy, CompositeVolume, Dtype, GridSpec, RasterOptions, Result,
    ShapeDescriptor,
};

/// A [`CompositeVolume`] of any supported voxel type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyVolume {
    U8(CompositeVolume<u8>),
    U16(CompositeVolume<u16>),
    U32(CompositeVolume<u32>),
    I32(CompositeVolume<i32>),
    F32(CompositeVolume<f32>),
    F64(CompositeVolume<f64>),
}

/// Runs `$body` with `$v` bound to the typed volume inside `$any`.
macro_rules! with_volume {
    ($any:expr, $v:ident => $body:expr) => {
        match $any {
            AnyVolume::U8($v) => $body,
            AnyVolume::U16($v) => $body,
            AnyVolume::U32($v) => $body,
            AnyVolume::I32($v) => $body,
            AnyVolume::F32($v) => $body,
            AnyVolume::F64($v) => $body,
        }
    };
}

/// Runs `$body` with `$t` aliased to the Rust type of `$dtype`, wrapping
/// the result in the matching [`AnyVolume`] variant.
macro_rules! for_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            Dtype::U8 => {
                type $t = u8;
                AnyVolume::U8($body)
            }
            Dtype::U16 => {
                type $t = u16;
                AnyVolume::U16($body)
            }
            Dtype::U32 => {
                type $t = u32;
                AnyVolume::U32($body)
            }
            Dtype::I32 => {
                type $t = i32;
                AnyVolume::I32($body)
            }
            Dtype::F32 => {
                type $t = f32;
                AnyVolume::F32($body)
            }
            Dtype::F64 => {
                type $t = f64;
                AnyVolume::F64($body)
            }
        }
    };
}

impl AnyVolume {
    /// Storage type of the voxels.
    pub fn dtype(&self) -> Dtype {
        match self {
            AnyVolume::U8(_) => Dtype::U8,
            AnyVolume::U16(_) => Dtype::U16,
            AnyVolume::U32(_) => Dtype::U32,
            AnyVolume::I32(_) => Dtype::I32,
            AnyVolume::F32(_) => Dtype::F32,
            AnyVolume::F64(_) => Dtype::F64,
        }
    }

    pub fn spec(&self) -> &GridSpec {
        with_volume!(self, v => v.spec())
    }

    pub fn shapes(&self) -> &[ShapeDescriptor] {
        with_volume!(self, v => v.shapes())
    }

    pub fn policy(&self) -> CompositePolicy {
        with_volume!(self, v => v.policy())
    }

    /// Number of voxels that differ from the background.
    pub fn count_not_background(&self) -> usize {
        with_volume!(self, v => v.count_not_background())
    }

    /// Voxel counts per distinct value.
    pub fn histogram(&self) -> Vec<(f64, usize)> {
        with_volume!(self, v => v.histogram())
    }

    /// Writes the volume to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        with_volume!(self, v => basicshapes_io::write(v, path))
    }
}

/// Assembles `shapes` into a volume stored as `dtype`.
pub fn generate(
    shapes: Vec<ShapeDescriptor>,
    grid: &GridSpec,
    policy: CompositePolicy,
    options: &RasterOptions,
    dtype: Dtype,
) -> Result<AnyVolume> {
    Ok(for_dtype!(dtype, T => assemble::<T>(shapes, grid, policy, options)?))
}

/// Reads a volume file, whatever voxel type it stores.
pub fn read_any(path: impl AsRef<Path>) -> Result<AnyVolume> {
    let path = path.as_ref();
    let info = basicshapes_io::read_info(path)?;
    Ok(for_dtype!(info.dtype, T => basicshapes_io::read::<T>(path)?))
}
