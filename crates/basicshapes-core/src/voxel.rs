//! Scalar element types a volume can be stored as.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapesError};

/// Storage type tag of a volume's voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// Unsigned 8-bit, the usual choice for label maps.
    #[default]
    U8,
    U16,
    U32,
    I32,
    F32,
    F64,
}

impl Dtype {
    /// All supported types, in tag order.
    pub const ALL: [Dtype; 6] = [
        Dtype::U8,
        Dtype::U16,
        Dtype::U32,
        Dtype::I32,
        Dtype::F32,
        Dtype::F64,
    ];

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Dtype::U8 => 1,
            Dtype::U16 => 2,
            Dtype::U32 | Dtype::I32 | Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }

    /// Short lowercase name (`"u8"`, `"f32"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Dtype::U8 => "u8",
            Dtype::U16 => "u16",
            Dtype::U32 => "u32",
            Dtype::I32 => "i32",
            Dtype::F32 => "f32",
            Dtype::F64 => "f64",
        }
    }

    /// Stable on-disk tag.
    pub fn tag(self) -> u8 {
        match self {
            Dtype::U8 => 1,
            Dtype::U16 => 2,
            Dtype::U32 => 3,
            Dtype::I32 => 4,
            Dtype::F32 => 5,
            Dtype::F64 => 6,
        }
    }

    /// Inverse of [`Dtype::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.tag() == tag)
    }

    /// Parses a short name as produced by [`Dtype::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar type voxels can be stored as.
///
/// Labels and backgrounds are given as `f64` and converted with
/// [`Voxel::from_label`], which refuses values the type cannot hold exactly.
pub trait Voxel:
    bytemuck::Pod + PartialEq + PartialOrd + Send + Sync + fmt::Debug + 'static
{
    /// Storage tag of this type.
    const DTYPE: Dtype;

    /// Exact conversion from a label value, `None` if not representable.
    fn from_label(value: f64) -> Option<Self>;

    /// Widening conversion used for reporting.
    fn to_f64(self) -> f64;

    /// Addition that reports overflow as `None`. Float types never overflow here.
    fn checked_accumulate(self, other: Self) -> Option<Self>;

    /// Larger of the two values.
    fn max_value(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }
}

macro_rules! impl_int_voxel {
    ($ty:ty, $dtype:expr) => {
        impl Voxel for $ty {
            const DTYPE: Dtype = $dtype;

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn from_label(value: f64) -> Option<Self> {
                if !value.is_finite()
                    || value.fract() != 0.0
                    || value < f64::from(<$ty>::MIN)
                    || value > f64::from(<$ty>::MAX)
                {
                    return None;
                }
                Some(value as $ty)
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            fn checked_accumulate(self, other: Self) -> Option<Self> {
                self.checked_add(other)
            }
        }
    };
}

impl_int_voxel!(u8, Dtype::U8);
impl_int_voxel!(u16, Dtype::U16);
impl_int_voxel!(u32, Dtype::U32);
impl_int_voxel!(i32, Dtype::I32);

impl Voxel for f32 {
    const DTYPE: Dtype = Dtype::F32;

    #[allow(clippy::cast_possible_truncation)]
    fn from_label(value: f64) -> Option<Self> {
        let narrowed = value as f32;
        (value.is_finite() && f64::from(narrowed) == value).then_some(narrowed)
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn checked_accumulate(self, other: Self) -> Option<Self> {
        Some(self + other)
    }
}

impl Voxel for f64 {
    const DTYPE: Dtype = Dtype::F64;

    fn from_label(value: f64) -> Option<Self> {
        value.is_finite().then_some(value)
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn checked_accumulate(self, other: Self) -> Option<Self> {
        Some(self + other)
    }
}

/// Converts a shape label into `T`, failing with `InvalidShape`.
pub fn label_as<T: Voxel>(label: f64) -> Result<T> {
    T::from_label(label).ok_or_else(|| {
        ShapesError::invalid_shape(format!(
            "label {label} is not representable as {}",
            T::DTYPE
        ))
    })
}
