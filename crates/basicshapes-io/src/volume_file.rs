//! Reading and writing composite volumes.
//!
//! Layout inside the container:
//!
//! ```text
//! /                      generator, policy, dtype
//! /volume   (dataset)    dims [nx, ny, nz]; spacing, origin, background
//! /shapes   (group)      count
//! /shapes/shape_NNNN     kind, center, parameters, label, rotation (optional)
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use basicshapes_core::{
    CompositePolicy, CompositeVolume, DQuat, DVec3, Dtype, GridSpec, Result, ShapeDescriptor,
    ShapeKind, ShapesError, UVec3, Voxel, VolumeGrid,
};

use crate::container::{decode, encode, AttrValue, Attributes, Dataset, Group};

/// Value of the root `generator` attribute.
pub const GENERATOR: &str = "basicshapes";

const VOLUME: &str = "volume";
const SHAPES: &str = "shapes";

/// Metadata of a volume file, readable without knowing its voxel type.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInfo {
    pub dtype: Dtype,
    pub spec: GridSpec,
    pub policy: CompositePolicy,
    pub background: f64,
    pub shapes: Vec<ShapeDescriptor>,
}

/// Writes `volume` to `path`.
///
/// The file is written next to its destination under a temporary name and
/// renamed into place, so a failed write never leaves a partial file.
///
/// Every shape is validated first, and the background must convert back
/// exactly from the stored `f64`. Nothing is created on disk if either fails.
pub fn write<T: Voxel>(volume: &CompositeVolume<T>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    validate(volume)?;
    let root = to_container(volume)?;
    let tmp = temp_path(path)?;

    let written = write_container(&root, &tmp, path);
    if let Err(e) = written {
        // The temporary may not exist if creation itself failed.
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ShapesError::io(path, e)
    })?;

    log::info!(
        "wrote {} ({} voxels of {}, {} shapes)",
        path.display(),
        volume.data().len(),
        T::DTYPE,
        volume.shapes().len()
    );
    Ok(())
}

/// Reads a volume of voxel type `T` from `path`.
pub fn read<T: Voxel>(path: impl AsRef<Path>) -> Result<CompositeVolume<T>> {
    let path = path.as_ref();
    let bytes = load(path)?;
    let root = decode(&bytes).map_err(|e| ShapesError::corrupt(path, e.to_string()))?;
    let info = parse_info(&root, path)?;
    if info.dtype != T::DTYPE {
        return Err(ShapesError::DtypeMismatch {
            expected: T::DTYPE,
            found: info.dtype,
        });
    }

    let corrupt = |reason: &str| ShapesError::corrupt(path, reason);
    let dataset = root
        .dataset(VOLUME)
        .ok_or_else(|| corrupt("missing volume dataset"))?;
    let values = dataset
        .values::<T>()
        .ok_or_else(|| corrupt("volume payload does not decode"))?;
    let grid = VolumeGrid::from_data(info.spec, values)
        .map_err(|e| ShapesError::corrupt(path, e.to_string()))?;
    let background = T::from_label(info.background).ok_or_else(|| {
        corrupt("background is not representable in the stored voxel type")
    })?;

    log::info!(
        "read {} ({} voxels of {}, {} shapes)",
        path.display(),
        grid.data().len(),
        T::DTYPE,
        info.shapes.len()
    );
    Ok(CompositeVolume::from_parts(
        grid,
        info.shapes,
        info.policy,
        background,
    ))
}

/// Reads only the metadata of a volume file.
pub fn read_info(path: impl AsRef<Path>) -> Result<VolumeInfo> {
    let path = path.as_ref();
    let bytes = load(path)?;
    let root = decode(&bytes).map_err(|e| ShapesError::corrupt(path, e.to_string()))?;
    parse_info(&root, path)
}

fn validate<T: Voxel>(volume: &CompositeVolume<T>) -> Result<()> {
    for (position, shape) in volume.shapes().iter().enumerate() {
        shape.validate().map_err(|e| e.at_shape(position))?;
    }
    let background = volume.background().to_f64();
    if T::from_label(background).is_none() {
        return Err(ShapesError::Config(format!(
            "background {background} cannot be stored as {}",
            T::DTYPE
        )));
    }
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        ShapesError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

/// Encodes `root` into `tmp`. Errors name `path`, the file the caller asked for.
fn write_container(root: &Group<'_>, tmp: &Path, path: &Path) -> Result<()> {
    let file = File::create(tmp).map_err(|e| ShapesError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    encode(root, &mut writer).map_err(|e| ShapesError::io(path, e))?;
    writer.flush().map_err(|e| ShapesError::io(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| ShapesError::io(path, e))
}

fn load(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| ShapesError::io(path, e))
}

// =============================================================================
// VOLUME -> CONTAINER
// =============================================================================

fn to_container<T: Voxel>(volume: &CompositeVolume<T>) -> Result<Group<'_>> {
    let spec = volume.spec();
    let mut root = Group::new("");
    root.attrs.set("generator", AttrValue::Text(GENERATOR.into()));
    root.attrs
        .set("policy", AttrValue::Text(volume.policy().name().into()));
    root.attrs.set("dtype", AttrValue::Text(T::DTYPE.name().into()));

    let dims = spec.dimensions.to_array().map(u64::from).to_vec();
    let mut dataset = Dataset::from_values(VOLUME, dims, volume.data());
    dataset
        .attrs
        .set("spacing", AttrValue::FloatArray(spec.spacing.to_array().to_vec()));
    dataset
        .attrs
        .set("origin", AttrValue::FloatArray(spec.origin.to_array().to_vec()));
    dataset
        .attrs
        .set("background", AttrValue::Float(volume.background().to_f64()));
    root.add_dataset(dataset);

    let mut shapes = Group::new(SHAPES);
    shapes.attrs.set(
        "count",
        AttrValue::Int(i64::try_from(volume.shapes().len()).map_err(|_| {
            ShapesError::Config("too many shapes to record".into())
        })?),
    );
    for (position, shape) in volume.shapes().iter().enumerate() {
        shapes.add_group(shape_record(position, shape));
    }
    root.add_group(shapes);
    Ok(root)
}

fn shape_record(position: usize, shape: &ShapeDescriptor) -> Group<'static> {
    let mut group = Group::new(format!("shape_{position:04}"));
    group
        .attrs
        .set("kind", AttrValue::Text(shape.kind.name().into()));
    group
        .attrs
        .set("center", AttrValue::FloatArray(shape.center.to_array().to_vec()));
    group
        .attrs
        .set("parameters", AttrValue::FloatArray(shape.kind.parameters()));
    group.attrs.set("label", AttrValue::Float(shape.label));
    if let Some(q) = shape.rotation {
        group
            .attrs
            .set("rotation", AttrValue::FloatArray(q.to_array().to_vec()));
    }
    group
}

// =============================================================================
// CONTAINER -> VOLUME
// =============================================================================

fn text<'a>(attrs: &'a Attributes, name: &str) -> std::result::Result<&'a str, String> {
    match attrs.get(name) {
        Some(AttrValue::Text(s)) => Ok(s.as_str()),
        Some(other) => Err(format!("attribute '{name}' is {}, expected text", other.type_name())),
        None => Err(format!("missing attribute '{name}'")),
    }
}

fn float(attrs: &Attributes, name: &str) -> std::result::Result<f64, String> {
    match attrs.get(name) {
        Some(AttrValue::Float(v)) => Ok(*v),
        Some(other) => Err(format!("attribute '{name}' is {}, expected float", other.type_name())),
        None => Err(format!("missing attribute '{name}'")),
    }
}

fn floats<'a>(attrs: &'a Attributes, name: &str) -> std::result::Result<&'a [f64], String> {
    match attrs.get(name) {
        Some(AttrValue::FloatArray(v)) => Ok(v.as_slice()),
        Some(other) => Err(format!(
            "attribute '{name}' is {}, expected float array",
            other.type_name()
        )),
        None => Err(format!("missing attribute '{name}'")),
    }
}

fn vec3(attrs: &Attributes, name: &str) -> std::result::Result<DVec3, String> {
    let values = floats(attrs, name)?;
    <[f64; 3]>::try_from(values)
        .map(DVec3::from_array)
        .map_err(|_| format!("attribute '{name}' has {} values, expected 3", values.len()))
}

fn parse_info(root: &Group, path: &Path) -> Result<VolumeInfo> {
    parse_info_inner(root).map_err(|reason| ShapesError::corrupt(path, reason))
}

fn parse_info_inner(root: &Group) -> std::result::Result<VolumeInfo, String> {
    let generator = text(&root.attrs, "generator")?;
    if generator != GENERATOR {
        return Err(format!("unexpected generator '{generator}'"));
    }
    let policy = text(&root.attrs, "policy")?
        .parse::<CompositePolicy>()
        .map_err(|e| e.to_string())?;
    let dtype_name = text(&root.attrs, "dtype")?;
    let dtype =
        Dtype::from_name(dtype_name).ok_or_else(|| format!("unknown dtype '{dtype_name}'"))?;

    let dataset = root
        .dataset(VOLUME)
        .ok_or_else(|| "missing volume dataset".to_string())?;
    if dataset.dtype != dtype {
        return Err(format!(
            "volume dataset stores {} but root declares {dtype}",
            dataset.dtype
        ));
    }
    let dims: [u64; 3] = dataset
        .dims
        .as_slice()
        .try_into()
        .map_err(|_| format!("volume has rank {}, expected 3", dataset.dims.len()))?;
    let dims = dims.map(|d| u32::try_from(d).unwrap_or(u32::MAX));
    let spec = GridSpec::new(UVec3::from_array(dims), vec3(&dataset.attrs, "spacing")?)
        .with_origin(vec3(&dataset.attrs, "origin")?);
    spec.validate().map_err(|e| e.to_string())?;
    let expected = spec.num_voxels() as u64;
    if dataset.element_count() != Some(expected) {
        return Err(format!(
            "volume payload does not hold {expected} voxels of {dtype}"
        ));
    }
    let background = float(&dataset.attrs, "background")?;

    let shapes_group = root
        .group(SHAPES)
        .ok_or_else(|| "missing shapes group".to_string())?;
    let shapes = shapes_group
        .groups()
        .enumerate()
        .map(|(position, record)| {
            parse_shape(record).map_err(|reason| format!("shape #{position}: {reason}"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match shapes_group.attrs.get("count") {
        Some(AttrValue::Int(n)) if usize::try_from(*n).ok() == Some(shapes.len()) => {}
        Some(AttrValue::Int(n)) => {
            return Err(format!(
                "shapes group declares {n} shapes but holds {}",
                shapes.len()
            ))
        }
        _ => return Err("missing integer attribute 'count' on shapes group".into()),
    }

    Ok(VolumeInfo {
        dtype,
        spec,
        policy,
        background,
        shapes,
    })
}

fn parse_shape(record: &Group) -> std::result::Result<ShapeDescriptor, String> {
    let attrs = &record.attrs;
    let kind = ShapeKind::from_parameters(text(attrs, "kind")?, floats(attrs, "parameters")?)
        .map_err(|e| e.to_string())?;
    let mut shape = ShapeDescriptor::new(kind, vec3(attrs, "center")?, float(attrs, "label")?);
    if attrs.get("rotation").is_some() {
        let q = floats(attrs, "rotation")?;
        let q = <[f64; 4]>::try_from(q)
            .map_err(|_| format!("rotation has {} values, expected 4", q.len()))?;
        shape = shape.with_rotation(DQuat::from_array(q));
    }
    shape.validate().map_err(|e| e.to_string())?;
    Ok(shape)
}
