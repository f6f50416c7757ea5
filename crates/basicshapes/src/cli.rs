//! Command-line front end.

use std::collections::HashMap;
use std::fmt::Write as _;

use basicshapes_core::{
    CompositePolicy, DVec3, Dtype, GridSpec, RasterOptions, Result, Rotation, ShapeDescriptor,
    ShapeKind, ShapesError, UVec3,
};

use crate::scene::SceneConfig;
use crate::volume::{generate, read_any, AnyVolume};

/// Flag name to raw value.
pub type Flags = HashMap<String, String>;

/// Flags every shape command accepts.
const COMMON_SHAPE_FLAGS: [&str; 8] = [
    "--output",
    "--grid",
    "--spacing",
    "--origin",
    "--dtype",
    "--center",
    "--label",
    "--rotate-deg",
];

const SCENE_FLAGS: [&str; 2] = ["--config", "--output"];

/// Runs the command line `args` (without the program name).
pub fn run(args: &[String]) -> Result<()> {
    let Some(command) = args.first() else {
        print_usage();
        return Err(ShapesError::Config("no command given".into()));
    };
    match command.as_str() {
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "scene" => run_scene(&parse_flags(&args[1..])?),
        "info" => match &args[1..] {
            [path] => run_info(path),
            _ => Err(ShapesError::Config("usage: basicshapes info <path>".into())),
        },
        kind if ShapeKind::NAMES.contains(&kind) => run_shape(kind, &parse_flags(&args[1..])?),
        other => {
            print_usage();
            Err(ShapesError::Config(format!("unknown command '{other}'")))
        }
    }
}

fn run_shape(kind: &str, flags: &Flags) -> Result<()> {
    check_shape_flags(kind, flags)?;
    let output = required_str(flags, "--output")?;
    let grid = grid_from_flags(flags)?;
    let dtype = dtype_from_flags(flags)?;
    let shape = shape_from_flags(kind, flags, &grid)?;
    log::info!("generating {shape}");
    let volume = generate(
        vec![shape],
        &grid,
        CompositePolicy::Overwrite,
        &RasterOptions::default(),
        dtype,
    )?;
    volume.write(output)
}

fn run_scene(flags: &Flags) -> Result<()> {
    check_flags(flags, &SCENE_FLAGS)?;
    let config = required_str(flags, "--config")?;
    let output = required_str(flags, "--output")?;
    let volume = SceneConfig::load(config)?.generate()?;
    volume.write(output)
}

fn run_info(path: &str) -> Result<()> {
    let volume = read_any(path)?;
    print!("{}", describe(path, &volume));
    Ok(())
}

/// Human-readable summary of a volume file.
pub fn describe(path: &str, volume: &AnyVolume) -> String {
    let spec = volume.spec();
    let mut out = String::new();
    let _ = writeln!(out, "file:       {path}");
    let _ = writeln!(out, "dtype:      {}", volume.dtype());
    let _ = writeln!(
        out,
        "dimensions: {}x{}x{}",
        spec.dimensions.x, spec.dimensions.y, spec.dimensions.z
    );
    let _ = writeln!(out, "spacing:    {}", spec.spacing);
    let _ = writeln!(out, "origin:     {}", spec.origin);
    let _ = writeln!(out, "policy:     {}", volume.policy());
    let _ = writeln!(out, "shapes:     {}", volume.shapes().len());
    for (position, shape) in volume.shapes().iter().enumerate() {
        let _ = writeln!(out, "  #{position}: {shape}");
    }
    let _ = writeln!(out, "values:");
    for (value, count) in volume.histogram() {
        let _ = writeln!(out, "  {value}: {count}");
    }
    out
}

/// Parses `--flag value` pairs.
pub fn parse_flags(args: &[String]) -> Result<Flags> {
    if args.len() % 2 != 0 {
        return Err(ShapesError::Config("expected flag-value pairs".into()));
    }
    let mut flags = HashMap::new();
    for pair in args.chunks_exact(2) {
        let flag = pair[0].as_str();
        if !flag.starts_with("--") {
            return Err(ShapesError::Config(format!("expected a flag, got '{flag}'")));
        }
        if flags.insert(flag.to_string(), pair[1].clone()).is_some() {
            return Err(ShapesError::Config(format!("duplicate flag {flag}")));
        }
    }
    Ok(flags)
}

/// Rejects the first flag, in name order, that is not in `allowed`.
pub fn check_flags(flags: &Flags, allowed: &[&str]) -> Result<()> {
    let mut unknown: Vec<&str> = flags
        .keys()
        .map(String::as_str)
        .filter(|flag| !allowed.contains(flag))
        .collect();
    unknown.sort_unstable();
    match unknown.first() {
        Some(flag) => Err(ShapesError::Config(format!("unknown flag {flag}"))),
        None => Ok(()),
    }
}

/// Parameter flags of each shape kind.
fn kind_flags(kind: &str) -> Result<&'static [&'static str]> {
    let flags: &'static [&'static str] = match kind {
        "sphere" => &["--radius"],
        "ellipsoid" => &["--radii"],
        "cylinder" | "capsule" => &["--radius", "--half-length"],
        "cuboid" => &["--half-extents"],
        "torus" => &["--major-radius", "--minor-radius"],
        other => return Err(ShapesError::Config(format!("unknown shape kind '{other}'"))),
    };
    Ok(flags)
}

fn check_shape_flags(kind: &str, flags: &Flags) -> Result<()> {
    let mut allowed = COMMON_SHAPE_FLAGS.to_vec();
    allowed.extend_from_slice(kind_flags(kind)?);
    check_flags(flags, &allowed)
}

fn required_str<'a>(flags: &'a Flags, key: &str) -> Result<&'a str> {
    flags
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ShapesError::Config(format!("missing required {key}")))
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|err| ShapesError::Config(format!("invalid number for {key}: {err}")))
}

fn required_f64(flags: &Flags, key: &str) -> Result<f64> {
    parse_f64(key, required_str(flags, key)?)
}

fn optional_f64(flags: &Flags, key: &str, default: f64) -> Result<f64> {
    flags
        .get(key)
        .map_or(Ok(default), |value| parse_f64(key, value))
}

/// Parses a comma-separated triple such as `1,2.5,3`.
fn parse_triple(key: &str, value: &str) -> Result<[f64; 3]> {
    let parts = value
        .split(',')
        .map(|part| parse_f64(key, part))
        .collect::<Result<Vec<_>>>()?;
    <[f64; 3]>::try_from(parts).map_err(|parts| {
        ShapesError::Config(format!("{key} needs 3 comma-separated values, got {}", parts.len()))
    })
}

fn required_vec3(flags: &Flags, key: &str) -> Result<DVec3> {
    parse_triple(key, required_str(flags, key)?).map(DVec3::from_array)
}

fn optional_vec3(flags: &Flags, key: &str) -> Result<Option<DVec3>> {
    flags
        .get(key)
        .map(|value| parse_triple(key, value).map(DVec3::from_array))
        .transpose()
}

/// Builds the grid from `--grid`, `--spacing` and `--origin`.
pub fn grid_from_flags(flags: &Flags) -> Result<GridSpec> {
    let mut grid = GridSpec::default();
    if let Some(value) = flags.get("--grid") {
        let dims = value
            .split(',')
            .map(|part| {
                part.trim().parse::<u32>().map_err(|err| {
                    ShapesError::Config(format!("invalid dimension for --grid: {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let dims = <[u32; 3]>::try_from(dims).map_err(|_| {
            ShapesError::Config("--grid needs 3 comma-separated dimensions".into())
        })?;
        grid.dimensions = UVec3::from_array(dims);
    }
    if let Some(spacing) = optional_vec3(flags, "--spacing")? {
        grid.spacing = spacing;
    }
    if let Some(origin) = optional_vec3(flags, "--origin")? {
        grid.origin = origin;
    }
    grid.validate()?;
    Ok(grid)
}

fn dtype_from_flags(flags: &Flags) -> Result<Dtype> {
    match flags.get("--dtype") {
        None => Ok(Dtype::default()),
        Some(name) => Dtype::from_name(name).ok_or_else(|| {
            ShapesError::Config(format!(
                "unknown --dtype '{name}', expected one of {}",
                Dtype::ALL.map(Dtype::name).join(", ")
            ))
        }),
    }
}

/// Builds a single shape of `kind` from its flags. The centre defaults to the
/// middle of `grid`. Flags the command does not know are rejected.
pub fn shape_from_flags(kind: &str, flags: &Flags, grid: &GridSpec) -> Result<ShapeDescriptor> {
    check_shape_flags(kind, flags)?;
    let kind = match kind {
        "sphere" => ShapeKind::Sphere {
            radius: required_f64(flags, "--radius")?,
        },
        "ellipsoid" => ShapeKind::Ellipsoid {
            radii: required_vec3(flags, "--radii")?.to_array(),
        },
        "cylinder" => ShapeKind::Cylinder {
            radius: required_f64(flags, "--radius")?,
            half_length: required_f64(flags, "--half-length")?,
        },
        "cuboid" => ShapeKind::Cuboid {
            half_extents: required_vec3(flags, "--half-extents")?.to_array(),
        },
        "torus" => ShapeKind::Torus {
            major_radius: required_f64(flags, "--major-radius")?,
            minor_radius: required_f64(flags, "--minor-radius")?,
        },
        "capsule" => ShapeKind::Capsule {
            radius: required_f64(flags, "--radius")?,
            half_length: required_f64(flags, "--half-length")?,
        },
        other => return Err(ShapesError::Config(format!("unknown shape kind '{other}'"))),
    };
    let center = optional_vec3(flags, "--center")?.unwrap_or_else(|| grid.center());
    let label = optional_f64(flags, "--label", 1.0)?;
    let mut shape = ShapeDescriptor::new(kind, center, label);
    if let Some(degrees) = optional_vec3(flags, "--rotate-deg")? {
        shape = shape.with_rotation(Rotation::EulerDegrees(degrees.to_array()).to_quat()?);
    }
    shape.validate()?;
    Ok(shape)
}

fn print_usage() {
    eprintln!("Usage:");
    for kind in ShapeKind::NAMES {
        eprintln!("  basicshapes {kind} [shape flags] [grid flags] --output <path>");
    }
    eprintln!("  basicshapes scene --config <file.json> --output <path>");
    eprintln!("  basicshapes info <path>");
    eprintln!();
    eprintln!("Grid flags:");
    eprintln!("  --grid nx,ny,nz        (default 64,64,64)");
    eprintln!("  --spacing sx,sy,sz     (default 1,1,1)");
    eprintln!("  --origin ox,oy,oz      (default 0,0,0)");
    eprintln!("  --dtype u8|u16|u32|i32|f32|f64 (default u8)");
    eprintln!();
    eprintln!("Shape flags:");
    eprintln!("  --center x,y,z         (default grid centre)");
    eprintln!("  --label <f64>          (default 1)");
    eprintln!("  --rotate-deg rx,ry,rz  (XYZ Euler angles)");
    eprintln!("  sphere:    --radius");
    eprintln!("  ellipsoid: --radii a,b,c");
    eprintln!("  cylinder:  --radius --half-length");
    eprintln!("  cuboid:    --half-extents a,b,c");
    eprintln!("  torus:     --major-radius --minor-radius");
    eprintln!("  capsule:   --radius --half-length");
}
