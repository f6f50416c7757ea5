//! Rasterization and compositing options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShapesError;

/// Rule for resolving voxels covered by more than one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompositePolicy {
    /// Later shapes replace earlier ones (order dependent).
    #[default]
    Overwrite,
    /// Keep the larger of the existing value and the new label.
    Max,
    /// Sum labels of all covering shapes.
    Add,
}

impl CompositePolicy {
    /// Lowercase name as stored in files.
    pub fn name(self) -> &'static str {
        match self {
            CompositePolicy::Overwrite => "overwrite",
            CompositePolicy::Max => "max",
            CompositePolicy::Add => "add",
        }
    }
}

impl fmt::Display for CompositePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompositePolicy {
    type Err = ShapesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(CompositePolicy::Overwrite),
            "max" => Ok(CompositePolicy::Max),
            "add" => Ok(CompositePolicy::Add),
            other => Err(ShapesError::Config(format!(
                "unknown compositing policy '{other}' (expected overwrite, max or add)"
            ))),
        }
    }
}

/// Options shared by the rasterizer and the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Value of voxels no shape covers.
    pub background: f64,
    /// Rasterize shapes on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            background: 0.0,
            parallel: true,
        }
    }
}

impl RasterOptions {
    /// Sets the background value.
    #[must_use]
    pub fn with_background(mut self, background: f64) -> Self {
        self.background = background;
        self
    }

    /// Enables or disables parallel rasterization.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_names_roundtrip() {
        for policy in [
            CompositePolicy::Overwrite,
            CompositePolicy::Max,
            CompositePolicy::Add,
        ] {
            assert_eq!(policy.name().parse::<CompositePolicy>().unwrap(), policy);
        }
        assert!("union".parse::<CompositePolicy>().is_err());
    }

    #[test]
    fn test_defaults() {
        let options = RasterOptions::default();
        assert_eq!(options.background, 0.0);
        assert!(options.parallel);
        assert_eq!(CompositePolicy::default(), CompositePolicy::Overwrite);
    }

    #[test]
    fn test_options_deserialize_with_missing_fields() {
        let options: RasterOptions = serde_json::from_str(r#"{"background": 2.0}"#).unwrap();
        assert_eq!(options.background, 2.0);
        assert!(options.parallel);
    }
}
