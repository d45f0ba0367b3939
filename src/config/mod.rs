//! Configuration types for the object counting pipeline.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::quantize::{
    Binning, Quantizer, MAX_DECIMAL_PLACES, SPATIAL_BINNING, VELOCITY_BINNING,
};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("eps must be a positive finite number, got {0}")]
    InvalidEps(f32),

    #[error("min_samples must be at least 1, got {0}")]
    InvalidMinSamples(usize),

    #[error("{name} binning uses {places} decimal places, at most {max} are supported")]
    InvalidBinning {
        name: &'static str,
        places: u32,
        max: u32,
    },

    #[error("deadline_secs must be a positive finite number, got {0}")]
    InvalidDeadline(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Parameters for noise filtering, clustering and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingConfig {
    /// Minimum neighbours (including the point itself) for a DBSCAN core point
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// DBSCAN neighbourhood radius in (x, y, z, v) space
    #[serde(default = "default_eps")]
    pub eps: f32,

    /// A quantized position seen more than this many times is static noise
    #[serde(default = "default_thresh")]
    pub thresh: usize,

    /// Binning for noise map keys and clustering coordinates
    #[serde(default = "default_spatial_binning")]
    pub spatial_binning: Binning,

    /// Binning for velocity floor statistics
    #[serde(default = "default_velocity_binning")]
    pub velocity_binning: Binning,

    /// Optional wall-clock limit for a whole sequence
    #[serde(default)]
    pub deadline_secs: Option<f64>,
}

fn default_min_samples() -> usize {
    4
}

fn default_eps() -> f32 {
    3.0
}

fn default_thresh() -> usize {
    30
}

fn default_spatial_binning() -> Binning {
    SPATIAL_BINNING
}

fn default_velocity_binning() -> Binning {
    VELOCITY_BINNING
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            eps: default_eps(),
            thresh: default_thresh(),
            spatial_binning: default_spatial_binning(),
            velocity_binning: default_velocity_binning(),
            deadline_secs: None,
        }
    }
}

impl CountingConfig {
    /// Reject out-of-range parameters. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ConfigError::InvalidEps(self.eps));
        }
        if self.min_samples < 1 {
            return Err(ConfigError::InvalidMinSamples(self.min_samples));
        }
        check_binning("spatial", self.spatial_binning)?;
        check_binning("velocity", self.velocity_binning)?;
        if let Some(secs) = self.deadline_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::InvalidDeadline(secs));
            }
        }
        Ok(())
    }

    pub fn spatial_quantizer(&self) -> Quantizer {
        Quantizer::new(self.spatial_binning)
    }

    pub fn velocity_quantizer(&self) -> Quantizer {
        Quantizer::new(self.velocity_binning)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs_f64)
    }
}

fn check_binning(name: &'static str, binning: Binning) -> Result<(), ConfigError> {
    match binning {
        Binning::Decimals { places } if places > MAX_DECIMAL_PLACES => {
            Err(ConfigError::InvalidBinning {
                name,
                places,
                max: MAX_DECIMAL_PLACES,
            })
        }
        _ => Ok(()),
    }
}

/// Axes drawn on a frame plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlotAxes {
    /// 3-D projection with z up
    #[default]
    Xyz,
    Xy,
    Xz,
    Yz,
}

impl PlotAxes {
    /// Column indices (into x, y, z) of the horizontal and vertical axes of a
    /// 2-D plot; `None` for the 3-D projection.
    pub fn columns(&self) -> Option<(usize, usize)> {
        match self {
            PlotAxes::Xyz => None,
            PlotAxes::Xy => Some((0, 1)),
            PlotAxes::Xz => Some((0, 2)),
            PlotAxes::Yz => Some((1, 2)),
        }
    }
}

/// What determines a plotted point's colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorKey {
    #[default]
    Velocity,
    Cluster,
}

/// Configuration for frame plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default)]
    pub axes: PlotAxes,

    #[serde(default)]
    pub color: ColorKey,

    /// Maximum points per plot (subsampled beyond this)
    #[serde(default = "default_plot_max_points")]
    pub max_points: usize,

    #[serde(default = "default_plot_width")]
    pub width: u32,

    #[serde(default = "default_plot_height")]
    pub height: u32,
}

fn default_plot_max_points() -> usize {
    100_000
}

fn default_plot_width() -> u32 {
    800
}

fn default_plot_height() -> u32 {
    800
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            axes: PlotAxes::default(),
            color: ColorKey::default(),
            max_points: default_plot_max_points(),
            width: default_plot_width(),
            height: default_plot_height(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub counting: CountingConfig,

    #[serde(default)]
    pub plotting: PlotConfig,
}

impl PipelineConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.counting.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_counting_config() {
        let config = CountingConfig::default();
        assert_eq!(config.min_samples, 4);
        assert_eq!(config.eps, 3.0);
        assert_eq!(config.thresh, 30);
        assert_eq!(config.spatial_binning, Binning::Decimals { places: 1 });
        assert_eq!(config.velocity_binning, Binning::Decimals { places: 2 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_eps() {
        for eps in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = CountingConfig {
                eps,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidEps(_))));
        }
    }

    #[test]
    fn test_rejects_zero_min_samples() {
        let config = CountingConfig {
            min_samples: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMinSamples(0))
        ));
    }

    #[test]
    fn test_rejects_excessive_precision_and_bad_deadline() {
        let config = CountingConfig {
            spatial_binning: Binning::Decimals { places: 12 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBinning { name: "spatial", .. })
        ));

        let config = CountingConfig {
            deadline_secs: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDeadline(_))
        ));
    }

    #[test]
    fn test_yaml_partial_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "counting:\n  eps: 1.5\n  spatial_binning:\n    mode: quarter\nplotting:\n  axes: xz\n",
        )
        .unwrap();

        let config = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(config.counting.eps, 1.5);
        assert_eq!(config.counting.min_samples, 4);
        assert_eq!(config.counting.spatial_binning, Binning::Quarter);
        assert_eq!(config.plotting.axes, PlotAxes::Xz);
        assert_eq!(config.plotting.color, ColorKey::Velocity);
    }

    #[test]
    fn test_yaml_negative_thresh_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "counting:\n  thresh: -1\n").unwrap();

        assert!(matches!(
            PipelineConfig::from_yaml(&path),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_plot_axes() {
        assert_eq!(PlotConfig::default().axes, PlotAxes::Xyz);
        assert_eq!(PlotAxes::Xyz.columns(), None);
        assert_eq!(PlotAxes::Yz.columns(), Some((1, 2)));
    }

    #[test]
    fn test_yaml_invalid_eps_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "counting:\n  eps: -1.0\n").unwrap();

        assert!(matches!(
            PipelineConfig::from_yaml(&path),
            Err(ConfigError::InvalidEps(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = PipelineConfig::default();
        config.counting.deadline_secs = Some(2.5);
        config.plotting.color = ColorKey::Cluster;

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
