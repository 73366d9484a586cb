//! Data structures for representing a planner configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;
use twinbank_layout::{
    layout::{ImageGeometry, PartitionPlan, UpdateMode},
    Anyhow,
};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "twinbank.toml";

/// Planner configuration.
///
/// The plan and update mode are kept as strings so that invalid values are reported by
/// the layout engine together with the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PlannerConfig {
    /// Size of the OS image in GiB.
    #[serde(default = "default_os_image_gib")]
    pub os_image_gib: u64,
    /// Size of the data image in GiB.
    #[serde(default = "default_data_image_gib")]
    pub data_image_gib: u64,
    /// Partition plan, `split` or `unified`.
    #[serde(default = "default_partition_plan")]
    pub partition_plan: String,
    /// Whether to create two banks, `yes` or `no`.
    #[serde(default = "default_update_mode")]
    pub update_mode: String,
}

fn default_os_image_gib() -> u64 {
    2
}

fn default_data_image_gib() -> u64 {
    20
}

fn default_partition_plan() -> String {
    "split".to_owned()
}

fn default_update_mode() -> String {
    "yes".to_owned()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            os_image_gib: default_os_image_gib(),
            data_image_gib: default_data_image_gib(),
            partition_plan: default_partition_plan(),
            update_mode: default_update_mode(),
        }
    }
}

impl PlannerConfig {
    /// Requested geometry.
    pub fn geometry(&self) -> ImageGeometry {
        ImageGeometry::new(self.os_image_gib, self.data_image_gib)
    }

    /// Validated partition plan.
    pub fn plan(&self) -> Anyhow<PartitionPlan> {
        Ok(self.partition_plan.parse()?)
    }

    /// Validated update mode.
    pub fn update_mode(&self) -> Anyhow<UpdateMode> {
        Ok(self.update_mode.parse()?)
    }
}

/// Load the configuration from the given file or the default file if it exists.
pub fn load_config(path: Option<&Path>) -> Anyhow<PlannerConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                debug!("no configuration file found, using defaults");
                return Ok(PlannerConfig::default());
            }
            default
        }
    };
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("unable to read configuration file {path:?}"))?;
    toml::from_str(&contents)
        .with_context(|| format!("unable to parse configuration file {path:?}"))
}
