use crate::generator::profile::ScenarioConfig;
use anyhow::Context;
use radar_core::prelude::CoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub core: CoreConfig,
    pub scenario: ScenarioConfig,
    pub frames: usize,
    pub output_dir: PathBuf,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::from_args(false, 12, PathBuf::from("tools/data"))
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .core
            .validate()
            .with_context(|| format!("validating core section of {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(quick: bool, frames: usize, output_dir: PathBuf) -> Self {
        let (core, scenario) = if quick {
            (CoreConfig::quick(), ScenarioConfig::quick())
        } else {
            (CoreConfig::full(), ScenarioConfig::default())
        };
        Self {
            core,
            scenario,
            frames,
            output_dir,
        }
    }

    pub fn is_quick(&self) -> bool {
        self.core.geometry == CoreConfig::quick().geometry
    }

    pub fn detection_log_path(&self) -> PathBuf {
        let name = if self.is_quick() {
            "ADR_quick_det.txt"
        } else {
            "ADR_detections.txt"
        };
        self.output_dir.join(name)
    }

    pub fn track_log_path(&self) -> PathBuf {
        let name = if self.is_quick() {
            "ADR_quick_trk.txt"
        } else {
            "ADR_tracks.txt"
        };
        self.output_dir.join(name)
    }
}
