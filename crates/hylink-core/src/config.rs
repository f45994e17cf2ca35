//! # Configuration System
//!
//! YAML configuration for a hybrid link testbed: framing of both links,
//! alignment, link decision, switching, measurement and logging.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `HYLINK_CONFIG` environment variable
//! 2. `./hylink.yaml` (current directory)
//! 3. the platform config directory, e.g. `~/.config/hylink/config.yaml`
//! 4. `/etc/hylink/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! packet_size: 500
//! link_1:
//!   label: "RF"
//!   samples_per_bit: 1
//! link_2:
//!   label: "FS"
//!   samples_per_bit: 4
//! hysteresis:
//!   initial_mode: backward
//! soft_switch:
//!   thresholds: [0.5, 1.5]
//!   shares_1: [1, 1, 3]
//!   shares_2: [3, 1, 1]
//! ```
//!
//! `packet_size` is set once at the top level; it overrides the
//! `packet_size` of every block section when block configs are derived.

use crate::aligner::{AlignerConfig, StreamAligner};
use crate::deframer::{Deframer, DeframerConfig};
use crate::framer::{Framer, FramerConfig};
use crate::hard_switch::{HardSwitchConfig, RxHardSwitch};
use crate::header::HeaderDescriptor;
use crate::hysteresis::{HysteresisConfig, HysteresisGate};
use crate::link_tester::{LinkTester, LinkTesterConfig};
use crate::observe::LogConfig;
use crate::quality_metre::{QualityMetre, QualityMetreConfig};
use crate::slicer::{Slicer, SlicerConfig};
use crate::soft_switch::{AllocationTable, SoftSwitchConfig};
use crate::source::{BitSource, SourceConfig};
use crate::step_gate::{StepGate, StepGateConfig};
use crate::types::{HybridError, LinkId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "HYLINK_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    ReadError(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(#[from] HybridError),

    #[error("inconsistent config: {0}")]
    Inconsistent(String),
}

/// Complete testbed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Configuration version
    pub version: String,
    /// Payload samples per packet, shared by every block
    pub packet_size: usize,
    /// Header of link 1 (e.g. RF)
    pub link_1: HeaderDescriptor,
    /// Header of link 2 (e.g. optical)
    pub link_2: HeaderDescriptor,
    /// Reject headers whose counter contradicts the sample clock
    pub verify_counter: bool,
    pub aligner: AlignerConfig,
    pub hysteresis: HysteresisConfig,
    pub step_gate: StepGateConfig,
    pub hard_switch: HardSwitchConfig,
    pub soft_switch: SoftSwitchConfig,
    pub link_tester: LinkTesterConfig,
    pub slicer: SlicerConfig,
    pub quality: QualityMetreConfig,
    pub source: SourceConfig,
    pub logging: LogConfig,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            packet_size: 1000,
            link_1: HeaderDescriptor::with_label("L1"),
            link_2: HeaderDescriptor::with_label("L2"),
            verify_counter: true,
            aligner: AlignerConfig::default(),
            hysteresis: HysteresisConfig::default(),
            step_gate: StepGateConfig::default(),
            hard_switch: HardSwitchConfig::default(),
            soft_switch: SoftSwitchConfig::default(),
            link_tester: LinkTesterConfig::default(),
            slicer: SlicerConfig::default(),
            quality: QualityMetreConfig::default(),
            source: SourceConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl HybridConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the default config if no file is found. A `HYLINK_CONFIG`
    /// that names a missing file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "{} points to {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Self::load_from(&path);
        }

        match Self::config_search_paths().iter().find(|p| p.exists()) {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./hylink.yaml")];
        if let Some(dirs) = directories::ProjectDirs::from("", "", "hylink") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }
        paths.push(PathBuf::from("/etc/hylink/config.yaml"));
        paths
    }

    pub fn header(&self, link: LinkId) -> &HeaderDescriptor {
        match link {
            LinkId::Link1 => &self.link_1,
            LinkId::Link2 => &self.link_2,
        }
    }

    pub fn framer(&self, link: LinkId) -> FramerConfig {
        FramerConfig {
            packet_size: self.packet_size,
            header: self.header(link).clone(),
            ..Default::default()
        }
    }

    pub fn deframer(&self, link: LinkId) -> DeframerConfig {
        DeframerConfig {
            packet_size: self.packet_size,
            header: self.header(link).clone(),
            verify_counter: self.verify_counter,
        }
    }

    /// Aligner settings; the counter width follows the link headers.
    pub fn aligner(&self) -> AlignerConfig {
        AlignerConfig {
            packet_size: self.packet_size,
            counter_width: self.link_1.counter_width,
            ..self.aligner.clone()
        }
    }

    pub fn hysteresis(&self) -> HysteresisConfig {
        HysteresisConfig {
            packet_size: self.packet_size,
            ..self.hysteresis.clone()
        }
    }

    pub fn step_gate(&self) -> StepGateConfig {
        StepGateConfig {
            packet_size: self.packet_size,
            ..self.step_gate.clone()
        }
    }

    pub fn hard_switch(&self) -> HardSwitchConfig {
        HardSwitchConfig {
            packet_size: self.packet_size,
            ..self.hard_switch.clone()
        }
    }

    pub fn soft_switch(&self) -> SoftSwitchConfig {
        SoftSwitchConfig {
            packet_size: self.packet_size,
            ..self.soft_switch.clone()
        }
    }

    pub fn quality(&self) -> QualityMetreConfig {
        QualityMetreConfig {
            packet_size: self.packet_size,
            ..self.quality.clone()
        }
    }

    pub fn source(&self) -> SourceConfig {
        SourceConfig {
            packet_size: self.packet_size,
            ..self.source.clone()
        }
    }

    /// Validate the configuration by building every block from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link_1.counter_width != self.link_2.counter_width {
            return Err(ConfigError::Inconsistent(format!(
                "links use different counter widths ({} and {})",
                self.link_1.counter_width, self.link_2.counter_width
            )));
        }
        for link in [LinkId::Link1, LinkId::Link2] {
            Framer::<u8>::new(self.framer(link))?;
            Deframer::<u8>::new(self.deframer(link))?;
        }
        StreamAligner::<u8>::new(self.aligner())?;
        HysteresisGate::new(self.hysteresis())?;
        StepGate::new(self.step_gate())?;
        RxHardSwitch::<u8>::new(self.hard_switch())?;
        AllocationTable::new(&self.soft_switch())?;
        LinkTester::<u8>::new(self.link_tester.clone())?;
        Slicer::new(self.slicer.clone())?;
        QualityMetre::new(self.quality())?;
        BitSource::<u8>::new(self.source())?;
        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            packet_size: 500,
            link_1: HeaderDescriptor::with_label("RF"),
            link_2: HeaderDescriptor {
                samples_per_bit: 4,
                ..HeaderDescriptor::with_label("FS")
            },
            ..Default::default()
        };
        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
