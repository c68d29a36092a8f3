//! Configuration structures for the ProSe layer
//!
//! This module provides configuration types for the slprosesim modules:
//! the direct-link retransmission parameters and the relay-selection
//! strategy choice. All timer durations and retry maxima are configuration,
//! not protocol constants; the defaults are the 3GPP TS 24.554 illustrative
//! values (T5080 = 8 s, T5087 = 5 s, 3 retransmissions each).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Direct-link retransmission configuration.
///
/// Covers both handshakes of the PC5 unicast link: establishment
/// (timer T5080) and release (timer T5087).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectLinkConfig {
    /// Duration of timer T5080 (establishment request retransmission)
    /// in seconds (TS 24.554 Table 12.3.1 default: 8 s)
    #[serde(default = "default_t5080_secs")]
    pub t5080_secs: u64,
    /// Maximum number of establishment request retransmissions
    #[serde(default = "default_rtx_max")]
    pub establishment_rtx_max: u32,
    /// Duration of timer T5087 (release request retransmission)
    /// in seconds (TS 24.554 Table 12.3.1 default: 5 s)
    #[serde(default = "default_t5087_secs")]
    pub t5087_secs: u64,
    /// Maximum number of release request retransmissions
    #[serde(default = "default_rtx_max")]
    pub release_rtx_max: u32,
}

fn default_t5080_secs() -> u64 {
    8
}

fn default_t5087_secs() -> u64 {
    5
}

fn default_rtx_max() -> u32 {
    3
}

impl Default for DirectLinkConfig {
    fn default() -> Self {
        Self {
            t5080_secs: default_t5080_secs(),
            establishment_rtx_max: default_rtx_max(),
            t5087_secs: default_t5087_secs(),
            release_rtx_max: default_rtx_max(),
        }
    }
}

impl DirectLinkConfig {
    /// Returns the T5080 duration.
    pub fn t5080(&self) -> Duration {
        Duration::from_secs(self.t5080_secs)
    }

    /// Returns the T5087 duration.
    pub fn t5087(&self) -> Duration {
        Duration::from_secs(self.t5087_secs)
    }
}

/// Relay-selection strategy choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaySelectionConfig {
    /// First discovered relay in insertion order, unconditionally
    FirstAvailable,
    /// Uniformly random discovered relay; `seed` selects the stream
    Random {
        /// RNG seed for reproducible multi-run experiments
        seed: u64,
    },
    /// Eligible relay with the highest RSRP measurement
    #[default]
    MaxRsrp,
}

/// ProSe layer configuration for one UE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProseConfig {
    /// Layer-2 identifier of this UE for sidelink signalling
    pub l2_id: u32,
    /// IMSI of this UE (used for core-network route registration
    /// when acting as U2N relay)
    #[serde(default)]
    pub imsi: u64,
    /// Direct-link retransmission parameters
    #[serde(default)]
    pub direct_link: DirectLinkConfig,
    /// Relay-selection strategy
    #[serde(default)]
    pub relay_selection: RelaySelectionConfig,
}

impl ProseConfig {
    /// Creates a configuration with default protocol parameters.
    pub fn new(l2_id: u32) -> Self {
        Self {
            l2_id,
            imsi: 0,
            direct_link: DirectLinkConfig::default(),
            relay_selection: RelaySelectionConfig::default(),
        }
    }

    /// Parses a configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.l2_id == 0 {
            return Err(Error::Config("l2_id must be nonzero".into()));
        }
        if self.direct_link.t5080_secs == 0 || self.direct_link.t5087_secs == 0 {
            return Err(Error::Config(
                "retransmission timer durations must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
}
