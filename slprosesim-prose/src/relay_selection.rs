//! Relay selection strategies for UE-to-network relay operation
//!
//! A remote UE picks one relay out of the relays it has discovered. The
//! strategy is pluggable behind [`RelaySelectionAlgorithm`]; the built-in
//! strategies cover deterministic baseline, randomized and
//! measurement-driven selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use slprosesim_common::RelaySelectionConfig;

/// A discovered UE-to-network relay candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayInfo {
    /// Layer-2 ID of the relay (0 means "no relay")
    pub l2_id: u32,
    /// Relay service code advertised by the relay
    pub relay_service_code: u32,
    /// Last RSRP measurement toward the relay, in dBm
    pub rsrp: f64,
    /// Whether the relay currently satisfies the eligibility criteria
    /// (e.g. its RSRP is above the configured threshold)
    pub eligible: bool,
}

impl RelayInfo {
    /// Sentinel meaning "no relay selected"
    pub const NONE: RelayInfo = RelayInfo {
        l2_id: 0,
        relay_service_code: 0,
        rsrp: f64::NEG_INFINITY,
        eligible: false,
    };

    /// Creates a candidate from discovery parameters
    pub fn new(l2_id: u32, relay_service_code: u32, rsrp: f64, eligible: bool) -> Self {
        Self {
            l2_id,
            relay_service_code,
            rsrp,
            eligible,
        }
    }

    /// Returns true if this is the "no relay" sentinel
    pub fn is_none(&self) -> bool {
        self.l2_id == 0
    }
}

/// Strategy choosing one relay out of the discovered candidates.
///
/// Returns [`RelayInfo::NONE`] when no candidate qualifies.
pub trait RelaySelectionAlgorithm {
    /// Selects a relay from the candidate list
    fn select_relay(&mut self, candidates: &[RelayInfo]) -> RelayInfo;
}

/// Selects the first discovered relay, unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailableRelaySelection;

impl RelaySelectionAlgorithm for FirstAvailableRelaySelection {
    fn select_relay(&mut self, candidates: &[RelayInfo]) -> RelayInfo {
        candidates.first().copied().unwrap_or(RelayInfo::NONE)
    }
}

/// Selects a uniformly random discovered relay.
///
/// Seeded explicitly so that multi-run experiments are reproducible.
#[derive(Debug)]
pub struct RandomRelaySelection {
    rng: StdRng,
}

impl RandomRelaySelection {
    /// Creates the strategy with the given RNG seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Reseeds the RNG, assigning a fresh random stream
    pub fn assign_stream(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl RelaySelectionAlgorithm for RandomRelaySelection {
    fn select_relay(&mut self, candidates: &[RelayInfo]) -> RelayInfo {
        if candidates.is_empty() {
            return RelayInfo::NONE;
        }
        candidates[self.rng.gen_range(0..candidates.len())]
    }
}

/// Selects the eligible relay with the strongest RSRP measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxRsrpRelaySelection;

impl RelaySelectionAlgorithm for MaxRsrpRelaySelection {
    fn select_relay(&mut self, candidates: &[RelayInfo]) -> RelayInfo {
        let mut best = RelayInfo::NONE;
        for candidate in candidates {
            if candidate.eligible && candidate.rsrp > best.rsrp {
                best = *candidate;
            }
        }
        best
    }
}

/// Builds the strategy named by the configuration.
pub fn build_algorithm(config: RelaySelectionConfig) -> Box<dyn RelaySelectionAlgorithm> {
    match config {
        RelaySelectionConfig::FirstAvailable => Box::new(FirstAvailableRelaySelection),
        RelaySelectionConfig::Random { seed } => Box::new(RandomRelaySelection::new(seed)),
        RelaySelectionConfig::MaxRsrp => Box::new(MaxRsrpRelaySelection),
    }
}
