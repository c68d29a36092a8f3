//! Integration test framework for slprosesim
//!
//! This crate provides the multi-UE scenario harness for integration
//! testing of the ProSe direct link modules: an in-memory sidelink network
//! routing PC5 signalling packets between `ProseService` instances, with
//! per-UE traffic blackholing and recording collaborator mocks.
//!
//! # Test Categories
//!
//! 1. **Link Establishment Tests** - Two-UE establishment handshakes and
//!    bearer activation
//! 2. **Link Release Tests** - Release handshakes, retry exhaustion and
//!    context lifetime on both sides
//! 3. **Relay Reselection Tests** - Measurement-driven relay selection and
//!    release-then-connect reselection

#![allow(missing_docs)]

pub mod test_utils;

#[cfg(test)]
mod link_establishment;
#[cfg(test)]
mod link_release;

pub use test_utils::{init_test_logging, BearerCall, ScenarioNet, SentRecord, TestUe};
