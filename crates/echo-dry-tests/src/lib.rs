// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the Echo naming crates.
#![forbid(unsafe_code)]
//!
//! This crate provides commonly used test utilities to reduce duplication
//! across the naming test suite.
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`engine`] - Naming engine builder
//! - [`fixtures`] - Bulk element maps and save helpers
//! - [`policy`] - Disambiguation policy doubles
//! - [`sink`] - Allocation sink with a running balance

pub mod config;
pub mod engine;
pub mod fixtures;
pub mod policy;
pub mod sink;

// Re-export commonly used items at crate root for convenience
pub use config::InMemoryConfigStore;
pub use engine::EngineTestBuilder;
pub use fixtures::{bulk_elements, doc_file_to_string, fixture_name, save_to_string};
pub use policy::RefusingPolicy;
pub use sink::CountingSink;
