//! Checkout signals.
//!
//! A shallow clone of the repository is inspected for its README, the date of its most recent
//! commit, and the dependency declarations of its manifest. The checkout is removed afterwards.

mod collector;
mod git;
pub mod manifest;
mod package_signals;

const LOG_TARGET: &str = "  registry";

pub use collector::RegistryCollector;
pub use manifest::{Dependency, is_pinned};
pub use package_signals::{DependencySummary, Documentation, PackageSignals};
