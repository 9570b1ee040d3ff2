//! Environment discovery.
//!
//! Probes query one source each (the package manager, or one filesystem root) and
//! degrade to an empty [`ProbeResult`] on any failure. The coordinator runs them
//! concurrently and merges the results in a fixed order.

pub mod coordinator;
pub mod probe;
pub mod runner;

pub use coordinator::DiscoveryCoordinator;
pub use probe::{EnvironmentProbe, FilesystemSearchProbe, PackageManagerProbe, ProbeResult};
pub use runner::{ProcessOutput, ProcessRunner, RunError, TokioProcessRunner};
