//! Build submission: validate the request, build the command line, hand it to a sink.

pub mod error;
pub mod executor;
pub mod sink;

pub use error::{BuildError, SinkError};
pub use executor::{build_command_line, BuildExecutor, BuildSubmission};
pub use sink::{CommandSink, ShellSink, SinkHandle};
