//! Execution side: chain access, ABI codec, output sinks and the
//! interpreter that ties them together.

pub mod abi;
pub mod client;
pub mod interpreter;
pub mod sink;

pub use client::{BlockchainClient, ClientError, FixtureClient};
pub use interpreter::run;
pub use sink::{FolderSink, OutputSink, RecordingSink, SinkError};
