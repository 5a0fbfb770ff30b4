//! Blockseek: Random-Access Reads over Cluster-Distributed Blocks
//!
//! Lets an application seek and read within a file whose content exists only as
//! blocks held by peers of a synchronization cluster. Virtual paths are resolved
//! against a registry of shared folders, each needed block is fetched from the
//! peer that currently looks fastest and most reliable, and the fragments are
//! assembled into exactly the requested byte range.

pub mod cluster;
pub mod config;
pub mod error;
pub mod folder;
pub mod logging;
pub mod peer;
pub mod reader;
pub mod service;
pub mod types;

pub use error::{ApiError, FetchError, PartialRead};
pub use service::FileAccess;
