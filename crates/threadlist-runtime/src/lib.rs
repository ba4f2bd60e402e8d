//! Async runtime for the conversation-list engine.
//!
//! Owns the plumbing the pure core deliberately avoids: the command/update
//! channel pair, the transport trait the engine drives, environment-backed
//! configuration, and the single-writer actor that serializes every
//! mutation of the shared list state.

/// Command/update channel primitives.
pub mod channel;
/// Environment-backed runtime configuration.
pub mod config;
/// The single-writer engine actor.
pub mod runtime;
/// Transport trait and in-memory implementation.
pub mod transport;

pub use channel::{ChannelError, CommandSender, UpdateStream};
pub use config::{ConfigError, RuntimeConfig};
pub use runtime::{EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use transport::{ChatTransport, CreateRequest, InMemoryTransport};
