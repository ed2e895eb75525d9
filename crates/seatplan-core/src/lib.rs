//! seatplan-core — shared configuration for the seatplan workspace.

pub mod config;

pub use config::{
    EngineConfig, LogFormat, LoggingConfig, SeatplanConfig, ServerConfig, StorageConfig,
};
