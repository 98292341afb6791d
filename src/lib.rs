//! Core library for the rust_ixe client.
//!
//! This library drives IxExplorer traffic generators through the IxTclHal
//! command interface of an IxTclServer. It is used by the `rust_ixe` command
//! line tool and by test automation that links it directly.
//!
//! The object tree is chassis, session, ports, streams and port sub-objects.
//! Every object is addressed by a Tcl uri (`"1 1 1"` for a port, `"1 1 1 2"`
//! for its second stream) and shares one [`api::ApiHandle`] per connection.

/// Tcl transports.
pub mod adapters;
/// IxTclHal command layer.
pub mod api;
/// Application root.
pub mod app;
/// Capture formats and buffer export.
pub mod capture;
/// Client configuration.
pub mod config;
/// Error types.
pub mod error;
/// Chassis, ports, streams and port sub-objects.
pub mod hardware;
/// Generic IxTclHal objects.
pub mod object;
/// Attribute descriptors and typed values.
pub mod parameter;
/// Session and reserved ports.
pub mod session;
/// Batched traffic, capture and statistics commands.
pub mod traffic;

pub use app::{init_ixe, IxeApp};
pub use capture::CapFileFormat;
pub use error::{AppResult, IxeError};
pub use session::{IxeSession, ALL_PORTS};
