//! Chassis-side objects: chassis, ports, streams and port sub-objects.

/// Chassis connection.
pub mod chassis;
/// Ports.
pub mod port;
/// Port receive sub-objects.
pub mod port_objects;
/// Streams.
pub mod stream;

pub use chassis::IxeChassis;
pub use port::{normalize_uri, IxePort, LinkState};
pub use port_objects::PortSubObject;
pub use stream::IxeStream;
