//! Transport-agnostic service surface
//!
//! The service crate owns the mount table and the wire representation of
//! changes. Two schema generations are served from the same internal model:
//! the current tagged-union schema ([`wire`]) and the flat legacy schema
//! ([`legacy`]) kept for older clients. Neither leaks internal types; paths
//! cross the wire as strings (current) or raw bytes (legacy), and positions
//! cross as opaque cursor strings.

mod legacy;
mod service;
mod wire;

pub use legacy::{LegacyChange, LegacyChangeType, LegacyChangesSinceResponse};
pub use service::{ChangesService, MountHandle, ServiceError};
pub use wire::{
    ChangesSinceRequest, ChangesSinceResponse, WireChange, WireDtype, WireLargeChange,
    WireLostReason, WireSmallChange,
};
