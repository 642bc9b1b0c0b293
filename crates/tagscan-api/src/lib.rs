// tagscan-api: Async Rust client for the tag inventory backend

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::BackendClient;
pub use error::Error;
pub use models::{ApiResponse, Asset, ReferenceData, TagReading, TagRecord};
pub use transport::{TlsMode, TransportConfig};
