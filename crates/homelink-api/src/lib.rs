// homelink-api: Async Rust client for the Homelink hub REST API

pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod request;
pub mod transport;

pub use client::HubClient;
pub use error::Error;
pub use request::ApiRequest;
pub use transport::{TlsMode, TransportConfig};
