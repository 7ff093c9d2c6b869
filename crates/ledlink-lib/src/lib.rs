//! ledlink — keep a UDP addressable-LED controller in sync with a locally
//! edited configuration.

pub mod color;
pub mod config;
pub mod connection;
pub mod controller;
pub mod device_config;
pub mod discovery;
pub mod error;
pub mod networks;
pub mod protocol;
pub mod sync;
pub mod transport;

pub use error::LedlinkError;
