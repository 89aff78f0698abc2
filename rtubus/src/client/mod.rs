pub use crate::client::config::*;
pub use crate::client::port::PortHandle;
pub use crate::client::registry::PortRegistry;

mod config;
mod port;
mod registry;

pub(crate) mod message;
pub(crate) mod requests;
pub(crate) mod transaction;
