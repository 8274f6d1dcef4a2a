//! Keeps the log channel for the selected container alive

mod driver;
mod manager;

pub use driver::{ChannelAddress, ChannelDriver, ChannelEvent, DEFAULT_CONNECT_TIMEOUT};
pub use manager::{ConnectionManager, ConnectionState, Effect, ReconnectPolicy};
