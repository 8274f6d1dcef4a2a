//! Terminal viewer for kubelog
//!
//! Lists the gateway's containers and follows one of them over a push
//! channel. [`ConnectionManager`] decides when to open, close and retry
//! the channel; [`ChannelDriver`] carries those decisions out.

pub mod app;
pub mod client;
pub mod config;
pub mod connection;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, Screen, UiState};
pub use client::{ClientError, GatewayClient};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use connection::{
    ChannelAddress, ChannelDriver, ChannelEvent, ConnectionManager, ConnectionState, Effect,
    ReconnectPolicy,
};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, ListSelector, ListSelectorExt, StatusBar};
pub use ui::screens::{ContainerSelectScreen, LogViewerScreen};
pub use ui::{Layout, Theme};
