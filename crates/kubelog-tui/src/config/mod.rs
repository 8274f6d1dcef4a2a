//! Viewer configuration

mod keybindings;

pub use keybindings::{KeyBinding, KeyBindings, KeyContext};
