//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, title/status bars, and overlays
//! - `roster`: the student table and new-student form
//! - `input`: keyboard event handling
//! - `styles`: color palette and text styling

pub mod input;
pub mod render;
pub mod roster;
pub mod styles;
