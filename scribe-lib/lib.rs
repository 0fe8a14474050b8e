//! Editing layer on top of [`scribe_core`]: invertible steps with position
//! maps, transactions, selection mapping, the plugin pipeline, editor state
//! with undo history, the table extension, editing commands, and the HTML
//! import/export boundary.

pub mod commands;
pub mod history;
pub mod html;
pub mod map;
pub mod plugin;
pub mod selection;
pub mod state;
pub mod step;
pub mod tables;
pub mod transaction;

pub use scribe_core::Tendril;
