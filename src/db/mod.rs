//! Database module for Pingwatch.
//!
//! SQLite storage for monitored targets and their poll history, with
//! embedded migrations applied on open.

mod history;
mod models;
mod store;

pub use history::*;
pub use models::*;
pub use store::*;
