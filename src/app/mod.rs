//! Application-level modules for the table engine.
//!
//! This module contains the coordinators that talk to the remote store and
//! the session object a front end drives.

mod mutations;
mod operations;
mod session;
mod view_coordinator;

pub use mutations::Reconciled;
pub use operations::TableOperations;
pub use session::{Key, KeyInput, SessionEvent, TableSession};
pub use view_coordinator::{ViewCoordinator, ViewEvent};
