//! Application wiring and lifecycle management.

mod lifecycle;
mod run;
mod state;

pub use lifecycle::{flush_once, print_status};
pub use run::run_relay;
