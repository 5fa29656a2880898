//! CLI command implementations.

pub mod probe;
pub mod scan;
pub mod state;

pub use probe::ProbeCommand;
pub use scan::{ScanCommand, ScanReport};
pub use state::StateCommand;
