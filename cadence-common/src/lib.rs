pub mod logging;

pub use tracing;

/// Broadcast signal used to coordinate shutdown across long-running tasks.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
