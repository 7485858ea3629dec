use thiserror::Error;

/// Rejected session commands. The session state is unchanged when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("unknown category slug: {0}")]
    UnknownCategory(String),

    #[error("no marker group with key {0}")]
    UnknownGroup(String),

    #[error("no loaded item with id {0}")]
    UnknownItem(String),

    #[error("invalid proximity radius: {0} m")]
    InvalidRadius(f64),

    #[error("invalid zoom level: {0}")]
    InvalidZoom(f64),
}

/// The driver task has stopped and no longer accepts commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("discovery driver has shut down")]
pub struct DriverClosed;
