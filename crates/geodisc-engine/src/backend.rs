//! Seams to the external collaborators: the search endpoint and the
//! device geolocation capability.

use std::future::Future;

use geodisc_core::{BackendError, Coordinate, SearchPage, SearchQuery};
use thiserror::Error;

/// The backend search endpoint.
///
/// Calls may complete in any order; callers tag each one with a ticket and
/// let the session decide what is still wanted.
pub trait SearchBackend: Send + Sync {
    fn search(
        &self,
        query: SearchQuery,
    ) -> impl Future<Output = Result<SearchPage, BackendError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("geolocation permission denied")]
    Denied,

    #[error("geolocation timed out")]
    Timeout,

    #[error("geolocation unavailable: {0}")]
    Unavailable(String),
}

/// A one-shot position reading.
pub trait GeolocationProvider: Send + Sync {
    fn locate(&self) -> impl Future<Output = Result<Coordinate, GeolocationError>> + Send;
}

/// Provider answering every request with the same fixed outcome.
///
/// Used by the CLI when the user passes `--near`, and by tests.
#[derive(Debug, Clone)]
pub struct StaticGeolocation {
    reading: Result<Coordinate, GeolocationError>,
}

impl StaticGeolocation {
    #[must_use]
    pub fn at(position: Coordinate) -> Self {
        Self {
            reading: Ok(position),
        }
    }

    #[must_use]
    pub fn failing(error: GeolocationError) -> Self {
        Self { reading: Err(error) }
    }
}

impl GeolocationProvider for StaticGeolocation {
    fn locate(&self) -> impl Future<Output = Result<Coordinate, GeolocationError>> + Send {
        std::future::ready(self.reading.clone())
    }
}
