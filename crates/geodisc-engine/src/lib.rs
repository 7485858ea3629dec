//! The geospatial discovery engine.
//!
//! Pure building blocks (geofence, grouping, interaction machine, pipeline,
//! pagination, aggregation) composed by [`DiscoverySession`], plus an async
//! [`Driver`] that owns a session and performs its I/O.

pub mod aggregate;
pub mod backend;
pub mod config;
pub mod criteria;
pub mod debounce;
pub mod driver;
pub mod error;
pub mod geo;
pub mod grouping;
pub mod interaction;
pub mod pagination;
pub mod pipeline;
pub mod session;

pub use aggregate::{unify, DiscoverableItem, ResultStore};
pub use backend::{GeolocationError, GeolocationProvider, SearchBackend, StaticGeolocation};
pub use config::EngineConfig;
pub use criteria::{step_radius, FilterCriteria, RadiusStep, RADIUS_STEPS_METERS};
pub use driver::{channel, Command, Driver, DriverHandle};
pub use error::{DriverClosed, SessionError};
pub use geo::{circle_polygon, haversine_meters, BoundingBox, Geofence, Proximity};
pub use grouping::{group_markers, project_markers, MarkerPoint, PositionGroup, RenderedMarker};
pub use interaction::{InteractionEvent, InteractionMachine, InteractionState};
pub use pagination::{Cursors, PaginationCursor};
pub use pipeline::{FetchMode, FetchTicket, Generation, SearchRequest};
pub use session::{DiscoverySession, RetryTarget, SessionStatus, Snapshot, VisibleItem};
