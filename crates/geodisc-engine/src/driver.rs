//! Async owner of a [`DiscoverySession`].
//!
//! One task receives [`Command`]s, runs backend and geolocation calls
//! concurrently, sleeps until the debounce and settle deadlines, and
//! publishes a [`Snapshot`] after every step. Responses are handed to the
//! session in completion order; its generation guard decides what applies.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Either};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use geodisc_core::{BackendError, Coordinate, SearchPage, TypeSelector};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use crate::backend::{GeolocationError, GeolocationProvider, SearchBackend};
use crate::criteria::RadiusStep;
use crate::error::{DriverClosed, SessionError};
use crate::geo::BoundingBox;
use crate::pipeline::{FetchTicket, SearchRequest};
use crate::session::{DiscoverySession, Snapshot};

/// Inputs from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFreeText(String),
    SetTypeSelector(TypeSelector),
    SetCategory(Option<String>),
    SetFeaturedOnly(bool),
    SetProximityAnchor(Option<Coordinate>),
    SetRadius(f64),
    StepRadius(RadiusStep),
    SetBounds(Option<BoundingBox>),
    SetZoom(f64),
    /// Request one geolocation reading and anchor proximity to it.
    Locate,
    Refresh,
    Reset,
    /// The list's end sentinel came into view.
    FetchMore,
    Retry,
    ActivateGroup(String),
    SelectItem(String),
    BackgroundClick,
}

type SearchOutcome = (FetchTicket, Result<SearchPage, BackendError>);

pub struct Driver<B, G> {
    session: DiscoverySession,
    backend: Arc<B>,
    geolocation: Arc<G>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
}

/// Client side of a running [`Driver`].
#[derive(Debug)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    sent: u64,
}

/// Builds a driver and its handle. Spawn [`Driver::run`] on a tokio runtime.
pub fn channel<B, G>(
    session: DiscoverySession,
    backend: Arc<B>,
    geolocation: Arc<G>,
    capacity: usize,
) -> (Driver<B, G>, DriverHandle)
where
    B: SearchBackend + 'static,
    G: GeolocationProvider + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let driver = Driver {
        session,
        backend,
        geolocation,
        commands: command_rx,
        snapshots: snapshot_tx,
    };
    let handle = DriverHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        sent: 0,
    };
    (driver, handle)
}

impl<B, G> Driver<B, G>
where
    B: SearchBackend + 'static,
    G: GeolocationProvider + 'static,
{
    /// Runs until every handle is dropped and no call is outstanding.
    pub async fn run(self) {
        let Driver {
            mut session,
            backend,
            geolocation,
            mut commands,
            snapshots,
        } = self;

        let mut searches: FuturesUnordered<BoxFuture<'static, SearchOutcome>> =
            FuturesUnordered::new();
        let mut readings: FuturesUnordered<
            BoxFuture<'static, Result<Coordinate, GeolocationError>>,
        > = FuturesUnordered::new();
        let mut applied: u64 = 0;
        let mut last_error: Option<String> = None;
        let mut open = true;

        tracing::debug!("discovery driver started");

        loop {
            let debounce = session.debounce_deadline();
            let settle = session.settle_timer();

            tokio::select! {
                command = commands.recv(), if open => match command {
                    Some(command) => {
                        if matches!(command, Command::Locate) {
                            session.begin_locating();
                            let geolocation = Arc::clone(&geolocation);
                            readings.push(async move { geolocation.locate().await }.boxed());
                        }
                        match apply(&mut session, command, Instant::now()) {
                            Ok(Some(request)) => dispatch(&backend, &mut searches, request),
                            Ok(None) => {}
                            Err(error) => {
                                tracing::warn!(error = %error, "command rejected");
                                last_error = Some(error.to_string());
                            }
                        }
                        applied += 1;
                    }
                    None => {
                        tracing::debug!("command channel closed");
                        open = false;
                    }
                },
                Some((ticket, result)) = searches.next() => {
                    if let Some(request) = session.on_response(ticket, result) {
                        dispatch(&backend, &mut searches, request);
                    }
                }
                Some(reading) = readings.next() => session.on_geolocation(reading),
                () = sleep_or_pending(debounce) => {
                    if let Some(request) = session.poll_debounce(Instant::now()) {
                        dispatch(&backend, &mut searches, request);
                    }
                }
                () = sleep_or_pending(settle.map(|(_, deadline)| deadline)) => {
                    if let Some((timer_id, _)) = settle {
                        session.settle_elapsed(timer_id);
                    }
                }
            }

            let mut snapshot = session.snapshot();
            snapshot.commands_applied = applied;
            snapshot.last_error.clone_from(&last_error);
            snapshots.send_replace(snapshot);

            if !open && searches.is_empty() && readings.is_empty() {
                break;
            }
        }

        tracing::debug!(commands = applied, "discovery driver stopped");
    }
}

/// Applies one command. `Locate` only needs its reading scheduled by the
/// caller, so it is a no-op here.
fn apply(
    session: &mut DiscoverySession,
    command: Command,
    now: Instant,
) -> Result<Option<SearchRequest>, SessionError> {
    let request = match command {
        Command::SetFreeText(text) => {
            session.set_free_text(&text, now);
            None
        }
        Command::SetTypeSelector(selector) => session.set_type_selector(selector),
        Command::SetCategory(slug) => session.set_category(slug.as_deref())?,
        Command::SetFeaturedOnly(featured) => session.set_featured_only(featured),
        Command::SetProximityAnchor(anchor) => {
            session.set_proximity_anchor(anchor);
            None
        }
        Command::SetRadius(meters) => {
            session.set_radius(meters)?;
            None
        }
        Command::StepRadius(step) => {
            session.step_radius(step);
            None
        }
        Command::SetBounds(bounds) => {
            session.set_bounds(bounds);
            None
        }
        Command::SetZoom(zoom) => {
            session.set_zoom(zoom)?;
            None
        }
        Command::Locate => None,
        Command::Refresh => Some(session.refresh()),
        Command::Reset => Some(session.reset()),
        Command::FetchMore => session.fetch_more(),
        Command::Retry => session.retry(),
        Command::ActivateGroup(key) => {
            session.activate_group(&key, now)?;
            None
        }
        Command::SelectItem(id) => {
            session.select_item(&id)?;
            None
        }
        Command::BackgroundClick => {
            session.background_click(now);
            None
        }
    };
    Ok(request)
}

fn dispatch<B>(
    backend: &Arc<B>,
    searches: &mut FuturesUnordered<BoxFuture<'static, SearchOutcome>>,
    request: SearchRequest,
) where
    B: SearchBackend + 'static,
{
    let backend = Arc::clone(backend);
    let SearchRequest { ticket, query } = request;
    tracing::debug!(
        generation = ticket.generation.value(),
        mode = ?ticket.mode,
        "dispatching search"
    );
    searches.push(
        async move {
            let result = backend.search(query).await;
            (ticket, result)
        }
        .boxed(),
    );
}

fn sleep_or_pending(deadline: Option<Instant>) -> impl Future<Output = ()> {
    match deadline {
        Some(deadline) => Either::Left(sleep_until(deadline)),
        None => Either::Right(std::future::pending()),
    }
}

impl DriverHandle {
    /// Queues a command for the driver.
    ///
    /// # Errors
    ///
    /// Returns [`DriverClosed`] if the driver task has stopped.
    pub async fn send(&mut self, command: Command) -> Result<(), DriverClosed> {
        self.commands.send(command).await.map_err(|_| DriverClosed)?;
        self.sent += 1;
        Ok(())
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits until every command sent so far has been applied and nothing
    /// is loading, debouncing or locating.
    ///
    /// # Errors
    ///
    /// Returns [`DriverClosed`] if the driver stops first.
    pub async fn settled(&mut self) -> Result<Snapshot, DriverClosed> {
        let sent = self.sent;
        let snapshot = self
            .snapshots
            .wait_for(|s| s.commands_applied >= sent && s.status.is_settled())
            .await
            .map_err(|_| DriverClosed)?;
        Ok(snapshot.clone())
    }

    /// Waits for the next published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DriverClosed`] if the driver stops first.
    pub async fn changed(&mut self) -> Result<Snapshot, DriverClosed> {
        self.snapshots.changed().await.map_err(|_| DriverClosed)?;
        Ok(self.snapshots.borrow_and_update().clone())
    }
}
