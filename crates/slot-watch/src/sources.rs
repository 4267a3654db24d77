//! Interfaces of the external collaborators the reconciler and the poll
//! driver talk to.
//!
//! The HTTP implementations live in `reservation_client` and `telegram`;
//! tests plug in in-memory fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use slot_types::{ClockZoneDirectory, Location, MessageHandle, Observation};

use crate::error::WatchResult;

/// Lazy, date-ascending sequence of observations for one remote page.
///
/// Records are decoded as they are pulled, and the sequence cannot be
/// restarted once consumed.
pub struct Timeslots {
    inner: Box<dyn Iterator<Item = Observation> + Send>,
}

impl Timeslots {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Observation> + Send + 'static,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for Timeslots {
    type Item = Observation;

    fn next(&mut self) -> Option<Observation> {
        self.inner.next()
    }
}

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    /// Current locations and the zone table used to decode their timeslots
    async fn fetch_directory(&self) -> WatchResult<(Vec<Location>, ClockZoneDirectory)>;
}

#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// One page of availability for `location_id`, starting at `start_date`
    async fn fetch_timeslots(
        &self,
        location_id: i64,
        start_date: NaiveDate,
        zones: &ClockZoneDirectory,
    ) -> WatchResult<Timeslots>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send `text`. `None` means the channel answered without a handle.
    async fn create(&self, text: &str) -> WatchResult<Option<MessageHandle>>;

    /// Withdraw a previously created message. Call at most once per handle.
    async fn delete(&self, handle: &MessageHandle) -> WatchResult<()>;
}
