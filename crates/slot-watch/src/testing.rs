//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use slot_types::{ClockZoneDirectory, Location, MessageHandle, Observation};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{WatchError, WatchResult};
use crate::sources::{AvailabilitySource, LocationDirectory, NotificationSink, Timeslots};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkMode {
    Normal,
    NoHandles,
    Failing,
}

#[derive(Debug, Default)]
struct SinkLog {
    next_id: i64,
    created: Vec<String>,
    deleted: Vec<MessageHandle>,
}

/// Records every create/delete and hands out sequential handles
#[derive(Debug)]
pub struct RecordingSink {
    mode: SinkMode,
    log: Mutex<SinkLog>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::with_mode(SinkMode::Normal)
    }

    /// Accepts messages but never returns a handle
    pub fn without_handles() -> Self {
        Self::with_mode(SinkMode::NoHandles)
    }

    /// Every call fails like a dropped connection
    pub fn failing() -> Self {
        Self::with_mode(SinkMode::Failing)
    }

    fn with_mode(mode: SinkMode) -> Self {
        Self {
            mode,
            log: Mutex::new(SinkLog::default()),
        }
    }

    pub fn created(&self) -> Vec<String> {
        self.log.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<MessageHandle> {
        self.log.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn create(&self, text: &str) -> WatchResult<Option<MessageHandle>> {
        if self.mode == SinkMode::Failing {
            return Err(WatchError::config("sink unavailable"));
        }
        let mut log = self.log.lock().unwrap();
        log.created.push(text.to_string());
        if self.mode == SinkMode::NoHandles {
            return Ok(None);
        }
        log.next_id += 1;
        Ok(Some(MessageHandle(log.next_id)))
    }

    async fn delete(&self, handle: &MessageHandle) -> WatchResult<()> {
        self.log.lock().unwrap().deleted.push(handle.clone());
        if self.mode == SinkMode::Failing {
            return Err(WatchError::config("sink unavailable"));
        }
        Ok(())
    }
}

/// Serves scripted pages per location, one page per request
#[derive(Debug, Default)]
pub struct ScriptedSource {
    locations: Vec<Location>,
    zones: ClockZoneDirectory,
    pages: Mutex<HashMap<i64, VecDeque<Vec<Observation>>>>,
    requests: Mutex<Vec<(i64, NaiveDate)>>,
    directory_fetches: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new(locations: Vec<Location>, zones: ClockZoneDirectory) -> Self {
        Self {
            locations,
            zones,
            ..Default::default()
        }
    }

    pub fn push_page(&self, location_id: i64, page: Vec<Observation>) {
        self.pages
            .lock()
            .unwrap()
            .entry(location_id)
            .or_default()
            .push_back(page);
    }

    pub fn requests(&self) -> Vec<(i64, NaiveDate)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn directory_fetches(&self) -> usize {
        *self.directory_fetches.lock().unwrap()
    }
}

#[async_trait]
impl LocationDirectory for ScriptedSource {
    async fn fetch_directory(&self) -> WatchResult<(Vec<Location>, ClockZoneDirectory)> {
        *self.directory_fetches.lock().unwrap() += 1;
        Ok((self.locations.clone(), self.zones.clone()))
    }
}

#[async_trait]
impl AvailabilitySource for ScriptedSource {
    async fn fetch_timeslots(
        &self,
        location_id: i64,
        start_date: NaiveDate,
        _zones: &ClockZoneDirectory,
    ) -> WatchResult<Timeslots> {
        self.requests.lock().unwrap().push((location_id, start_date));
        let page = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&location_id)
            .and_then(|pages| pages.pop_front())
            .unwrap_or_default();
        Ok(Timeslots::new(page.into_iter()))
    }
}
