use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A place that offers bookable appointments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    /// Days from today before which the remote service refuses queries
    pub earliest_offset_days: i64,
}

/// A named time window within a day, e.g. "09:00-13:00"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockZone {
    pub id: u32,
    pub start: String,
    pub end: String,
}

impl ClockZone {
    pub fn new(id: u32, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            id,
            start: start.into(),
            end: end.into(),
        }
    }
}

impl fmt::Display for ClockZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Lookup of zone id -> ClockZone, refreshed at the start of every sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockZoneDirectory {
    zones: HashMap<u32, ClockZone>,
}

impl ClockZoneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, zone: ClockZone) {
        self.zones.insert(zone.id, zone);
    }

    pub fn get(&self, id: u32) -> Option<&ClockZone> {
        self.zones.get(&id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl FromIterator<ClockZone> for ClockZoneDirectory {
    fn from_iter<I: IntoIterator<Item = ClockZone>>(iter: I) -> Self {
        let mut directory = Self::new();
        for zone in iter {
            directory.insert(zone);
        }
        directory
    }
}

/// One decoded availability record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub date: NaiveDate,
    pub zone: ClockZone,
    /// 0..=100
    pub percent_available: u32,
}

impl Observation {
    pub fn is_available(&self) -> bool {
        self.percent_available > 0
    }
}

/// Identity of a notifiable slot.
///
/// Only the location id takes part, never its display name, so renaming a
/// location between sweeps keeps the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub location_id: i64,
    pub date: NaiveDate,
    pub zone: ClockZone,
}

impl SlotKey {
    pub fn new(location: &Location, observation: &Observation) -> Self {
        Self {
            location_id: location.id,
            date: observation.date,
            zone: observation.zone.clone(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "location {} on {} ({})", self.location_id, self.date, self.zone)
    }
}

/// Opaque id of a message sent to the notification channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Three-tier classification of how much of a slot is still free
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_percent(percent: u32) -> Self {
        let percent = f64::from(percent);
        if percent < 100.0 / 3.0 {
            Severity::Low
        } else if percent > 200.0 / 3.0 {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Coloured square shown in the outgoing message
    pub fn marker(&self) -> char {
        match self {
            Severity::Low => '\u{1F7E7}',
            Severity::Medium => '\u{1F7E8}',
            Severity::High => '\u{1F7E9}',
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}
