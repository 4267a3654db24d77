//! HTTP client for the reservation service: nearby locations with their zone
//! table, and free timeslots per location.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use slot_types::{ClockZone, ClockZoneDirectory, Location, Observation};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::{WatchError, WatchResult};
use crate::sources::{AvailabilitySource, LocationDirectory, Timeslots};

/// Client for the reservation API
#[derive(Debug, Clone)]
pub struct ReservationClient {
    http: reqwest::Client,
    base_url: String,
    subject_id: i64,
    region_code: i64,
}

impl ReservationClient {
    pub fn new(config: &Config) -> WatchResult<Self> {
        Self::with_base_url(
            &config.reservation_base_url,
            config.subject_id,
            config.region_code,
            &config.headers,
        )
    }

    pub fn with_base_url(
        base_url: &str,
        subject_id: i64,
        region_code: i64,
        headers: &BTreeMap<String, String>,
    ) -> WatchResult<Self> {
        let http = reqwest::Client::builder()
            .default_headers(build_headers(headers)?)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            subject_id,
            region_code,
        })
    }

    async fn post<T>(&self, endpoint: &str, body: Value) -> WatchResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let parsed = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(parsed)
    }
}

fn build_headers(headers: &BTreeMap<String, String>) -> WatchResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| WatchError::config(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| WatchError::config(format!("invalid value for header '{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[derive(Debug, Deserialize)]
struct NearCentersResponse {
    centers: Option<Vec<CenterRecord>>,
    timezones: Option<Vec<ZoneRecord>>,
}

#[derive(Debug, Deserialize)]
struct CenterRecord {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
    name: String,
    #[serde(rename = "daysAfterTodayToBook", deserialize_with = "lenient_i64")]
    days_after_today: i64,
}

impl From<CenterRecord> for Location {
    fn from(record: CenterRecord) -> Self {
        Location {
            id: record.id,
            name: record.name,
            earliest_offset_days: record.days_after_today,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZoneRecord {
    #[serde(rename = "TIMEZONE_NUM", deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(rename = "START_TIME")]
    start: String,
    #[serde(rename = "END_TIME")]
    end: String,
}

#[derive(Debug, Deserialize)]
struct TimeslotsResponse {
    #[serde(rename = "timeslotsFree")]
    timeslots_free: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct TimeslotRecord {
    #[serde(rename = "onDate")]
    on_date: String,
    #[serde(rename = "zoneNum", deserialize_with = "lenient_i64")]
    zone_num: i64,
    #[serde(rename = "percentAvailable", deserialize_with = "lenient_i64")]
    percent_available: i64,
}

/// The API is not consistent about quoting numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn warn_missing(key: &str, endpoint: &str) {
    tracing::warn!("expected '{}' in {} response but was not there", key, endpoint);
}

/// `onDate` comes as a date or a date-time; only the date part matters
fn parse_on_date(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
}

fn zone_from_record(record: ZoneRecord) -> Option<ClockZone> {
    match u32::try_from(record.id) {
        Ok(id) => Some(ClockZone::new(id, record.start.trim(), record.end.trim())),
        Err(_) => {
            tracing::warn!("ignoring clock zone with invalid id {}", record.id);
            None
        }
    }
}

fn decode_timeslot(raw: Value, zones: &ClockZoneDirectory) -> Option<Observation> {
    let record: TimeslotRecord = match serde_json::from_value(raw) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("skipping malformed timeslot record: {}", e);
            return None;
        }
    };

    let Some(date) = parse_on_date(&record.on_date) else {
        tracing::warn!("skipping timeslot with unparsable date '{}'", record.on_date);
        return None;
    };

    let zone = u32::try_from(record.zone_num)
        .ok()
        .and_then(|id| zones.get(id));
    let Some(zone) = zone else {
        tracing::warn!("skipping timeslot on {} with unknown zone {}", date, record.zone_num);
        return None;
    };

    Some(Observation {
        date,
        zone: zone.clone(),
        percent_available: record.percent_available.clamp(0, 100) as u32,
    })
}

#[async_trait]
impl LocationDirectory for ReservationClient {
    async fn fetch_directory(&self) -> WatchResult<(Vec<Location>, ClockZoneDirectory)> {
        let response: NearCentersResponse = self
            .post(
                "CV_User_NearCenters",
                json!({
                    "zipCode": self.region_code,
                    "personId": self.subject_id,
                }),
            )
            .await?;

        if response.centers.is_none() {
            warn_missing("centers", "CV_User_NearCenters");
        }
        if response.timezones.is_none() {
            warn_missing("timezones", "CV_User_NearCenters");
        }

        let locations = response
            .centers
            .unwrap_or_default()
            .into_iter()
            .map(Location::from)
            .collect();
        let zones = response
            .timezones
            .unwrap_or_default()
            .into_iter()
            .filter_map(zone_from_record)
            .collect();

        Ok((locations, zones))
    }
}

#[async_trait]
impl AvailabilitySource for ReservationClient {
    async fn fetch_timeslots(
        &self,
        location_id: i64,
        start_date: NaiveDate,
        zones: &ClockZoneDirectory,
    ) -> WatchResult<Timeslots> {
        let response: TimeslotsResponse = self
            .post(
                "CV_TimeSlots_Free",
                json!({
                    "centerId": location_id,
                    "personId": self.subject_id,
                    "firstDoseDate": null,
                    "zoneNum": null,
                    "selectedDate": format!("{}T00:00:00.000Z", start_date.format("%Y-%m-%d")),
                    "dose": 1,
                    "requestRecommended": true,
                }),
            )
            .await?;

        let Some(records) = response.timeslots_free else {
            warn_missing("timeslotsFree", "CV_TimeSlots_Free");
            return Ok(Timeslots::empty());
        };

        let zones = zones.clone();
        Ok(Timeslots::new(
            records
                .into_iter()
                .filter_map(move |raw| decode_timeslot(raw, &zones)),
        ))
    }
}
