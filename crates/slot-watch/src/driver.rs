//! Sweep loop: refresh the directory, walk every location's date cursor and
//! feed each observation to the reconciler.

use chrono::{Local, NaiveDate, TimeDelta};
use rand::Rng;
use slot_types::{ClockZoneDirectory, Location};
use std::sync::Arc;
use std::time::Duration;

use crate::config::PollingConfig;
use crate::error::WatchResult;
use crate::reconciler::{Outcome, Reconciler};
use crate::sources::{AvailabilitySource, LocationDirectory, NotificationSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub locations: usize,
    pub processed: usize,
    pub created: usize,
    pub retracted: usize,
    /// Alerts sent without a handle, left in the chat for good
    pub unconfirmed: usize,
}

impl SweepStats {
    fn record(&mut self, outcome: Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Retracted => self.retracted += 1,
            Outcome::Unconfirmed => self.unconfirmed += 1,
            Outcome::Unchanged => {}
        }
    }
}

/// First date queried for a location in a sweep, `None` when the offset
/// sent by the directory lands outside the calendar
pub fn start_cursor(
    location: &Location,
    today: NaiveDate,
    margin_days: i64,
) -> Option<NaiveDate> {
    let days = location.earliest_offset_days.checked_add(margin_days)?;
    today.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Random pause in `[0, max]`
fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

pub struct PollDriver<C, S> {
    client: Arc<C>,
    reconciler: Reconciler<S>,
    config: PollingConfig,
}

impl<C, S> PollDriver<C, S>
where
    C: LocationDirectory + AvailabilitySource,
    S: NotificationSink,
{
    pub fn new(client: Arc<C>, reconciler: Reconciler<S>, config: PollingConfig) -> Self {
        Self {
            client,
            reconciler,
            config,
        }
    }

    /// Sweep forever. A failed sweep is logged and retried after the pause.
    pub async fn run(&self) {
        tracing::info!(
            "Poll driver started ({} fetch rounds per location, pause {:?} + up to {:?})",
            self.config.fetch_rounds,
            self.config.sweep_pause(),
            self.config.sweep_jitter()
        );

        loop {
            let today = Local::now().date_naive();
            match self.run_sweep(today).await {
                Ok(stats) => {
                    tracing::info!(
                        "Sweep done: {} locations, {} new, {} filled",
                        stats.locations,
                        stats.created,
                        stats.retracted
                    );
                    if stats.unconfirmed > 0 {
                        tracing::error!(
                            "{} alerts were sent without a handle and cannot be withdrawn",
                            stats.unconfirmed
                        );
                    }
                }
                Err(e) => tracing::error!("Sweep failed: {}", e),
            }

            tokio::time::sleep(self.config.sweep_pause() + jitter(self.config.sweep_jitter())).await;
        }
    }

    /// One pass over every location known at the start of the sweep
    pub async fn run_sweep(&self, today: NaiveDate) -> WatchResult<SweepStats> {
        let (locations, zones) = self.client.fetch_directory().await?;
        tracing::debug!(
            "Directory has {} locations and {} clock zones",
            locations.len(),
            zones.len()
        );

        let mut stats = SweepStats {
            locations: locations.len(),
            ..Default::default()
        };

        for location in &locations {
            let Some(mut cursor) = start_cursor(location, today, self.config.start_margin_days)
            else {
                tracing::warn!(
                    "skipping location {} ({}): offset of {} days is out of range",
                    location.id,
                    location.name,
                    location.earliest_offset_days
                );
                continue;
            };
            for _ in 0..self.config.fetch_rounds {
                tokio::time::sleep(jitter(self.config.request_jitter())).await;
                self.fetch_round(location, &zones, &mut cursor, &mut stats)
                    .await?;
            }
        }

        tracing::debug!("processed {} slots", stats.processed);
        Ok(stats)
    }

    /// Fetch one page starting at `cursor` and reconcile it.
    ///
    /// Pages are date-ascending, so the cursor moves past each observation
    /// before it is reconciled and the next round never asks for seen dates.
    pub async fn fetch_round(
        &self,
        location: &Location,
        zones: &ClockZoneDirectory,
        cursor: &mut NaiveDate,
        stats: &mut SweepStats,
    ) -> WatchResult<()> {
        let timeslots = self
            .client
            .fetch_timeslots(location.id, *cursor, zones)
            .await?;

        for observation in timeslots {
            *cursor = observation.date.succ_opt().unwrap_or(observation.date);
            let outcome = self.reconciler.reconcile(location, &observation).await?;
            stats.record(outcome);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SlotTable;
    use crate::testing::{RecordingSink, ScriptedSource};
    use slot_types::{ClockZone, MessageHandle, Observation, Severity, SlotKey};

    fn zone() -> ClockZone {
        ClockZone::new(1, "09:00", "13:00")
    }

    fn location(offset: i64) -> Location {
        Location {
            id: 1,
            name: "Center".to_string(),
            earliest_offset_days: offset,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, d).unwrap()
    }

    fn observation(date: NaiveDate, percent: u32) -> Observation {
        Observation {
            date,
            zone: zone(),
            percent_available: percent,
        }
    }

    fn quiet_config(fetch_rounds: u32) -> PollingConfig {
        PollingConfig {
            fetch_rounds,
            request_jitter_ms: 0,
            sweep_pause_secs: 0,
            sweep_jitter_secs: 0,
            start_margin_days: 1,
        }
    }

    fn driver(
        source: Arc<ScriptedSource>,
        sink: Arc<RecordingSink>,
        fetch_rounds: u32,
    ) -> PollDriver<ScriptedSource, RecordingSink> {
        let reconciler = Reconciler::new(SlotTable::new(), sink, "https://example.org");
        PollDriver::new(source, reconciler, quiet_config(fetch_rounds))
    }

    #[test]
    fn test_start_cursor_adds_offset_and_margin() {
        assert_eq!(start_cursor(&location(0), day(1), 1), Some(day(2)));
        assert_eq!(start_cursor(&location(5), day(1), 1), Some(day(7)));
    }

    #[test]
    fn test_start_cursor_rejects_out_of_range_offset() {
        assert_eq!(start_cursor(&location(200_000_000), day(1), 1), None);
        assert_eq!(start_cursor(&location(i64::MAX), day(1), 1), None);
    }

    #[tokio::test]
    async fn test_out_of_range_offset_skips_only_that_location() {
        let broken = Location {
            id: 2,
            name: "Broken".to_string(),
            earliest_offset_days: 200_000_000,
        };
        let source = Arc::new(ScriptedSource::new(
            vec![broken, location(0)],
            ClockZoneDirectory::new(),
        ));
        source.push_page(1, vec![observation(day(2), 40)]);
        let sink = Arc::new(RecordingSink::new());
        let driver = driver(source.clone(), sink.clone(), 1);

        let stats = driver.run_sweep(day(1)).await.unwrap();

        assert_eq!(stats.locations, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(source.requests(), vec![(1, day(2))]);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(jitter(Duration::from_millis(20)) <= Duration::from_millis(20));
        }
    }

    #[tokio::test]
    async fn test_cursor_ends_after_last_observation() {
        let source = Arc::new(ScriptedSource::new(vec![location(0)], ClockZoneDirectory::new()));
        source.push_page(1, vec![observation(day(3), 0), observation(day(4), 90), observation(day(9), 0)]);
        let driver = driver(source, Arc::new(RecordingSink::new()), 1);

        let mut cursor = day(2);
        let mut stats = SweepStats::default();
        driver
            .fetch_round(&location(0), &ClockZoneDirectory::new(), &mut cursor, &mut stats)
            .await
            .unwrap();

        assert_eq!(cursor, day(10));
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.created, 1);
    }

    #[tokio::test]
    async fn test_empty_page_keeps_cursor() {
        let source = Arc::new(ScriptedSource::new(vec![location(0)], ClockZoneDirectory::new()));
        let driver = driver(source, Arc::new(RecordingSink::new()), 1);

        let mut cursor = day(2);
        let mut stats = SweepStats::default();
        driver
            .fetch_round(&location(0), &ClockZoneDirectory::new(), &mut cursor, &mut stats)
            .await
            .unwrap();

        assert_eq!(cursor, day(2));
        assert_eq!(stats, SweepStats::default());
    }

    #[tokio::test]
    async fn test_second_round_continues_from_cursor() {
        let source = Arc::new(ScriptedSource::new(vec![location(2)], ClockZoneDirectory::new()));
        source.push_page(1, vec![observation(day(4), 0), observation(day(6), 0)]);
        source.push_page(1, vec![observation(day(7), 0)]);
        let driver = driver(source.clone(), Arc::new(RecordingSink::new()), 2);

        let stats = driver.run_sweep(day(1)).await.unwrap();

        assert_eq!(source.requests(), vec![(1, day(4)), (1, day(7))]);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.locations, 1);
    }

    #[tokio::test]
    async fn test_open_then_closed_across_sweeps() {
        let today = day(1);
        let source = Arc::new(ScriptedSource::new(
            vec![location(0)],
            vec![zone()].into_iter().collect(),
        ));
        let sink = Arc::new(RecordingSink::new());
        let driver = driver(source.clone(), sink.clone(), 1);

        source.push_page(1, vec![observation(today, 50)]);
        let first = driver.run_sweep(today).await.unwrap();

        assert_eq!(first.created, 1);
        let created = sink.created();
        assert_eq!(created.len(), 1);
        assert!(created[0].contains(Severity::Medium.marker()));
        let key = SlotKey {
            location_id: 1,
            date: today,
            zone: zone(),
        };
        assert_eq!(
            driver.reconciler.table().snapshot().await,
            vec![(key, MessageHandle(1))]
        );

        source.push_page(1, vec![observation(today, 0)]);
        let second = driver.run_sweep(today).await.unwrap();

        assert_eq!(second.retracted, 1);
        assert_eq!(sink.deleted(), vec![MessageHandle(1)]);
        assert!(driver.reconciler.table().is_empty().await);
        assert_eq!(source.directory_fetches(), 2);
    }

    #[tokio::test]
    async fn test_sink_failure_ends_sweep() {
        let source = Arc::new(ScriptedSource::new(vec![location(0)], ClockZoneDirectory::new()));
        source.push_page(1, vec![observation(day(2), 10), observation(day(3), 10)]);
        let driver = driver(source.clone(), Arc::new(RecordingSink::failing()), 2);

        assert!(driver.run_sweep(day(1)).await.is_err());
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_alert_is_counted_every_sweep() {
        let source = Arc::new(ScriptedSource::new(vec![location(0)], ClockZoneDirectory::new()));
        let sink = Arc::new(RecordingSink::without_handles());
        let driver = driver(source.clone(), sink.clone(), 1);

        source.push_page(1, vec![observation(day(2), 60)]);
        let first = driver.run_sweep(day(1)).await.unwrap();
        source.push_page(1, vec![observation(day(2), 60)]);
        let second = driver.run_sweep(day(1)).await.unwrap();

        assert_eq!(first.unconfirmed, 1);
        assert_eq!(second.unconfirmed, 1);
        assert_eq!(first.created + second.created, 0);
        assert_eq!(sink.created().len(), 2);
        assert!(sink.deleted().is_empty());
        assert!(driver.reconciler.table().is_empty().await);
    }
}
