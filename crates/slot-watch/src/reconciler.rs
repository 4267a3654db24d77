//! Turns availability observations into create/retract decisions.
//!
//! Per slot the state is either absent (no alert showing) or notified. An
//! available observation of an absent slot creates an alert, a zero
//! observation of a notified slot retracts it, anything else is a no-op.

use slot_types::{Location, Observation, Severity, SlotKey};
use std::sync::Arc;

use crate::error::WatchResult;
use crate::message::format_message;
use crate::sources::NotificationSink;
use crate::state::SlotTable;

/// What one observation did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Retracted,
    Unchanged,
    /// The sink accepted the message but returned no handle, so it can never
    /// be withdrawn. The slot stays absent and is alerted again next time.
    Unconfirmed,
}

pub struct Reconciler<S> {
    table: SlotTable,
    sink: Arc<S>,
    booking_url: String,
}

impl<S: NotificationSink> Reconciler<S> {
    pub fn new(table: SlotTable, sink: Arc<S>, booking_url: impl Into<String>) -> Self {
        Self {
            table,
            sink,
            booking_url: booking_url.into(),
        }
    }

    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    /// Apply one observation.
    ///
    /// The guard is held across the decision, the sink call and the table
    /// write, so the shutdown drain never sees a half-applied update.
    pub async fn reconcile(
        &self,
        location: &Location,
        observation: &Observation,
    ) -> WatchResult<Outcome> {
        let key = SlotKey::new(location, observation);
        let mut slots = self.table.lock().await;

        if observation.is_available() && !slots.contains_key(&key) {
            let severity = Severity::from_percent(observation.percent_available);
            let text = format_message(observation, location, &self.booking_url);
            tracing::info!("new: {} ({} availability) with {}", key, severity.as_str(), text);

            return match self.sink.create(&text).await? {
                Some(handle) => {
                    slots.insert(key, handle);
                    Ok(Outcome::Created)
                }
                None => {
                    tracing::error!(
                        "message for {} sent without a handle, it cannot be withdrawn",
                        key
                    );
                    Ok(Outcome::Unconfirmed)
                }
            };
        }

        if !observation.is_available() {
            if let Some(handle) = slots.get(&key).cloned() {
                tracing::info!("filled: {}", key);
                self.sink.delete(&handle).await?;
                slots.remove(&key);
                return Ok(Outcome::Retracted);
            }
        }

        Ok(Outcome::Unchanged)
    }
}
