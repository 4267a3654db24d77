//! Watches a reservation service for newly opened appointment slots and keeps
//! exactly one Telegram alert per open slot, withdrawing it once the slot
//! fills up or the process stops.

pub mod config;
pub mod driver;
pub mod error;
pub mod message;
pub mod reconciler;
pub mod reservation_client;
pub mod shutdown;
pub mod sources;
pub mod state;
pub mod telegram;

#[cfg(test)]
mod testing;

pub use config::{Config, PollingConfig, TelegramConfig};
pub use driver::{PollDriver, SweepStats};
pub use error::{WatchError, WatchResult};
pub use reconciler::{Outcome, Reconciler};
pub use reservation_client::ReservationClient;
pub use shutdown::{ShutdownHandler, StopReason};
pub use state::SlotTable;
pub use telegram::TelegramSink;
