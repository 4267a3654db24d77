//! Text of the alert sent for a newly opened slot.

use chrono::{Locale, NaiveDate, NaiveTime};
use slot_types::{Location, Observation, Severity};

const SIREN: char = '\u{1F6A8}';

/// Weekday, day and month in Greek, e.g. "Δευτέρα 7 Ιουνίου"
pub fn pretty_date(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .and_utc()
        .format_localized("%A %-d %B", Locale::el_GR)
        .to_string()
}

pub fn format_message(observation: &Observation, location: &Location, booking_url: &str) -> String {
    let marker = Severity::from_percent(observation.percent_available).marker();
    format!(
        "{s}{s} Διαθεσιμότητα {marker} για {date} (ώρα {zone}) στο {name}! {s}{s}\nΚλείστε τώρα! {url}",
        s = SIREN,
        marker = marker,
        date = pretty_date(observation.date),
        zone = observation.zone,
        name = location.name,
        url = booking_url,
    )
}
