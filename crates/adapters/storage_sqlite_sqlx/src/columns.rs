//! Column encoding shared by the repositories.

use chrono::SecondsFormat;
use serde::de::DeserializeOwned;

use funnelhub_domain::page::Page;
use funnelhub_domain::time::Timestamp;

pub(crate) fn timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn parse_optional_timestamp(value: Option<&str>) -> Result<Option<Timestamp>, sqlx::Error> {
    value.map(parse_timestamp).transpose()
}

pub(crate) fn parse_json<T: DeserializeOwned>(value: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(value).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn decode<T, E>(value: Result<T, E>) -> Result<T, sqlx::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    value.map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// `(LIMIT, OFFSET)` bind values for a page.
pub(crate) fn window(page: Page) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

pub(crate) fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}
