pub mod config;
pub mod db;
pub mod dismissal;
pub mod file_store;
pub mod http;
pub mod identity;
pub mod kv_store;
pub mod logging;
pub mod migrations;
pub mod notification;
pub mod reconcile;
pub mod server;
pub mod settings;

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::TimeZone;
    chrono::Utc.timestamp_millis_opt(millis).single()
}
