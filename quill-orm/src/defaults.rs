//! Stock generators for [`Field::generated`](crate::schema::Field::generated)

use chrono::Utc;
use uuid::Uuid;

use crate::value::Value;

/// Time-sortable 50 character identifier
///
/// 15 zero-padded digits of milliseconds since the epoch, the 32 hex digits
/// of a random UUID, then `000`.
pub fn next_id() -> Value {
    Value::Text(format!(
        "{:015}{}000",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    ))
}

/// Seconds since the UNIX epoch as a float
pub fn now_timestamp() -> Value {
    let now = Utc::now();
    Value::Float(now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6)
}
