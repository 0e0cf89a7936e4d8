use chrono::{DateTime, Utc};

/// Wall-clock instant. Only the binary and env defaults read the clock;
/// the ranking stages take their instant as an argument.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
