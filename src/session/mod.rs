//! Session identity binding
//!
//! Every offline-signing request carries a session token built from the peer
//! id, the uploaded content hash and a time component. The coordinator uses it
//! for correlation only; it is not a cryptographic signature.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Separator between token components
pub const TOKEN_DELIMITER: char = ':';

/// Time component emitted by deployed clients in place of a real time value
///
/// Coordinators already in service may match on it, so it is the default.
pub const LEGACY_TIME_COMPONENT: &str = "time.Now().String()";

/// What goes into the third token component
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeComponent {
    /// The fixed [`LEGACY_TIME_COMPONENT`] literal
    #[default]
    Legacy,
    /// The issue time in unix nanoseconds
    WallClock,
}

/// A session token and the instant it was issued
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionToken {
    /// Correlation string sent with the request
    pub token: String,
    /// Issue time, unix nanoseconds; unique within this process
    pub issued_at: i64,
}

/// Builds session tokens
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionBinder {
    time_component: TimeComponent,
}

impl SessionBinder {
    /// Create a binder with the given time component policy
    pub fn new(time_component: TimeComponent) -> Self {
        SessionBinder { time_component }
    }

    /// Time component policy in use
    pub fn time_component(&self) -> TimeComponent {
        self.time_component
    }

    /// Bind a request to `peer_id` and `content_hash`, issued now
    pub fn bind(&self, peer_id: &str, content_hash: &str) -> SessionToken {
        self.bind_at(peer_id, content_hash, issued_at_nanos())
    }

    /// Bind a request with an explicit issue time
    pub fn bind_at(&self, peer_id: &str, content_hash: &str, issued_at: i64) -> SessionToken {
        let time = match self.time_component {
            TimeComponent::Legacy => LEGACY_TIME_COMPONENT.to_string(),
            TimeComponent::WallClock => issued_at.to_string(),
        };

        SessionToken {
            token: format!("{peer_id}{TOKEN_DELIMITER}{content_hash}{TOKEN_DELIMITER}{time}"),
            issued_at,
        }
    }
}

/// Current unix time in nanoseconds, strictly increasing across calls
///
/// Two calls in the same nanosecond (or a clock step backwards) still yield
/// distinct values, so channel-commit payer ids never collide in one process.
pub fn issued_at_nanos() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default();

    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Current unix time in seconds, as sent in the `uts` request argument
pub fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}
