//! Per-run stream context.

use chrono::Utc;
use uuid::Uuid;

/// Immutable context for one run's stream.
///
/// Built once before the multiplexer starts and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSession {
    start_time: f64,
    client_id: Option<String>,
}

impl StreamSession {
    /// Session for a run that started at `start_time` seconds since the epoch.
    pub fn new(start_time: f64) -> Self {
        Self {
            start_time,
            client_id: None,
        }
    }

    /// Session for a run starting now.
    pub fn starting_now() -> Self {
        let now = Utc::now();
        let secs = now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9;
        Self::new(secs)
    }

    /// Tag stream/table updates with this client id.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Tag stream/table updates with a fresh random client id.
    pub fn with_generated_client_id(self) -> Self {
        self.with_client_id(Uuid::new_v4().simple().to_string())
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_is_optional() {
        let session = StreamSession::new(10.0);
        assert_eq!(session.start_time(), 10.0);
        assert!(session.client_id().is_none());
        assert_eq!(session.with_client_id("abc").client_id(), Some("abc"));
    }

    #[test]
    fn generated_client_ids_differ() {
        let a = StreamSession::new(0.0).with_generated_client_id();
        let b = StreamSession::new(0.0).with_generated_client_id();
        assert_eq!(a.client_id().map(str::len), Some(32));
        assert_ne!(a.client_id(), b.client_id());
    }

    #[test]
    fn starting_now_is_recent() {
        let session = StreamSession::starting_now();
        let now = Utc::now().timestamp() as f64;
        assert!((now - session.start_time()).abs() < 5.0);
    }
}
