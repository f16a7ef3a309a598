use crate::llm::AdapterError;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};

/// Availability and last error of one adapter. Shared across concurrent
/// requests; writers are the initialize and failure paths only.
#[derive(Debug, Default)]
pub struct AdapterStatus {
    inner: RwLock<StatusSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub is_available: bool,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl AdapterStatus {
    pub fn available() -> Self {
        let status = Self::default();
        status.mark_available();
        status
    }

    pub fn is_available(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_available
    }

    pub fn mark_available(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.is_available = true;
    }

    pub fn mark_unavailable(&self, err: &AdapterError) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.is_available = false;
        inner.last_error = Some(err.to_string());
        inner.last_error_at = Some(Utc::now());
    }

    pub fn record_error(&self, err: &AdapterError) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.last_error = Some(err.to_string());
        inner.last_error_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ErrorKind, Provider};

    #[test]
    fn transitions_between_available_and_unavailable() {
        let status = AdapterStatus::default();
        assert!(!status.is_available());

        status.mark_available();
        assert!(status.is_available());

        let err = AdapterError::new(Provider::OpenAI, ErrorKind::Timeout, "slow");
        status.record_error(&err);
        assert!(status.is_available());
        assert!(status.snapshot().last_error.unwrap().contains("slow"));

        let err = AdapterError::new(Provider::OpenAI, ErrorKind::Auth, "bad key");
        status.mark_unavailable(&err);
        let snap = status.snapshot();
        assert!(!snap.is_available);
        assert!(snap.last_error.unwrap().contains("bad key"));
        assert!(snap.last_error_at.is_some());
    }
}
