use crate::llm::{ErrorKind, Provider};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ManagerEvent {
    ProviderSwitched {
        from: Option<Provider>,
        to: Provider,
    },
    ProviderFailed {
        provider: Provider,
        kind: ErrorKind,
        retryable: bool,
        attempt: u32,
        message: String,
    },
    ProviderRecovered {
        provider: Provider,
    },
    FallbackActivated {
        from: Option<Provider>,
        to: Provider,
    },
    AllProvidersFailed {
        attempted: Vec<Provider>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ManagerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.tx.subscribe()
    }

    /// Logs the event and hands it to any subscribers. Nobody listening is fine.
    pub fn emit(&self, event: ManagerEvent) {
        match &event {
            ManagerEvent::ProviderSwitched { from, to } => {
                tracing::info!(?from, %to, "provider switched");
            }
            ManagerEvent::ProviderFailed {
                provider,
                kind,
                retryable,
                attempt,
                message,
            } => {
                tracing::warn!(
                    %provider,
                    kind = kind.as_str(),
                    retryable,
                    attempt,
                    error = %message,
                    "provider failed"
                );
            }
            ManagerEvent::ProviderRecovered { provider } => {
                tracing::info!(%provider, "provider recovered");
            }
            ManagerEvent::FallbackActivated { from, to } => {
                tracing::warn!(?from, %to, "fallback activated");
            }
            ManagerEvent::AllProvidersFailed { attempted } => {
                tracing::error!(?attempted, "all providers failed");
            }
        }
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let v = serde_json::to_value(ManagerEvent::FallbackActivated {
            from: Some(Provider::OpenAI),
            to: Provider::Mock,
        })
        .unwrap();
        assert_eq!(v["event"], "fallback-activated");
        assert_eq!(v["from"], "openai");
        assert_eq!(v["to"], "mock");
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        bus.emit(ManagerEvent::ProviderRecovered {
            provider: Provider::Grok,
        });

        let mut rx = bus.subscribe();
        bus.emit(ManagerEvent::ProviderRecovered {
            provider: Provider::Claude,
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            ManagerEvent::ProviderRecovered {
                provider: Provider::Claude
            }
        );
    }
}
