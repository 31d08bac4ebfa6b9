//! Provider adapters and the ordered fallback chain.
//!
//! Every capability is served by a [`Chain`]: a declarative, ordered list of
//! [`Adapter`]s. [`Chain::run`] calls them strictly in sequence, normalizes
//! each raw success, and returns the first one that survives normalization.
//!
//! ```text
//! request ──▶ adapter 0 ──fail──▶ adapter 1 ──fail──▶ ... ──▶ AllProvidersFailed
//!                │ ok                 │ ok
//!                ▼                    ▼
//!            normalize ──fail──▶ (next adapter)
//!                │ ok
//!                ▼
//!          ChainSuccess { provider, value, attempts }
//! ```
//!
//! Each adapter gets exactly one attempt. Warm-up waits that a particular
//! provider needs live inside that adapter, not here.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{CapabilityError, NormalizeError, ProviderError};
use crate::provider::TextStream;

/// Wraps one external inference provider behind a uniform call signature.
#[async_trait]
pub trait Adapter<Req: Send + Sync, Out: Send>: Send + Sync {
    /// Identifier used in attempt logs and response headers
    /// (e.g. `"huggingface:bart-cnn"`).
    fn name(&self) -> &str;

    /// Whether the provider credential is present. Unconfigured adapters are
    /// skipped without being called.
    fn is_configured(&self) -> bool {
        true
    }

    /// Perform one call. All provider failures come back as [`ProviderError`].
    async fn call(&self, request: &Req) -> Result<Out, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
    Skipped,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Succeeded => write!(f, "succeeded"),
            AttemptOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            AttemptOutcome::Skipped => write!(f, "skipped (not configured)"),
        }
    }
}

/// Record of one adapter in a chain run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// First successful, normalized result of a chain run.
#[derive(Debug)]
pub struct ChainSuccess<T> {
    pub provider: String,
    pub value: T,
    pub attempts: Vec<Attempt>,
}

pub struct Chain<Req: Send + Sync, Out: Send> {
    capability: String,
    adapters: Vec<Arc<dyn Adapter<Req, Out>>>,
}

impl<Req, Out> Chain<Req, Out>
where
    Req: Send + Sync,
    Out: Send,
{
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            adapters: Vec::new(),
        }
    }

    /// Append an adapter at the lowest priority so far.
    pub fn with(mut self, adapter: Arc<dyn Adapter<Req, Out>>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// True when at least one adapter has a credential.
    pub fn is_configured(&self) -> bool {
        self.adapters.iter().any(|a| a.is_configured())
    }

    /// Run the chain without a normalization step.
    pub async fn run_raw(&self, request: &Req) -> Result<ChainSuccess<Out>, CapabilityError> {
        self.run(request, |raw| Ok(raw)).await
    }

    /// Invoke adapters in order and return the first normalized success.
    ///
    /// A normalization failure counts as a failure of that adapter and moves
    /// on to the next one.
    pub async fn run<T, F>(
        &self,
        request: &Req,
        normalize: F,
    ) -> Result<ChainSuccess<T>, CapabilityError>
    where
        T: Send,
        F: Fn(Out) -> Result<T, NormalizeError> + Send + Sync,
    {
        if !self.is_configured() {
            tracing::warn!(capability = %self.capability, "no provider configured");
            return Err(CapabilityError::NotConfigured {
                capability: self.capability.clone(),
            });
        }

        let mut attempts = Vec::with_capacity(self.adapters.len());

        for adapter in &self.adapters {
            let provider = adapter.name().to_string();

            if !adapter.is_configured() {
                tracing::debug!(capability = %self.capability, %provider, "skipping unconfigured provider");
                attempts.push(Attempt {
                    provider,
                    outcome: AttemptOutcome::Skipped,
                });
                continue;
            }

            let started = Instant::now();
            let result = adapter
                .call(request)
                .await
                .and_then(|raw| normalize(raw).map_err(ProviderError::from));
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(value) => {
                    tracing::info!(capability = %self.capability, %provider, elapsed_ms, "provider succeeded");
                    attempts.push(Attempt {
                        provider: provider.clone(),
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return Ok(ChainSuccess {
                        provider,
                        value,
                        attempts,
                    });
                }
                Err(err) => {
                    tracing::warn!(capability = %self.capability, %provider, elapsed_ms, error = %err, "provider failed");
                    attempts.push(Attempt {
                        provider,
                        outcome: AttemptOutcome::Failed(err.to_string()),
                    });
                }
            }
        }

        Err(CapabilityError::AllProvidersFailed {
            capability: self.capability.clone(),
            attempts,
        })
    }
}

impl<Req> Chain<Req, TextStream>
where
    Req: Send + Sync,
{
    /// Streaming run. An adapter counts as successful once its stream is
    /// established; failures after the first fragment are not failed over.
    pub async fn run_stream(
        &self,
        request: &Req,
    ) -> Result<ChainSuccess<TextStream>, CapabilityError> {
        self.run_raw(request).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted adapter that counts its calls.
    pub struct MockAdapter<Out> {
        pub name: String,
        pub configured: bool,
        pub reply: Mutex<Option<Result<Out, ProviderError>>>,
        pub calls: AtomicUsize,
        pub log: Option<Arc<Mutex<Vec<String>>>>,
    }

    impl<Out> MockAdapter<Out> {
        pub fn ok(name: &str, value: Out) -> Self {
            Self::new(name, true, Ok(value))
        }

        pub fn failing(name: &str) -> Self {
            Self::new(
                name,
                true,
                Err(ProviderError::Http {
                    status: 500,
                    message: format!("{} exploded", name),
                }),
            )
        }

        pub fn unconfigured(name: &str) -> Self {
            Self::new(
                name,
                false,
                Err(ProviderError::NotConfigured {
                    provider: name.to_string(),
                }),
            )
        }

        fn new(name: &str, configured: bool, reply: Result<Out, ProviderError>) -> Self {
            Self {
                name: name.to_string(),
                configured,
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
                log: None,
            }
        }

        pub fn logging_to(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
            self.log = Some(log);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<Req, Out> Adapter<Req, Out> for MockAdapter<Out>
    where
        Req: Send + Sync,
        Out: Send,
    {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn call(&self, _request: &Req) -> Result<Out, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = &self.log {
                log.lock().unwrap().push(self.name.clone());
            }
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ProviderError::Network("mock already used".to_string())))
        }
    }
}
