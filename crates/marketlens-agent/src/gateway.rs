use crate::backends::{build_backend, LlmBackend};
use crate::config::{GatewayConfig, RetryPolicy};
use crate::llm::NormalizedTurn;
use marketlens_core::{MarketlensError, MarketlensResult, Transcript};
use marketlens_tools::ToolDescriptor;
use tracing::{info, warn};

/// Primary/fallback pair of backends with the retry-then-failover policy.
///
/// On the primary, a transient failure (timeout, connection error, HTTP 5xx) is retried
/// `max_retries` times; once those are spent the fallback gets exactly one attempt. A
/// non-transient failure ends the request at once. Every give-up is reported as
/// [`MarketlensError::ProviderUnavailable`] carrying the last backend error as its source.
pub struct ProviderGateway {
    primary: Box<dyn LlmBackend>,
    fallback: Option<Box<dyn LlmBackend>>,
    policy: RetryPolicy,
}

impl ProviderGateway {
    pub fn new(
        primary: Box<dyn LlmBackend>,
        fallback: Option<Box<dyn LlmBackend>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> MarketlensResult<Self> {
        let primary = build_backend(config.primary.clone())?;
        let fallback = config.fallback.clone().map(build_backend).transpose()?;
        Ok(Self::new(primary, fallback, config.retry_policy.clone()))
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback.as_deref().map(|b| b.name())
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.policy.compute_backoff(attempt);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }

    /// Requests the next model turn for `transcript`.
    pub async fn next_turn(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> MarketlensResult<NormalizedTurn> {
        let unresolved = transcript.unresolved_tool_requests();
        if !unresolved.is_empty() {
            return Err(MarketlensError::provider_unavailable(
                "transcript is not sendable",
                MarketlensError::Tool(format!(
                    "tool requests without results: {}",
                    unresolved.join(", ")
                )),
            ));
        }

        let primary = self.primary.as_ref();
        let mut last_err = None;
        for attempt in 0..=self.policy.max_retries {
            match primary.next_turn(system_prompt, transcript, tools).await {
                Ok(turn) => return Ok(turn),
                Err(e) if !e.is_transient() => {
                    warn!(backend = primary.name(), attempt, error = %e, "Non-retryable backend error");
                    return Err(MarketlensError::provider_unavailable(
                        format!("{} failed", primary.name()),
                        e,
                    ));
                }
                Err(e) => {
                    if attempt < self.policy.max_retries {
                        info!(
                            backend = primary.name(),
                            attempt,
                            delay_ms = self.policy.compute_backoff(attempt),
                            error = %e,
                            "Transient backend error, retrying"
                        );
                        self.backoff(attempt).await;
                    } else {
                        warn!(backend = primary.name(), attempt, error = %e, "Primary backend exhausted");
                    }
                    last_err = Some(e);
                }
            }
        }

        let primary_err = last_err.unwrap_or_else(|| {
            MarketlensError::Connection(format!("{} was never attempted", primary.name()))
        });

        let Some(fallback) = self.fallback.as_deref() else {
            return Err(MarketlensError::provider_unavailable(
                format!("{} failed and no fallback is configured", primary.name()),
                primary_err,
            ));
        };

        info!(backend = fallback.name(), "Falling back");
        match fallback.next_turn(system_prompt, transcript, tools).await {
            Ok(turn) => Ok(turn),
            Err(e) => {
                warn!(backend = fallback.name(), error = %e, "Fallback backend failed");
                Err(MarketlensError::provider_unavailable(
                    "all backends exhausted",
                    e,
                ))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::llm::StopReason;
    use async_trait::async_trait;
    use marketlens_core::{ContentBlock, ToolCall, Turn};
    use std::error::Error as _;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// A mock backend that returns a sequence of results.
    struct MockBackend {
        name: String,
        results: tokio::sync::Mutex<Vec<MarketlensResult<NormalizedTurn>>>,
        call_count: Arc<AtomicU32>,
    }

    impl MockBackend {
        fn new(name: &str, results: Vec<MarketlensResult<NormalizedTurn>>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    name: name.into(),
                    results: tokio::sync::Mutex::new(results),
                    call_count: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn next_turn(
            &self,
            _system_prompt: &str,
            _transcript: &Transcript,
            _tools: &[ToolDescriptor],
        ) -> MarketlensResult<NormalizedTurn> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().await;
            if results.is_empty() {
                Err(MarketlensError::Connection("MockBackend: no more results".into()))
            } else {
                results.remove(0)
            }
        }
    }

    fn answer(text: &str) -> MarketlensResult<NormalizedTurn> {
        Ok(NormalizedTurn::new(
            vec![ContentBlock::text(text)],
            StopReason::EndOfTurn,
        ))
    }

    fn timeout() -> MarketlensResult<NormalizedTurn> {
        Err(MarketlensError::Timeout("10s elapsed".into()))
    }

    fn transcript() -> Transcript {
        Transcript::seeded("Analyze OGDC")
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_try() {
        let (primary, primary_calls) = MockBackend::new("p", vec![timeout(), answer("ok")]);
        let (fallback, fallback_calls) = MockBackend::new("f", vec![answer("fallback")]);
        let gw = ProviderGateway::new(Box::new(primary), Some(Box::new(fallback)), RetryPolicy::default());

        let turn = gw.next_turn("sys", &transcript(), &[]).await.unwrap();
        assert_eq!(turn.text(), "ok");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_after_two_transient_failures() {
        let (primary, primary_calls) = MockBackend::new(
            "p",
            vec![
                Err(MarketlensError::Http { status: 503, message: "overloaded".into() }),
                Err(MarketlensError::Connection("reset".into())),
            ],
        );
        let (fallback, fallback_calls) = MockBackend::new("f", vec![answer("from fallback")]);
        let gw = ProviderGateway::new(Box::new(primary), Some(Box::new(fallback)), RetryPolicy::default());

        let turn = gw.next_turn("sys", &transcript(), &[]).await.unwrap();
        assert_eq!(turn.text(), "from fallback");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_exhausted_is_provider_unavailable() {
        let (primary, _) = MockBackend::new("p", vec![timeout(), timeout()]);
        let (fallback, fallback_calls) = MockBackend::new(
            "f",
            vec![Err(MarketlensError::Http { status: 500, message: "down".into() })],
        );
        let gw = ProviderGateway::new(Box::new(primary), Some(Box::new(fallback)), RetryPolicy::default());

        let err = gw.next_turn("sys", &transcript(), &[]).await.unwrap_err();
        assert!(matches!(err, MarketlensError::ProviderUnavailable { .. }));
        assert!(err.source().unwrap().to_string().contains("500"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_transient_is_not_retried() {
        let (primary, primary_calls) = MockBackend::new(
            "p",
            vec![Err(MarketlensError::Http { status: 401, message: "bad key".into() })],
        );
        let (fallback, fallback_calls) = MockBackend::new("f", vec![answer("unused")]);
        let gw = ProviderGateway::new(Box::new(primary), Some(Box::new(fallback)), RetryPolicy::default());

        let err = gw.next_turn("sys", &transcript(), &[]).await.unwrap_err();
        assert!(matches!(err, MarketlensError::ProviderUnavailable { .. }));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("401"));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_fallback_configured() {
        let (primary, primary_calls) = MockBackend::new("p", vec![timeout(), timeout()]);
        let gw = ProviderGateway::new(Box::new(primary), None, RetryPolicy::default());

        let err = gw.next_turn("sys", &transcript(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("no fallback"));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(gw.fallback_name(), None);
    }

    #[tokio::test]
    async fn refuses_transcript_with_dangling_tool_request() {
        let (primary, primary_calls) = MockBackend::new("p", vec![answer("unused")]);
        let gw = ProviderGateway::new(Box::new(primary), None, RetryPolicy::default());

        let mut t = transcript();
        t.push(Turn::assistant(vec![ContentBlock::tool_use(&ToolCall {
            id: "toolu_1".into(),
            name: "load_stock_data".into(),
            arguments: serde_json::json!({}),
        })]));

        let err = gw.next_turn("sys", &t, &[]).await.unwrap_err();
        assert!(matches!(err, MarketlensError::ProviderUnavailable { .. }));
        assert!(err.source().unwrap().to_string().contains("toolu_1"));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    }
}
