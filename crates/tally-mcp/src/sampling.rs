use std::sync::Arc;
use std::time::Duration;

use tally_core::{
    CalculationResult, CombinedArtifact, ExchangeQuote, ModelHint, SamplingOutcome,
    SamplingRequest,
};

use crate::session::{LogLevel, Session};

/// Fixed system prompt shared by every sampling request.
pub const SYSTEM_PROMPT: &str = "You are a creative mathematics teacher who explains \
     calculations in an engaging and imaginative way!";

/// Settings for one orchestrator: which backends to ask, in order, and
/// how long to wait for each.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    pub hints: Vec<ModelHint>,
    pub per_hint_deadline: Option<Duration>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            hints: vec![ModelHint::new("openai"), ModelHint::new("github")],
            per_hint_deadline: None,
        }
    }
}

/// Fans one calculation out to every configured model backend through
/// the session's sampling primitive and reassembles the replies.
///
/// Dispatch is concurrent (one task per hint, joined in hint order) and
/// failure-isolated: a backend error, a missing capability, or an
/// expired deadline for one hint only marks that hint's section.
pub struct Orchestrator {
    session: Arc<Session>,
    config: SamplingConfig,
}

impl Orchestrator {
    pub fn new(session: Arc<Session>, config: SamplingConfig) -> Self {
        Self { session, config }
    }

    /// Build the user prompt for a calculation, with an optional
    /// exchange-rate annotation. Deterministic in its inputs.
    #[must_use]
    pub fn build_user_prompt(result: &CalculationResult, quote: Option<&ExchangeQuote>) -> String {
        let mut prompt = format!(
            "Please create a creative and educational explanation for this calculation. \
             Use metaphors, storytelling, or real-world examples to make it interesting:\n\n\
             Calculation: {} {} {} = {}\nOperation: {}\n",
            result.a,
            result.operation.symbol(),
            result.b,
            result.value,
            result.operation
        );

        if let Some(quote) = quote {
            prompt.push_str(&format!(
                "Exchange rate: 1 {} = {} {}\n",
                quote.from, quote.rate, quote.to
            ));
        }

        prompt.push_str(
            "\nMake it engaging and educational. Use markdown formatting for better presentation.",
        );
        prompt
    }

    /// Ask every configured backend to explain the calculation and
    /// combine the outcomes. Sections appear in configured hint order
    /// no matter which backends fail or how slowly they answer.
    pub async fn explain(
        &self,
        result: &CalculationResult,
        quote: Option<&ExchangeQuote>,
    ) -> CombinedArtifact {
        self.session
            .notify_logging(LogLevel::Info, "Start sampling for calculation explanation")
            .await;

        let user_prompt = Self::build_user_prompt(result, quote);

        let mut in_flight = Vec::with_capacity(self.config.hints.len());
        for hint in &self.config.hints {
            let session = Arc::clone(&self.session);
            let request = SamplingRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                user_prompt: user_prompt.clone(),
                model_hint: hint.clone(),
            };
            let deadline = self.config.per_hint_deadline;

            let handle =
                tokio::spawn(async move { session.create_message(&request, deadline).await });
            in_flight.push((hint.clone(), handle));
        }

        let mut sections = Vec::with_capacity(in_flight.len());
        for (hint, handle) in in_flight {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    tracing::warn!("sampling via '{hint}' failed: {err}");
                    SamplingOutcome::Failure {
                        reason: err.to_string(),
                    }
                }
                Err(join_err) => {
                    tracing::error!("sampling task for '{hint}' did not complete: {join_err}");
                    SamplingOutcome::Failure {
                        reason: "sampling task did not complete".to_string(),
                    }
                }
            };
            sections.push((hint, outcome));
        }

        self.session
            .notify_logging(LogLevel::Info, "Finish sampling for calculation explanation")
            .await;

        CombinedArtifact {
            result: result.clone(),
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use tally_core::{evaluate, Operation};

    use crate::session::{
        PeerCapabilities, SessionError, Transport, METHOD_CREATE_MESSAGE, METHOD_LOG_MESSAGE,
    };

    use super::*;

    /// Transport whose sampling replies depend on the requested hint.
    /// Backends answer out of order via a per-hint delay to prove the
    /// artifact still follows hint declaration order.
    #[derive(Default)]
    struct HintedTransport {
        notifications: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
        failing_hints: Vec<String>,
        delays_ms: Vec<(String, u64)>,
    }

    impl HintedTransport {
        fn failing(hints: &[&str]) -> Self {
            Self {
                failing_hints: hints.iter().map(ToString::to_string).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Transport for HintedTransport {
        async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError> {
            assert_eq!(method, METHOD_CREATE_MESSAGE);
            let hint = params["modelPreferences"]["hints"][0]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            self.prompts.lock().unwrap().push(
                params["messages"][0]["content"]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            );

            if let Some((_, delay)) = self.delays_ms.iter().find(|(h, _)| *h == hint) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }

            if self.failing_hints.contains(&hint) {
                return Err(SessionError::Transport(format!("{hint} backend exploded")));
            }

            Ok(serde_json::json!({
                "content": { "type": "text", "text": format!("{hint} says: numbers!") }
            }))
        }

        async fn notify(&self, method: &str, _params: Value) {
            self.notifications.lock().unwrap().push(method.to_string());
        }
    }

    fn hints(names: &[&str]) -> Vec<ModelHint> {
        names.iter().map(|name| ModelHint::new(*name)).collect()
    }

    fn sampling_session(transport: Arc<dyn Transport>) -> Arc<Session> {
        Arc::new(Session::negotiated(
            transport,
            PeerCapabilities { sampling: true },
        ))
    }

    fn forty_two() -> CalculationResult {
        evaluate(15.0, 27.0, "add").unwrap()
    }

    #[tokio::test]
    async fn all_backends_succeed() {
        let session = sampling_session(Arc::new(HintedTransport::default()));
        let orchestrator = Orchestrator::new(
            session,
            SamplingConfig {
                hints: hints(&["openai", "ollama", "github"]),
                per_hint_deadline: None,
            },
        );

        let artifact = orchestrator.explain(&forty_two(), None).await;
        assert_eq!(artifact.sections.len(), 3);
        assert!(artifact.sections.iter().all(|(_, o)| o.is_success()));
    }

    #[tokio::test]
    async fn one_failure_never_touches_siblings() {
        let transport = Arc::new(HintedTransport::failing(&["ollama"]));
        let orchestrator = Orchestrator::new(
            sampling_session(transport),
            SamplingConfig {
                hints: hints(&["openai", "ollama"]),
                per_hint_deadline: None,
            },
        );

        let artifact = orchestrator.explain(&forty_two(), None).await;
        assert_eq!(artifact.sections.len(), 2);

        let (first_hint, first) = &artifact.sections[0];
        assert_eq!(first_hint.as_str(), "openai");
        assert_eq!(
            *first,
            SamplingOutcome::Success {
                text: "openai says: numbers!".to_string()
            }
        );

        let (second_hint, second) = &artifact.sections[1];
        assert_eq!(second_hint.as_str(), "ollama");
        assert!(
            matches!(second, SamplingOutcome::Failure { reason } if reason.contains("exploded"))
        );
    }

    #[tokio::test]
    async fn slow_backend_does_not_reorder_sections() {
        let transport = Arc::new(HintedTransport {
            delays_ms: vec![("openai".to_string(), 50)],
            ..HintedTransport::default()
        });
        let orchestrator = Orchestrator::new(
            sampling_session(transport),
            SamplingConfig {
                hints: hints(&["openai", "ollama"]),
                per_hint_deadline: None,
            },
        );

        let artifact = orchestrator.explain(&forty_two(), None).await;
        let order: Vec<&str> = artifact
            .sections
            .iter()
            .map(|(hint, _)| hint.as_str())
            .collect();
        assert_eq!(order, vec!["openai", "ollama"]);
    }

    #[tokio::test]
    async fn deadline_marks_only_the_slow_hint() {
        let transport = Arc::new(HintedTransport {
            delays_ms: vec![("ollama".to_string(), 5_000)],
            ..HintedTransport::default()
        });
        let orchestrator = Orchestrator::new(
            sampling_session(transport),
            SamplingConfig {
                hints: hints(&["openai", "ollama"]),
                per_hint_deadline: Some(Duration::from_millis(100)),
            },
        );

        let artifact = orchestrator.explain(&forty_two(), None).await;
        assert!(artifact.sections[0].1.is_success());
        assert_eq!(
            artifact.sections[1].1,
            SamplingOutcome::Failure {
                reason: "timeout".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_capability_still_yields_every_section() {
        let session = Arc::new(Session::negotiated(
            Arc::new(HintedTransport::default()),
            PeerCapabilities { sampling: false },
        ));
        let orchestrator = Orchestrator::new(
            session,
            SamplingConfig {
                hints: hints(&["openai", "github"]),
                per_hint_deadline: None,
            },
        );

        let artifact = orchestrator.explain(&forty_two(), None).await;
        assert_eq!(artifact.sections.len(), 2);
        for (_, outcome) in &artifact.sections {
            assert!(
                matches!(outcome, SamplingOutcome::Failure { reason } if reason.contains("capability"))
            );
        }
    }

    #[tokio::test]
    async fn progress_notifications_bracket_dispatch() {
        let transport = Arc::new(HintedTransport::default());
        let orchestrator = Orchestrator::new(
            sampling_session(transport.clone()),
            SamplingConfig {
                hints: hints(&["openai"]),
                per_hint_deadline: None,
            },
        );

        orchestrator.explain(&forty_two(), None).await;

        let notes = transport.notifications.lock().unwrap();
        assert_eq!(notes.as_slice(), [METHOD_LOG_MESSAGE, METHOD_LOG_MESSAGE]);
    }

    #[tokio::test]
    async fn quote_annotation_reaches_the_wire() {
        let transport = Arc::new(HintedTransport::default());
        let orchestrator = Orchestrator::new(
            sampling_session(transport.clone()),
            SamplingConfig {
                hints: hints(&["openai"]),
                per_hint_deadline: None,
            },
        );

        let quote = ExchangeQuote {
            from: tally_core::CurrencyCode::parse("USD").unwrap(),
            to: tally_core::CurrencyCode::parse("EUR").unwrap(),
            rate: 0.9235,
            as_of: chrono::Utc::now(),
        };
        orchestrator.explain(&forty_two(), Some(&quote)).await;

        let prompts = transport.prompts.lock().unwrap();
        assert!(prompts[0].contains("Exchange rate: 1 USD = 0.9235 EUR"));
    }

    #[test]
    fn prompt_is_deterministic_and_annotated() {
        let result = forty_two();
        let base = Orchestrator::build_user_prompt(&result, None);
        assert_eq!(base, Orchestrator::build_user_prompt(&result, None));
        assert!(base.contains("15 + 27 = 42"));
        assert!(base.contains("Operation: add"));

        let quote = ExchangeQuote {
            from: tally_core::CurrencyCode::parse("USD").unwrap(),
            to: tally_core::CurrencyCode::parse("EUR").unwrap(),
            rate: 0.9235,
            as_of: chrono::Utc::now(),
        };
        let annotated = Orchestrator::build_user_prompt(&result, Some(&quote));
        assert!(annotated.contains("1 USD = 0.9235 EUR"));
    }

    #[test]
    fn division_result_prompts_with_symbol() {
        let result = evaluate(6.0, 3.0, "divide").unwrap();
        assert_eq!(result.operation, Operation::Divide);
        let prompt = Orchestrator::build_user_prompt(&result, None);
        assert!(prompt.contains("6 ÷ 3 = 2"));
    }
}
