use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calc::CalculationResult;
use crate::error::Error;

/// A normalized ISO-4217-style currency code, uppercase and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Normalize a raw currency code: trim, reject empty, uppercase.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCurrency(
                "currency code cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An exchange rate between two currencies at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: f64,
    pub as_of: DateTime<Utc>,
}

/// Opaque label selecting which model backend should service a
/// sampling request (e.g. "openai", "ollama", "github").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelHint(pub String);

impl ModelHint {
    pub fn new(hint: impl Into<String>) -> Self {
        Self(hint.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single completion request destined for one model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model_hint: ModelHint,
}

/// The resolution of one sampling dispatch. Every dispatched request
/// ends in exactly one outcome; failures carry a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SamplingOutcome {
    Success { text: String },
    Failure { reason: String },
}

impl SamplingOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The assembled output of one explanation run: the original numeric
/// result plus one outcome per configured backend, in hint order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedArtifact {
    pub result: CalculationResult,
    pub sections: Vec<(ModelHint, SamplingOutcome)>,
}

impl CombinedArtifact {
    /// Render the artifact as a single markdown document. Every hint
    /// gets a labeled section, even when its backend failed.
    #[must_use]
    pub fn render(&self) -> String {
        let r = &self.result;
        let mut doc = format!(
            "# Calculation Result\n\n**{} {} {} = {}**\n\n",
            r.a,
            r.operation.symbol(),
            r.b,
            r.value
        );

        for (hint, outcome) in &self.sections {
            doc.push_str("---\n\n");
            doc.push_str(&format!("## {hint} Creative Explanation\n\n"));
            match outcome {
                SamplingOutcome::Success { text } => doc.push_str(text),
                SamplingOutcome::Failure { reason } => {
                    doc.push_str(&format!("Explanation unavailable: {reason}"));
                }
            }
            doc.push_str("\n\n");
        }

        doc.push_str("---\n\n*Generated with MCP sampling across ");
        doc.push_str(&self.sections.len().to_string());
        doc.push_str(" model provider(s).*");
        doc
    }
}
