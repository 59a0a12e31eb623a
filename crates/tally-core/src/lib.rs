pub mod calc;
pub mod error;
pub mod types;

pub use calc::{evaluate, CalculationResult, Operation};
pub use error::Error;
pub use types::{
    CombinedArtifact, CurrencyCode, ExchangeQuote, ModelHint, SamplingOutcome, SamplingRequest,
};
