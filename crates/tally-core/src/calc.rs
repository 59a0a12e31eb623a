use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The four supported arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// Parse an operation name. Case-insensitive, trimmed, and accepts
    /// common synonyms alongside the canonical names.
    pub fn parse(input: &str) -> Result<Self, Error> {
        match input.trim().to_lowercase().as_str() {
            "add" | "addition" | "+" => Ok(Self::Add),
            "subtract" | "subtraction" | "-" => Ok(Self::Subtract),
            "multiply" | "multiplication" | "*" | "×" => Ok(Self::Multiply),
            "divide" | "division" | "/" | "÷" => Ok(Self::Divide),
            _ => Err(Error::UnsupportedOperation(input.trim().to_string())),
        }
    }

    /// Canonical operation name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    /// Display symbol used in prompts and rendered output.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "×",
            Self::Divide => "÷",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A completed calculation, ready for prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResult {
    pub a: f64,
    pub b: f64,
    pub operation: Operation,
    pub value: f64,
}

/// Evaluate `a <operation> b`. Division by exactly zero is a domain
/// error, never a NaN/Inf result.
pub fn evaluate(a: f64, b: f64, operation: &str) -> Result<CalculationResult, Error> {
    let operation = Operation::parse(operation)?;
    let value = match operation {
        Operation::Add => a + b,
        Operation::Subtract => a - b,
        Operation::Multiply => a * b,
        Operation::Divide => {
            if b == 0.0 {
                tracing::warn!("division by zero attempted: {a} / {b}");
                return Err(Error::DivisionByZero);
            }
            a / b
        }
    };

    tracing::info!("{} {} {} = {}", a, operation.symbol(), b, value);

    Ok(CalculationResult {
        a,
        b,
        operation,
        value,
    })
}
