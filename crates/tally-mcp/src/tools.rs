use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of an MCP tool exposed by the calculator server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn two_number_schema(a_desc: &str, b_desc: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "a": { "type": "number", "description": a_desc },
            "b": { "type": "number", "description": b_desc }
        },
        "required": ["a", "b"]
    })
}

/// Registry of all tools advertised through `tools/list`.
pub struct ToolRegistry;

impl ToolRegistry {
    /// Return the list of tool definitions for the MCP `tools/list` method.
    #[must_use]
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "add".to_string(),
                description: "Add two numbers together.".to_string(),
                input_schema: two_number_schema("First number", "Second number"),
            },
            ToolDefinition {
                name: "subtract".to_string(),
                description: "Subtract the second number from the first.".to_string(),
                input_schema: two_number_schema(
                    "First number (minuend)",
                    "Second number (subtrahend)",
                ),
            },
            ToolDefinition {
                name: "multiply".to_string(),
                description: "Multiply two numbers.".to_string(),
                input_schema: two_number_schema("First number", "Second number"),
            },
            ToolDefinition {
                name: "divide".to_string(),
                description: "Divide the first number by the second.".to_string(),
                input_schema: two_number_schema(
                    "First number (dividend)",
                    "Second number (divisor, must be non-zero)",
                ),
            },
            ToolDefinition {
                name: "convert_currency".to_string(),
                description:
                    "Convert an amount from one currency to another using live exchange rates."
                        .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "amount": {
                            "type": "number",
                            "description": "Amount to convert (non-negative)"
                        },
                        "from": {
                            "type": "string",
                            "description": "Source currency code (e.g., USD)"
                        },
                        "to": {
                            "type": "string",
                            "description": "Target currency code (e.g., EUR)"
                        }
                    },
                    "required": ["amount", "from", "to"]
                }),
            },
            ToolDefinition {
                name: "get_exchange_rate".to_string(),
                description: "Get the current exchange rate between two currencies.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "from": {
                            "type": "string",
                            "description": "Source currency code (e.g., USD)"
                        },
                        "to": {
                            "type": "string",
                            "description": "Target currency code (e.g., EUR)"
                        }
                    },
                    "required": ["from", "to"]
                }),
            },
            ToolDefinition {
                name: "calculate_with_exchange_rate".to_string(),
                description: "Perform a calculation, resolve the exchange rate between two \
                              currencies, and gather creative explanations that weave the \
                              rate into the story via MCP sampling."
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "a": { "type": "number", "description": "First number" },
                        "b": { "type": "number", "description": "Second number" },
                        "operation": {
                            "type": "string",
                            "description": "Operation to perform (add, subtract, multiply, divide)"
                        },
                        "from": {
                            "type": "string",
                            "description": "Source currency code (e.g., USD)"
                        },
                        "to": {
                            "type": "string",
                            "description": "Target currency code (e.g., EUR)"
                        }
                    },
                    "required": ["a", "b", "operation", "from", "to"]
                }),
            },
            ToolDefinition {
                name: "calculate_with_explanation".to_string(),
                description: "Perform a calculation and gather creative explanations from the \
                              client's configured model providers via MCP sampling."
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "a": { "type": "number", "description": "First number" },
                        "b": { "type": "number", "description": "Second number" },
                        "operation": {
                            "type": "string",
                            "description": "Operation to perform (add, subtract, multiply, divide)"
                        }
                    },
                    "required": ["a", "b", "operation"]
                }),
            },
        ]
    }
}
