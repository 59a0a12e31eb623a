use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod call_cmd;
mod client_cmd;
mod transport;

#[derive(Parser)]
#[command(name = "tally", about = "Tally CLI - MCP calculator client with sampling")]
struct Cli {
    /// Tally server URL
    #[arg(long, env = "TALLY_URL", default_value = "http://localhost:8080")]
    tally_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sampling client: connect to the server and service
    /// model completion requests issued during tool calls
    Client {
        /// Default LLM API URL (OpenAI-compatible)
        #[arg(long, env = "LLM_URL")]
        llm_url: Option<String>,

        /// URL serving requests with the "ollama" model hint
        #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434/v1")]
        ollama_url: String,

        /// LLM model name
        #[arg(long, env = "LLM_MODEL")]
        model: Option<String>,

        /// Run in mock mode (echo responses)
        #[arg(long)]
        mock: bool,
    },

    /// Evaluate `a <operation> b` on the server
    Calc {
        a: f64,
        b: f64,
        /// One of add, subtract, multiply, divide (synonyms accepted)
        operation: String,
    },

    /// Convert an amount between currencies using live rates
    Convert {
        amount: f64,
        from: String,
        to: String,
    },

    /// Calculate and gather creative explanations via sampling
    Explain {
        a: f64,
        b: f64,
        operation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Client {
            llm_url,
            ollama_url,
            model,
            mock,
        } => {
            let mode = match (mock, llm_url) {
                (false, Some(default_url)) => client_cmd::BackendMode::Llm {
                    default_url,
                    ollama_url,
                    model: model.unwrap_or_else(|| "default".to_string()),
                },
                _ => client_cmd::BackendMode::Mock,
            };
            client_cmd::run(&cli.tally_url, mode).await?;
        }
        Commands::Calc { a, b, operation } => {
            let operation = tally_core::Operation::parse(&operation)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            call_cmd::run(
                &cli.tally_url,
                operation.name(),
                serde_json::json!({ "a": a, "b": b }),
            )
            .await?;
        }
        Commands::Convert { amount, from, to } => {
            call_cmd::run(
                &cli.tally_url,
                "convert_currency",
                serde_json::json!({ "amount": amount, "from": from, "to": to }),
            )
            .await?;
        }
        Commands::Explain { a, b, operation } => {
            call_cmd::run(
                &cli.tally_url,
                "calculate_with_explanation",
                serde_json::json!({ "a": a, "b": b, "operation": operation }),
            )
            .await?;
        }
    }

    Ok(())
}
