//! Agentic AI entry point.
//!
//! Initialises all pipeline components from environment configuration and
//! runs an interactive REPL loop. Press Ctrl+C or type `/quit` to exit.
//!
//! # Progress streaming
//! Each query streams status lines while the pipeline works, then the final
//! answer with its confidence, method and numbered sources.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use agentic_ai::backends::{QuoteClient, SearxClient};
use agentic_ai::completion::HttpCompletionClient;
use agentic_ai::config::load_config;
use agentic_ai::pipeline::Pipeline;
use agentic_ai::progress;
use agentic_ai::progress::ProgressEvent;
use agentic_ai::types::ResponsePayload;
use agentic_ai::vector_memory::{HttpMemoryClient, MemoryBackend};

#[tokio::main]
async fn main() {
    // Initialise structured logging — default level WARN to keep output clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    // Load configuration from .env / system environment.
    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Please check your .env file. See .env.example for required variables.");
            std::process::exit(1);
        }
    };

    println!("🤖 Agentic AI starting...");
    println!("   Fast model:  {}", config.fast_model);
    println!("   Smart model: {}", config.smart_model);
    println!("   Endpoint:    {}", config.completion_base_url);

    let pipeline = match build_pipeline(config) {
        Ok(p) => {
            println!("✅ All systems initialised");
            Arc::new(p)
        }
        Err(e) => {
            eprintln!("Initialisation error: {}", e);
            std::process::exit(1);
        }
    };

    println!("💬 Type your question (Ctrl+C or /quit to exit, /health for status)\n");

    let user_id = format!("cli-{}", uuid::Uuid::new_v4());

    // REPL loop — one `handle_query` call per user input line.
    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush().unwrap_or_default();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "/quit" || input == "/exit" {
                    break;
                }
                if input == "/health" {
                    let report = pipeline.health().await;
                    match serde_json::to_string_pretty(&report) {
                        Ok(text) => println!("\n{}\n", text),
                        Err(e) => eprintln!("\n❌ Error: {}\n", e),
                    }
                    continue;
                }

                let (tx, mut rx) = progress::channel();

                // Print status lines as they land; hold on to the final answer.
                let printer = tokio::spawn(async move {
                    let mut last: Option<ResponsePayload> = None;
                    while let Some(event) = rx.recv().await {
                        match event {
                            ProgressEvent::Status { message } => {
                                println!("   … {}", message);
                            }
                            ProgressEvent::Final { payload } => {
                                last = Some(payload);
                            }
                        }
                    }
                    last
                });

                let result = pipeline.handle_query(&user_id, input, &tx).await;
                drop(tx);

                match result {
                    Ok(_) => {
                        if let Ok(Some(payload)) = printer.await {
                            print_payload(&payload);
                        }
                    }
                    Err(e) => {
                        printer.abort();
                        eprintln!("\n❌ Error: {}\n", e);
                    }
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }

    println!("\n👋 Goodbye!");
}

fn build_pipeline(config: agentic_ai::Config) -> Result<Pipeline, agentic_ai::AgentError> {
    let completion = Arc::new(HttpCompletionClient::new(&config)?);
    let search = Arc::new(SearxClient::new(&config)?);
    let finance = Arc::new(QuoteClient::new(&config)?);
    let memory_backend = HttpMemoryClient::from_config(&config)?
        .map(|client| Box::new(client) as Box<dyn MemoryBackend>);

    Ok(Pipeline::new(
        config,
        completion,
        search,
        finance,
        memory_backend,
    ))
}

fn print_payload(payload: &ResponsePayload) {
    println!("\nAssistant: {}\n", payload.response);
    println!(
        "   [{} | confidence {} | {:.2}s]",
        payload.method, payload.confidence, payload.processing_time_s
    );
    for source in &payload.sources {
        println!("   [{}] {} — {}", source.id, source.title, source.url);
    }
    for suggestion in &payload.proactive_suggestions {
        println!("   💡 {}: {}", suggestion.title, suggestion.description);
    }
    println!();
}
