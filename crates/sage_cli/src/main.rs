mod eval;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sage_core::SageConfig;
use sage_gateway::{EngineFactory, GatewayServer};
use sage_reasoning::llm::CompletionParams;
use sage_reasoning::providers::create_client;
use sage_reasoning::{EngineResult, ReActEngine, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sage", author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, env = "SAGE_CONFIG", default_value = "sage.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the WebSocket and HTTP query API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask one question, or start an interactive session when none is given
    Ask {
        query: Option<String>,
        /// Print the reasoning trace before each answer
        #[arg(long)]
        show_reasoning: bool,
    },
    /// Answer every question in a file and write one JSON line per answer
    Eval {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Engines share one model client and one tool registry; each gets its own memory.
fn engine_factory(config: &SageConfig) -> Result<EngineFactory> {
    let client = create_client(&config.llm)
        .with_context(|| format!("Failed to create '{}' model client", config.llm.provider))?;

    let mut registry = ToolRegistry::new();
    for tool in sage_tools::wikipedia_tools(&config.wikipedia)? {
        registry.register(tool);
    }
    let tools = Arc::new(registry);
    info!(
        "Model {} via {}, {} tool(s)",
        config.llm.model,
        config.llm.provider,
        tools.len()
    );

    let agent = config.agent.clone();
    let params = CompletionParams::from_config(&config.llm);
    Ok(Arc::new(move || {
        ReActEngine::new(client.clone(), tools.clone(), &agent).with_params(params.clone())
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = SageConfig::load_or_default(&cli.config);

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let factory = engine_factory(&config)?;
            GatewayServer::new(factory, &config.gateway).serve().await
        }
        Command::Ask {
            query,
            show_reasoning,
        } => {
            let factory = engine_factory(&config)?;
            let mut engine = factory();
            match query {
                Some(query) => {
                    let result = engine.run(&query).await;
                    print_result(&result, show_reasoning);
                    Ok(())
                }
                None => repl(&mut engine, show_reasoning).await,
            }
        }
        Command::Eval { input, output } => {
            let factory = engine_factory(&config)?;
            eval::run_file(factory.as_ref(), &input, &output).await
        }
    }
}

fn print_result(result: &EngineResult, show_reasoning: bool) {
    if show_reasoning {
        for step in &result.reasoning {
            println!("{}\n", step.content());
        }
    }
    println!("{}", result.response);
}

async fn repl(engine: &mut ReActEngine, show_reasoning: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history = dirs::data_dir().map(|d| d.join("sage").join("history.txt"));
    if let Some(ref path) = history {
        let _ = editor.load_history(path);
    }

    println!("Sage online. Type 'quit' to exit.");
    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        let result = engine.run(trimmed).await;
        println!();
        print_result(&result, show_reasoning);
        println!();
    }

    if let Some(path) = history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = editor.save_history(&path) {
            tracing::debug!("Could not save history: {}", e);
        }
    }
    Ok(())
}
