mod backend;
mod config;
mod error;
mod logging;
mod tools;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use mcp::{Channel, ClientOptions, Implementation, Server};
use runtime::{McpToolHost, Session, ToolHost};
use tracing::info;

use backend::ChatBackend;
use config::{CONFIG_FILE, Config};
use error::Result;

#[derive(Parser)]
#[command(name = "toolhost")]
#[command(about = "Let a language model call tools served over MCP", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo tools over stdio
    Serve,
    /// Start an interactive chat session
    Chat,
    /// List the tools the configured server offers
    Tools,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Serve) => cmd_serve().await,
        Some(Commands::Tools) => cmd_tools(&cli.config).await,
        Some(Commands::Chat) | None => cmd_chat(&cli.config).await,
    }
}

async fn cmd_serve() -> Result<()> {
    let registry = tools::demo_registry(tracing::info_span!("tool_registry")).await?;
    let server = Server::new(
        Implementation::new("toolhost", env!("CARGO_PKG_VERSION")),
        registry,
    );
    server.run(Channel::stdio()).await?;
    Ok(())
}

async fn cmd_tools(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let host = connect(&config).await?;

    for spec in host.specs() {
        println!("{}  {}", spec.name, spec.description);
        println!("    {}", spec.schema);
    }

    host.close().await?;
    Ok(())
}

async fn cmd_chat(config_path: &Path) -> Result<()> {
    println!("toolhost v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(config_path)?;
    let backend = ChatBackend::from_config(&config.backend)?;
    println!("Model: {backend}");

    let host = connect(&config).await?;
    let names: Vec<&str> = host.specs().iter().map(|s| s.name.as_str()).collect();
    println!("Tools: {}", names.join(", "));
    println!("Type 'quit' or Ctrl+D to exit, '/clear' to reset.\n");

    let mut session = Session::new(backend, host)
        .with_system(config.session.system_prompt.clone())
        .with_max_rounds(config.session.max_tool_rounds);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "/clear" => {
                session.clear();
                println!("History cleared.\n");
                continue;
            }
            _ => {}
        }

        match session.chat(input).await {
            Ok(response) => println!("\n{response}\n"),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    session.host().close().await?;
    println!("\nSession ended.");
    Ok(())
}

async fn connect(config: &Config) -> Result<McpToolHost> {
    let server = config.server.to_server_config()?;
    info!(command = %server.command, args = ?server.args, "starting tool server");

    let options = ClientOptions {
        timeout: config.session.request_timeout_secs.map(Duration::from_secs),
        span: tracing::info_span!("client", server = %server.name),
        ..ClientOptions::default()
    };
    Ok(McpToolHost::spawn(&server, options).await?)
}
