//! parley - chat with a Copilot Studio agent from the terminal

mod commands;
mod config;
mod ui;

use clap::Parser;
use futures::StreamExt;
use parley_activity::{
    StaticTokenProvider, Transport,
    transport::{CopilotStudioTransport, EchoTransport},
};
use parley_chat::{
    ChatClient, ChatMessage, CopilotChatClient, ResponseAggregator, ResponseStream,
};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::{Config, TransportKind};

/// parley - chat with a Copilot Studio agent
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Wait for the whole reply and print it with token usage
    #[arg(long)]
    aggregate: bool,

    /// Talk to the local echo agent instead of Copilot Studio
    #[arg(long)]
    echo: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = Config::load();
    init_tracing(args.verbose || cfg.verbose);

    let use_echo = args.echo || cfg.transport == TransportKind::Echo;
    let transport = build_transport(&cfg, use_echo)?;
    let client = CopilotChatClient::new(transport);

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&client, &command, args.aggregate).await;
    }

    if io::IsTerminal::is_terminal(&io::stderr()) {
        let label = if use_echo { "echo" } else { "copilot studio" };
        eprintln!("parley ({}) - type /help for commands", label);
        eprintln!();
    }
    run_interactive(&client, args.aggregate).await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("parley=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_transport(cfg: &Config, use_echo: bool) -> anyhow::Result<Arc<dyn Transport>> {
    if use_echo {
        return Ok(Arc::new(EchoTransport::new()));
    }

    if let Err(e) = cfg.copilot_studio.validate() {
        eprintln!("Error: {}", e);
        eprintln!();
        eprintln!("Configure the agent in {}", Config::config_path().display());
        eprintln!("or set COPILOT_STUDIO_ENVIRONMENT_ID and COPILOT_STUDIO_SCHEMA_NAME.");
        eprintln!("Create a config with: parley --init-config");
        std::process::exit(1);
    }

    let Some(token) = cfg.access_token() else {
        eprintln!("Error: No access token found");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. Set a token: export PARLEY_ACCESS_TOKEN=your-token");
        eprintln!("  2. Add it to config: parley --init-config");
        eprintln!("  3. Try the local echo agent: parley --echo");
        std::process::exit(1);
    };

    let tokens = Arc::new(StaticTokenProvider::new(token));
    let transport = CopilotStudioTransport::new(&cfg.copilot_studio, tokens)?;
    tracing::debug!("Using agent at {}", cfg.copilot_studio.conversations_url()?);
    Ok(Arc::new(transport))
}

/// Cancel `cancel` when Ctrl-C is pressed. Abort the handle once the turn ends.
fn cancel_on_ctrl_c(cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    })
}

async fn run_command(
    client: &CopilotChatClient,
    command: &str,
    aggregate: bool,
) -> anyhow::Result<()> {
    let messages = [ChatMessage::user(command)];
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(&cancel);

    let result = if aggregate {
        match client.get_response(&messages, None, cancel).await {
            Ok(response) => {
                ui::print_response(&response, &mut io::stdout())?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    } else {
        let stream = client.get_streaming_response(&messages, None, cancel)?;
        let mut printer = ui::TurnPrinter::new();
        stream_turn(stream, &mut printer).await.map(|_| ())
    };

    watcher.abort();
    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_interactive(client: &CopilotChatClient, aggregate: bool) -> anyhow::Result<()> {
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut pending_card: Option<ui::PendingCard> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        // EOF
        let Some(line) = line else { break };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let cancel = CancellationToken::new();

        // Handle slash commands
        if let Some(result) = commands::execute_command(input, pending_card.as_ref()) {
            match result {
                commands::CommandResult::Message(msg) => println!("{}", msg),
                commands::CommandResult::Exit => break,
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
                commands::CommandResult::CardReply(activity) => {
                    let watcher = cancel_on_ctrl_c(&cancel);
                    let stream = client.send_card_action_response(activity, cancel);
                    let mut printer = ui::TurnPrinter::new();
                    match stream_turn(stream, &mut printer).await {
                        Ok(text) if !text.is_empty() => history.push(ChatMessage::assistant(text)),
                        Ok(_) => {}
                        Err(e) => report_error(&e),
                    }
                    pending_card = printer.take_pending_card();
                    watcher.abort();
                }
            }
            println!();
            continue;
        }

        history.push(ChatMessage::user(input));
        let watcher = cancel_on_ctrl_c(&cancel);

        if aggregate {
            match client.get_response(&history, None, cancel).await {
                Ok(response) => {
                    ui::print_response(&response, &mut io::stdout())?;
                    history.extend(response.messages);
                }
                Err(e) => report_error(&e),
            }
        } else {
            let mut printer = ui::TurnPrinter::new();
            let turn = match client.get_streaming_response(&history, None, cancel) {
                Ok(stream) => stream_turn(stream, &mut printer).await,
                Err(e) => Err(e),
            };
            match turn {
                Ok(text) if !text.is_empty() => history.push(ChatMessage::assistant(text)),
                Ok(_) => {}
                Err(e) => report_error(&e),
            }
            pending_card = printer.take_pending_card().or(pending_card);
        }

        watcher.abort();
        println!();
    }

    Ok(())
}

/// Print a turn as it streams in and return its aggregated text
async fn stream_turn(
    mut stream: ResponseStream,
    printer: &mut ui::TurnPrinter,
) -> parley_chat::Result<String> {
    let mut stdout = io::stdout();
    let mut aggregator = ResponseAggregator::new();

    while let Some(update) = stream.next().await {
        match update {
            Ok(update) => {
                printer.print_update(&update, &mut stdout).ok();
                aggregator.push(&update);
            }
            Err(e) => {
                printer.finish(&mut stdout).ok();
                return Err(e);
            }
        }
    }

    printer.finish(&mut stdout).ok();
    Ok(aggregator.text())
}

fn report_error(error: &parley_chat::Error) {
    if error.is_cancelled() {
        eprintln!("[Cancelled]");
    } else if error.is_session_expired() {
        eprintln!("Error: {}", error);
        eprintln!("Refresh PARLEY_ACCESS_TOKEN and send your message again.");
    } else {
        eprintln!("Error: {}", error);
    }
}
