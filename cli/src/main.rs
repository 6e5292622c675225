mod terminal;

use std::io::{self, BufRead, Write};

use chatroom::config::DEFAULT_BASE_URL;
use chatroom::{ChatClient, ClientConfig, ClientError, ConfigError, TypingEmission};
use clap::Parser;
use tokio::sync::mpsc;

use crate::terminal::{RawModeGuard, SharedPrompt, TerminalView};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatroom", about = "Terminal client for the shared chat room")]
struct Cli {
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Display name; prompted for when absent. Blank picks a guest name.
    #[arg(long, env = "CHAT_NAME")]
    name: Option<String>,

    /// Send a typing frame on every keystroke instead of only on edges.
    #[arg(long)]
    every_keystroke: bool,

    /// Log at debug level (to stderr).
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ClientConfig::from_env()?;
    config.base_url = cli.base_url;
    config.name = cli.name.filter(|name| !name.trim().is_empty());
    if cli.every_keystroke {
        config.session.typing_emission = TypingEmission::EveryKeystroke;
    }

    // The name prompt runs in cooked mode, before the key reader owns stdin.
    let remembered_name = match &config.name {
        Some(name) => name.clone(),
        None => prompt_name()?,
    };

    let prompt = SharedPrompt::default();
    let view = TerminalView::new(remembered_name, prompt.clone());

    let _raw_mode = RawModeGuard::enter()?;
    let (commands, rx) = mpsc::unbounded_channel();
    terminal::spawn_key_reader(prompt, commands);

    ChatClient::new(config, view).run(rx).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn prompt_name() -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "Enter your name: ")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}
