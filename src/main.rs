use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use quorum::cli::{Cli, SessionLine};
use quorum::commands::{self, Prompter};
use quorum::primitive::Shamir;
use quorum::registry::CoordinationRegistry;
use quorum::repository::{JsonFileRepository, MemoryRepository, Repository};
use quorum::{SecretLifecycle, SessionContext};

const HELP: &str = "\
Commands:
  login <user>                     switch to (or create) a participant session
  split [-p parts] [-t threshold]  split a secret; holders then run `sign <id>`
  sign <id>                        sign a secret being split
  combine <id>                     recover a secret; holders then run `unsign <id>`
  unsign <id>                      unsign your share of a secret being combined
  list | ls                        list your secrets
  abort <id>                       abort a secret still being signed
  cancel <id>                      cancel a combine you started
  help                             show this text
  quit                             leave";

/// Reads answers from the terminal, hiding secrets when stdin is a TTY
struct TerminalPrompter;

impl TerminalPrompter {
    /// Reads one line, `None` once stdin is closed
    ///
    /// Runs in place on the worker so background waits keep being polled.
    fn read_line() -> Result<Option<String>> {
        tokio::task::block_in_place(|| {
            let mut line = String::new();
            let read = io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read from stdin")?;
            if read == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        })
    }

    fn read_command(who: &str) -> Result<Option<String>> {
        eprint!("[{who}]> ");
        io::stderr().flush().ok();
        Self::read_line()
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        eprint!("{prompt}: ");
        io::stderr().flush().ok();
        Self::read_line()?.context("Input closed")
    }

    fn ask_hidden(&mut self, prompt: &str) -> Result<Zeroizing<String>> {
        if atty::is(atty::Stream::Stdin) {
            eprint!("{prompt}: ");
            io::stderr().flush().ok();
            tokio::task::block_in_place(rpassword::read_password)
                .map(Zeroizing::new)
                .context("Failed to read hidden input")
        } else {
            // Non-interactive mode (piped input)
            Self::read_line()?.map(Zeroizing::new).context("Input closed")
        }
    }
}

fn open_repository(cli: &Cli) -> Result<Arc<dyn Repository>> {
    Ok(match &cli.store {
        Some(path) => Arc::new(
            JsonFileRepository::open(path)
                .with_context(|| format!("Failed to open store {}", path.display()))?,
        ),
        None => Arc::new(MemoryRepository::new()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quorum=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;
    let repo = open_repository(&cli)?;
    let engine = SecretLifecycle::new(
        repo.clone(),
        Arc::new(Shamir),
        Arc::new(CoordinationRegistry::new()),
        config,
    );
    info!(store = ?cli.store, wait_timeout = ?config.wait_timeout, "quorum console started");

    let (notices, mut inbox) = mpsc::unbounded_channel::<Zeroizing<String>>();
    tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            println!("{}", *message);
        }
    });

    let mut prompter = TerminalPrompter;
    let mut session: Option<SessionContext> = None;
    eprintln!("{HELP}");

    loop {
        let who = session.as_ref().map_or("-", SessionContext::username);
        let Some(line) = TerminalPrompter::read_command(who)? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some("quit" | "exit") => break,
            Some("help") => {
                eprintln!("{HELP}");
                continue;
            }
            Some("login") => {
                let Some(username) = words.next() else {
                    eprintln!("usage: login <user>");
                    continue;
                };
                match SessionContext::authenticate(repo.as_ref(), username, &format!("local:{username}")) {
                    Ok(ctx) => session = Some(ctx),
                    Err(e) => eprintln!("Error: {e}"),
                }
                continue;
            }
            _ => {}
        }

        let Some(ctx) = session.as_ref() else {
            eprintln!("Log in first: login <user>");
            continue;
        };
        let command = match SessionLine::parse_line(line) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if let Err(e) = commands::execute(&engine, ctx, command, &mut prompter, &notices).await {
            eprintln!("Error: {e:#}");
        }
    }

    Ok(())
}
