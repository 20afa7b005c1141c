pub mod commands;

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cli::commands::{BackendArgs, Commands};
use crate::client::{connect, CancelHandle, ChatController, ChatError, ChatTransport, TurnOutcome};
use crate::config::{AppConfig, ChatBackend};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to set up chat backend: {0}")]
    Chat(#[from] ChatError),
    #[error("Terminal I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("No response was generated")]
    TurnFailed,
}

pub async fn run_cli(command: Commands, config_path: String) -> Result<(), CliError> {
    let mut config = AppConfig::load(&config_path)?;

    match command {
        Commands::Serve => {
            unreachable!("Serve command should be intercepted by main.rs to boot actix-web");
        }
        Commands::Chat { backend } => {
            apply_backend(&mut config, backend);
            run_repl(connect(&config)?).await
        }
        Commands::Ask { prompt, backend } => {
            apply_backend(&mut config, backend);
            let mut controller = ChatController::new(connect(&config)?);
            let mut printer = ReplyPrinter::default();

            let outcome = controller.send(&prompt, |text| printer.print(text)).await;
            println!();

            match outcome {
                TurnOutcome::Completed => Ok(()),
                _ => Err(CliError::TurnFailed),
            }
        }
    }
}

fn apply_backend(config: &mut AppConfig, args: BackendArgs) {
    if args.direct {
        config.client.backend = ChatBackend::Direct;
    } else if let Some(url) = args.relay {
        config.client.backend = ChatBackend::Relay { url };
    }
}

/// Prints only the part of the running reply not yet on screen.
#[derive(Default)]
struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    fn print(&mut self, text: &str) {
        if let Some(new_text) = text.get(self.printed..) {
            print!("{}", new_text);
            let _ = io::stdout().flush();
        }
        self.printed = text.len();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PromptInput {
    Line(String),
    Quit,
}

/// Waits for the next line at the prompt. An interrupt or end of input quits.
async fn read_prompt<R, I>(lines: &mut Lines<R>, interrupt: I) -> io::Result<PromptInput>
where
    R: AsyncBufRead + Unpin,
    I: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => Ok(PromptInput::Quit),
        line = lines.next_line() => Ok(match line? {
            Some(line) => PromptInput::Line(line),
            None => PromptInput::Quit,
        }),
    }
}

/// Cancels the turn in flight when `interrupt` fires. Abort it once the turn ends.
fn cancel_on_interrupt<I>(interrupt: I, cancel: CancelHandle) -> JoinHandle<()>
where
    I: Future + Send + 'static,
{
    tokio::spawn(async move {
        interrupt.await;
        cancel.cancel();
    })
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run_repl(transport: Arc<dyn ChatTransport>) -> Result<(), CliError> {
    let mut controller = ChatController::new(transport);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("--- Parley Terminal Chat ---");
    println!("Type /exit or press Ctrl-C to quit, Ctrl-C during a reply stops it.");
    println!("----------------------------");

    loop {
        print!("\nUser> ");
        io::stdout().flush()?;

        let input = match read_prompt(&mut lines, ctrl_c()).await? {
            PromptInput::Line(line) => line,
            PromptInput::Quit => break,
        };
        let text = input.trim();

        if text.is_empty() {
            continue;
        }
        if text == "/exit" || text == "/quit" {
            break;
        }

        print!("Assistant> ");
        io::stdout().flush()?;

        let watcher = cancel_on_interrupt(ctrl_c(), controller.cancel_handle());
        let mut printer = ReplyPrinter::default();
        let outcome = controller.send(text, |reply| printer.print(reply)).await;
        watcher.abort();

        match outcome {
            TurnOutcome::Cancelled => println!("\n[stopped]"),
            TurnOutcome::Failed => {
                warn!("Turn failed, transcript holds the error reply");
                if let Some(last) = controller.transcript().last() {
                    println!("\n{}", last.content);
                }
            }
            _ => println!(),
        }
    }

    Ok(())
}
