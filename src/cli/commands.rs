use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parley", version, about = "Streaming chat relay for NDJSON text-generation services", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay HTTP server
    Serve,

    /// Enter interactive terminal chat
    Chat {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Send a single prompt and print the reply
    Ask {
        /// The message to send
        prompt: String,

        #[command(flatten)]
        backend: BackendArgs,
    },
}

/// Overrides `client.backend` from the config file.
#[derive(Args, Default)]
pub struct BackendArgs {
    /// Relay endpoint to send prompts to
    #[arg(long, conflicts_with = "direct")]
    pub relay: Option<String>,

    /// Skip the relay and talk to the upstream service directly
    #[arg(long)]
    pub direct: bool,
}
