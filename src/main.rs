use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use cundi::chat;
use cundi::llm::LlmClient;
use cundi::web_server;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the Cundi web UI.
    Serve {
        #[arg(long, default_value_t = 8700, help = "Port for the web server.")]
        port: u16,
    },
    /// Engage in a text-based chat session with Cundi in the terminal.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Initialize tracing (logging) subscriber
    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,cundi=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();

    info!("Cundi starting with command: {:?}", cli.command);

    // The API credential is the one fatal startup condition; nothing runs
    // without it.
    let llm = LlmClient::from_env().context("Cundi cannot start without an API credential")?;

    match cli.command {
        Commands::Serve { port } => {
            info!("Starting Cundi web UI on port {}...", port);

            // Start the web server in a separate asynchronous task
            let mut server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, llm).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            // Keep the main thread alive and wait for shutdown signals or task completion
            let ctrl_c = tokio::signal::ctrl_c();
            // Pin the ctrl_c future to the stack so its address is stable
            tokio::pin!(ctrl_c);

            tokio::select! {
                // Wait for Ctrl-C signal for graceful shutdown
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                // Handle potential completion/failure of the web server task
                res = &mut server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        // Handle JoinError (e.g., if the task panicked)
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !server_handle.is_finished() {
                info!("Aborting web server task...");
                server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat => {
            info!("Starting interactive chat session...");
            chat::run_chat(llm).await.context("Chat session failed")?;
            info!("Chat session finished.");
        }
    }

    Ok(())
}
