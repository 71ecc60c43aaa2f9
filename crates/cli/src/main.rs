//! Minerva CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Talk to the assistant in the terminal
//! - `prompt` : Print the rendered system prompt
//! - `config` : Show, locate or scaffold the configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "minerva", about = "Minerva — a chat assistant for group conversations", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant in the terminal
    Chat {
        /// Your username in the conversation
        #[arg(short, long, env = "USER", default_value = "user")]
        username: String,

        /// Answer every line, not only lines that mention the assistant
        #[arg(short, long)]
        always_respond: bool,
    },

    /// Print the system prompt sent to the model
    Prompt,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the loaded configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Print a default config file
    Init,
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            username,
            always_respond,
        } => commands::chat::run(username, always_respond).await?,
        Commands::Prompt => commands::prompt::run()?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_flags() {
        let cli = Cli::try_parse_from(["minerva", "chat", "--username", "alice", "--always-respond", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Chat {
                username,
                always_respond,
            } => {
                assert_eq!(username, "alice");
                assert!(always_respond);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn parses_config_subcommand() {
        let cli = Cli::try_parse_from(["minerva", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
