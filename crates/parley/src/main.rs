// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - resilient chat generation with checkpointed conversations.
//!
//! This is the binary entry point.

mod chat;
mod history;
mod shell;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use parley_config::ParleyConfig;
use parley_core::{BackendId, ConversationId, UserId};

/// Parley - resilient chat generation with checkpointed conversations.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard lookup.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one message and print the reply.
    Chat(ChatArgs),
    /// Launch an interactive REPL continuing one conversation.
    Shell {
        #[arg(long, default_value = "local")]
        user: String,
        /// Conversation to continue.
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Print the messages of a stored conversation, or list a user's conversations.
    History {
        /// Conversation to print; lists all conversations of the user when omitted.
        id: Option<String>,
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// Validate the configuration and print a summary.
    Config,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// The message to send.
    message: String,
    #[arg(long, default_value = "local")]
    user: String,
    /// Conversation to continue.
    #[arg(long)]
    conversation: Option<String>,
    /// Backend to use instead of the configured primary.
    #[arg(long)]
    backend: Option<String>,
    /// Wait for the complete reply instead of streaming it.
    #[arg(long)]
    no_stream: bool,
    /// Print fragments (or the reply) as JSON lines.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Chat(args) => {
            let request = chat::ChatOptions {
                user: UserId::from(args.user),
                conversation: args.conversation.map(ConversationId::from),
                backend: args.backend.map(BackendId::from),
                message: args.message,
                stream: !args.no_stream,
                json: args.json,
            };
            chat::run_chat(config, request).await
        }
        Commands::Shell { user, conversation } => {
            shell::run_shell(
                config,
                UserId::from(user),
                conversation.map(ConversationId::from),
            )
            .await
        }
        Commands::History { id, user } => {
            history::run_history(config, UserId::from(user), id.map(ConversationId::from)).await
        }
        Commands::Config => {
            print_config_summary(&config);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red());
            ExitCode::FAILURE
        }
    }
}

fn print_config_summary(config: &ParleyConfig) {
    let generation = &config.generation;
    println!("{}", "configuration is valid".green());
    println!("service:      {}", config.service.name);
    println!("primary:      {}", generation.primary);
    let fallbacks: Vec<String> = config
        .fallbacks_for(&BackendId::from(generation.primary.as_str()))
        .iter()
        .map(ToString::to_string)
        .collect();
    if fallbacks.is_empty() {
        println!("fallbacks:    {}", "none".dimmed());
    } else {
        println!("fallbacks:    {}", fallbacks.join(" -> "));
    }
    println!("cooldown:     {}s", generation.cooldown_secs);
    println!("max reply:    {} chars", generation.max_response_chars);
    for backend in &config.backends {
        let model = backend.model.as_deref().unwrap_or("-");
        println!("backend:      {} ({:?}, model {model})", backend.id, backend.kind);
    }
    println!("storage:      {:?} {}", config.storage.backend, config.storage.database_path);
    println!("unknown ids:  {:?}", config.checkpoint.unknown_conversation);
}

/// Initializes the tracing subscriber with the given log level. Logs go to
/// stderr so replies on stdout stay clean.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("parley={log_level},parley_engine={log_level},warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_chat_flags() {
        let cli = Cli::parse_from([
            "parley",
            "chat",
            "--user",
            "bob",
            "--backend",
            "echo",
            "--no-stream",
            "Hello there",
        ]);
        let Commands::Chat(args) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(args.user, "bob");
        assert_eq!(args.backend.as_deref(), Some("echo"));
        assert!(args.no_stream);
        assert_eq!(args.message, "Hello there");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            parley_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.service.name, "parley");
        assert_eq!(config.generation.primary, "echo");
    }
}
