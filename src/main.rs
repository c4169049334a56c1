// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Tagsync CLI - tag siblings, parents and display filters

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tagsync::commands::{self, filter::FilterArgs, pairs::PairArgs, Context};
use tagsync::repository::DEFAULT_LOCAL_SERVICE;
use tagsync::types::ContentType;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tagsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "TAGSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, env = "TAGSYNC_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct PairCommand {
    /// Action: add, remove, toggle, list, import, export
    action: String,

    /// Tags, in pairs (old new / child parent); for list, the tags to show
    tags: Vec<String>,

    /// Service name or key
    #[arg(short, long, default_value = DEFAULT_LOCAL_SERVICE)]
    service: String,

    /// Reason for pends and petitions (required by tag repositories)
    #[arg(short, long)]
    reason: Option<String>,

    /// Confirm rescinds without asking
    #[arg(short, long)]
    yes: bool,

    /// Import: only add pairs, never remove
    #[arg(long)]
    add_only: bool,

    /// List: include current pairs
    #[arg(short, long)]
    all: bool,

    /// Import/export file (stdin/stdout otherwise)
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl PairCommand {
    fn into_parts(self) -> (String, Vec<String>, PairArgs) {
        let args = PairArgs {
            service: self.service,
            reason: self.reason,
            yes: self.yes,
            add_only: self.add_only,
            all: self.all,
            file: self.file,
        };
        (self.action, self.tags, args)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tag services
    Service {
        /// Action: add, remove, list, tags
        action: String,

        /// Service name
        name: Option<String>,

        /// Tags the service knows (for `tags`)
        tags: Vec<String>,

        /// Register a tag repository instead of a local service
        #[arg(long)]
        repository: bool,

        /// Repository account may pend and petition
        #[arg(long)]
        can_petition: bool,

        /// Repository account may overrule review
        #[arg(long)]
        can_overrule: bool,
    },

    /// Edit tag siblings (old -> new)
    Sibling(PairCommand),

    /// Edit tag parents (child -> parent)
    Parent(PairCommand),

    /// Show what tags display as after siblings, parents and filters
    Resolve {
        /// Stored tags
        #[arg(required = true)]
        tags: Vec<String>,

        /// Service name or key
        #[arg(short, long, default_value = DEFAULT_LOCAL_SERVICE)]
        service: String,

        /// Display context
        #[arg(long, default_value = "siblings_and_parents")]
        context: String,

        /// Only resolve tags the service knows
        #[arg(long)]
        strict: bool,

        /// Include uncommitted session edits
        #[arg(long)]
        preview: bool,
    },

    /// Edit display filters
    Filter {
        /// Action: show, test, whitelist, blacklist, blacklist-all, remove, import, export
        action: String,

        /// Tag slices (or tags, for test)
        items: Vec<String>,

        /// Service name or key (default: every service combined)
        #[arg(short, long)]
        service: Option<String>,

        /// Display context
        #[arg(long, default_value = "storage")]
        context: String,

        /// Import/export rule: blacklist or whitelist
        #[arg(long)]
        rule: Option<String>,

        /// Export as a stored blob
        #[arg(long)]
        blob: bool,

        /// Import/export file (stdin/stdout otherwise)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Diff every open session into content updates and apply them
    Commit {
        /// Write the updates as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Discard open sessions
    Cancel {
        /// Only this service
        #[arg(short, long)]
        service: Option<String>,

        /// Only siblings or parents
        #[arg(long = "type")]
        content_type: Option<String>,
    },

    /// Get or set configuration
    Config {
        /// Configuration key
        key: String,

        /// Value to set (omit to get)
        value: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = tagsync::config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // Initialize logging
    let directive = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => config.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context {
        config,
        config_path: cli.config,
        color: !cli.no_color,
        json: cli.json,
    };

    // Execute command
    match cli.command {
        Commands::Service { action, name, tags, repository, can_petition, can_overrule } => {
            commands::service::run(&ctx, &action, name, repository, can_petition, can_overrule, tags)
        }
        Commands::Sibling(command) => {
            let (action, tags, args) = command.into_parts();
            commands::pairs::run(&ctx, ContentType::TagSiblings, &action, tags, &args)
        }
        Commands::Parent(command) => {
            let (action, tags, args) = command.into_parts();
            commands::pairs::run(&ctx, ContentType::TagParents, &action, tags, &args)
        }
        Commands::Resolve { tags, service, context, strict, preview } => {
            commands::resolve::run(&ctx, tags, &service, &context, strict, preview)
        }
        Commands::Filter { action, items, service, context, rule, blob, file } => {
            let args = FilterArgs { service, context, rule, blob, file };
            commands::filter::run(&ctx, &action, items, &args)
        }
        Commands::Commit { output } => {
            commands::commit::run(&ctx, output)
        }
        Commands::Cancel { service, content_type } => {
            commands::commit::cancel(&ctx, service, content_type)
        }
        Commands::Config { key, value } => {
            commands::config::run(&ctx, &key, value)
        }
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
