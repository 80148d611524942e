//! # Vault Context CLI (`vault`)
//!
//! The `vault` binary runs one vault action per invocation and prints the
//! JSON response on stdout. Error responses exit with status 1.
//!
//! ## Usage
//!
//! ```bash
//! vault --config ./config/vault.toml <command>
//! vault --vault ~/notes <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vault search "<keyword>"` | Keyword search (all words must match) |
//! | `vault read <filename>` | Read one document with stats and backlinks |
//! | `vault list` | List indexed documents |
//! | `vault stats` | Index statistics |
//! | `vault collect` | Collect a bounded context packet |
//! | `vault load-memory` | Load a persisted snapshot note |
//! | `vault call '<json>'` | Run a raw tool call |
//!
//! ## Examples
//!
//! ```bash
//! # Search with the aggressive preset
//! vault --vault ~/notes search "project plan" --mode aggressive
//!
//! # Collect context about a topic and persist it to the vault
//! vault --vault ~/notes collect --topic rust --memory-mode both
//!
//! # Resume a collection
//! vault --vault ~/notes collect --continuation-token <token>
//!
//! # Raw JSON parameters, as an agent would send them
//! vault call '{"action":"list_all","quiet":true}'
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vault_context::compression::CompressionMode;
use vault_context::config::{self, Config};
use vault_context::context::{MemoryMode, Scope};
use vault_context::{execute, AppContext, ToolResponse, VaultAction, VaultParams};

/// Vault Context CLI: search, read and collect context from a markdown vault.
///
/// Settings come from a TOML file (`--config`) or from `--vault` plus
/// defaults. See `config/vault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "vault",
    about = "Vault Context: bounded context retrieval over a markdown vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/vault.toml`. Ignored when missing and `--vault`
    /// is given.
    #[arg(long, global = true, default_value = "./config/vault.toml")]
    config: PathBuf,

    /// Vault root directory. Overrides the configured root.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Aggressive,
    Balanced,
    None,
}

impl From<ModeArg> for CompressionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Aggressive => CompressionMode::Aggressive,
            ModeArg::Balanced => CompressionMode::Balanced,
            ModeArg::None => CompressionMode::None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Topic,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum MemoryModeArg {
    ResponseOnly,
    VaultNote,
    Both,
}

/// Output shaping flags shared by most commands.
#[derive(Args)]
struct OutputArgs {
    /// Compression preset.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Hard cap on the response size, in chars (500-12000).
    #[arg(long)]
    max_output_chars: Option<usize>,

    /// Minimal response.
    #[arg(long)]
    quiet: bool,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Search documents by keyword.
    ///
    /// Every whitespace-separated word must appear in the title, tags,
    /// path or body (case-insensitive).
    Search {
        keyword: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        excerpt_length: Option<usize>,
        /// Skip loading document content.
        #[arg(long)]
        no_content: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Read one document by name or vault-relative path.
    Read {
        filename: String,
        #[arg(long)]
        excerpt_length: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List indexed documents.
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        no_content: bool,
        #[arg(long)]
        quiet: bool,
    },

    /// Show index statistics.
    Stats,

    /// Collect a bounded context packet about a topic or the whole vault.
    Collect {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
        #[arg(long)]
        max_docs: Option<usize>,
        #[arg(long)]
        max_chars_per_doc: Option<usize>,
        /// Where the packet goes: the response, a vault note, or both.
        #[arg(long, value_enum)]
        memory_mode: Option<MemoryModeArg>,
        /// Token returned by a previous batch.
        #[arg(long)]
        continuation_token: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Load a snapshot note written by `collect`.
    LoadMemory {
        /// Vault-relative note path. Defaults to the configured snapshot path.
        #[arg(long)]
        memory_path: Option<String>,
        #[arg(long)]
        excerpt_length: Option<usize>,
        #[arg(long)]
        no_content: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run a tool call from raw JSON parameters.
    Call {
        /// e.g. '{"action":"search","keyword":"project"}'
        params: String,
    },
}

impl OutputArgs {
    fn apply(&self, params: &mut VaultParams) {
        params.compression_mode = self.mode.map(CompressionMode::from);
        params.max_output_chars = self.max_output_chars;
        params.quiet = self.quiet.then_some(true);
    }
}

fn build_params(command: Commands) -> Result<VaultParams, ToolResponse> {
    let params = match command {
        Commands::Search {
            keyword,
            limit,
            excerpt_length,
            no_content,
            output,
        } => {
            let mut p = VaultParams::new(VaultAction::Search);
            p.keyword = Some(keyword);
            p.limit = limit;
            p.excerpt_length = excerpt_length;
            p.include_content = Some(!no_content);
            output.apply(&mut p);
            p
        }
        Commands::Read {
            filename,
            excerpt_length,
            output,
        } => {
            let mut p = VaultParams::new(VaultAction::Read);
            p.filename = Some(filename);
            p.excerpt_length = excerpt_length;
            output.apply(&mut p);
            p
        }
        Commands::List {
            limit,
            no_content,
            quiet,
        } => {
            let mut p = VaultParams::new(VaultAction::ListAll);
            p.limit = limit;
            p.include_content = Some(!no_content);
            p.quiet = quiet.then_some(true);
            p
        }
        Commands::Stats => VaultParams::new(VaultAction::Stats),
        Commands::Collect {
            topic,
            scope,
            max_docs,
            max_chars_per_doc,
            memory_mode,
            continuation_token,
            output,
        } => {
            let mut p = VaultParams::new(VaultAction::CollectContext);
            p.topic = topic;
            p.scope = scope.map(|s| match s {
                ScopeArg::Topic => Scope::Topic,
                ScopeArg::All => Scope::All,
            });
            p.max_docs = max_docs;
            p.max_chars_per_doc = max_chars_per_doc;
            p.memory_mode = memory_mode.map(|m| match m {
                MemoryModeArg::ResponseOnly => MemoryMode::ResponseOnly,
                MemoryModeArg::VaultNote => MemoryMode::VaultNote,
                MemoryModeArg::Both => MemoryMode::Both,
            });
            p.continuation_token = continuation_token;
            output.apply(&mut p);
            p
        }
        Commands::LoadMemory {
            memory_path,
            excerpt_length,
            no_content,
            output,
        } => {
            let mut p = VaultParams::new(VaultAction::LoadMemory);
            p.memory_path = memory_path;
            p.excerpt_length = excerpt_length;
            p.include_content = Some(!no_content);
            output.apply(&mut p);
            p
        }
        Commands::Call { params } => return VaultParams::from_json(&params),
    };
    Ok(params)
}

/// Config file when present, otherwise defaults around `--vault`. The
/// `--vault` flag wins over both the file and `VAULT_DIR_PATH`.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        let root = cli.vault.clone().unwrap_or_default();
        Config::minimal(root).with_env_overrides()
    };
    if let Some(root) = &cli.vault {
        cfg.vault.root = root.clone();
    }
    cfg.validate().with_context(|| {
        format!(
            "No usable configuration: pass --vault, set {}, or create {}",
            config::VAULT_DIR_ENV,
            cli.config.display()
        )
    })?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = resolve_config(&cli)?;
    let app = AppContext::new(cfg)?;

    let response = match build_params(cli.command) {
        Ok(params) => execute(&app, params).await,
        Err(response) => response,
    };

    println!("{}", response.render());
    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
