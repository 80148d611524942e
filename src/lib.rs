//! # Vault Context
//!
//! A markdown-vault context engine for AI agents.
//!
//! Vault Context indexes a directory of markdown notes (an Obsidian-style
//! vault), answers keyword searches and document reads inside a strict path
//! boundary, and assembles bounded, resumable context packets about a topic.
//! Packets can be persisted back into the vault as a snapshot note and
//! reloaded later as long-term memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Walker    │──▶│   Indexer   │──▶│ VaultManager │
//! │ (bounded IO)│   │ frontmatter │   │  resolve/RW  │
//! └─────────────┘   │   + links   │   └──────┬───────┘
//!                   └─────────────┘          │
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!               ┌─────────────┐       ┌─────────────┐
//!               │   Context   │       │   Actions   │
//!               │ cache/token │──────▶│ (CLI/tool)  │
//!               └─────────────┘       └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vault --vault ~/notes search "project"
//! vault --vault ~/notes collect --topic rust --memory-mode both
//! vault --vault ~/notes load-memory
//! vault call '{"action":"read","filename":"Meeting Notes.md"}'
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`semaphore`] | FIFO counting semaphore for file IO |
//! | [`walker`] | Recursive markdown discovery |
//! | [`frontmatter`] | YAML frontmatter parsing and rendering |
//! | [`links`] | Wiki/markdown link extraction |
//! | [`indexer`] | Whole-vault index build |
//! | [`vault`] | Vault manager: search, resolve, read, write |
//! | [`compression`] | Output presets and the compression envelope |
//! | [`context`] | Context collection, cache, snapshot and memory |
//! | [`metrics`] | Per-response JSONL metrics |
//! | [`actions`] | Tool-call dispatch |
//! | [`app`] | Shared application state |

pub mod actions;
pub mod app;
pub mod compression;
pub mod config;
pub mod context;
pub mod error;
pub mod frontmatter;
pub mod indexer;
pub mod links;
pub mod metrics;
pub mod models;
pub mod semaphore;
pub mod vault;
pub mod walker;

pub use actions::{execute, ToolResponse, VaultAction, VaultParams};
pub use app::AppContext;
pub use error::{Result, VaultError};
