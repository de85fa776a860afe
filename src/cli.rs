//! CLI - Command Line Interface for CineStream
//!
//! Every pipeline operation is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Search the metadata source and every enabled backend
//! cinestream search "狂飙" --json
//!
//! # Resolve a title and list its play sources
//! cinestream resolve cms_4521 --api https://backend.example/api.php/provide/vod
//!
//! # Clean a manifest and fetch comments
//! cinestream manifest https://cdn.example/index.m3u8 -o clean.m3u8
//! cinestream comments "《Show Name》 第03集"
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Content temporarily unavailable
    NotFound = 4,
    /// No playable stream group
    NoStreams = 5,
    /// No comment track matched
    NoComments = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

impl From<&crate::error::Error> for ExitCode {
    fn from(err: &crate::error::Error) -> ExitCode {
        use crate::error::Error;
        match err {
            Error::NetworkTimeout { .. } | Error::NetworkExhausted { .. } => ExitCode::NetworkError,
            Error::MalformedResponse(_) => ExitCode::Error,
            Error::NoPlayableSource(_) => ExitCode::NoStreams,
            Error::NoCommentMatch(_) => ExitCode::NoComments,
            Error::InvalidEndpoint(_) => ExitCode::InvalidArgs,
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// CineStream - resilient catalog resolution and stream cleanup
#[derive(Parser, Debug)]
#[command(
    name = "cinestream",
    version,
    author = "Gorka & Hermes",
    about = "Resolve catalog content, clean HLS manifests, match comment tracks",
    long_about = "Queries unreliable catalog backends with direct and relayed fallbacks, \
                  resolves one canonical record plus alternatives, strips ad segments \
                  from HLS manifests and matches timed comment tracks.",
    after_help = "EXAMPLES:\n\
                  cinestream search \"blade runner\"          Search metadata and backends\n\
                  cinestream resolve cms_4521 --api URL      Resolve on one backend\n\
                  cinestream manifest URL -o clean.m3u8      Sanitize a manifest\n\
                  cinestream comments \"Show\" -e 3            Comments for episode 3"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the metadata source and every enabled backend by keyword
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Resolve an identifier to a primary record, alternatives and play sources
    #[command(visible_alias = "r")]
    Resolve(ResolveCmd),

    /// Fetch an HLS manifest and strip its ad segments
    #[command(visible_alias = "m")]
    Manifest(ManifestCmd),

    /// Match and print the comment track of an episode
    #[command(visible_alias = "dm")]
    Comments(CommentsCmd),

    /// Playback checkpoints
    #[command(subcommand)]
    Progress(ProgressCmd),

    /// Show or set the skip-intro/skip-outro policy
    Skip(SkipCmd),

    /// Manage catalog backends
    #[command(subcommand)]
    Sources(SourcesCmd),

    /// Watch history
    #[command(subcommand)]
    History(HistoryCmd),

    /// Local cache maintenance
    #[command(subcommand)]
    Cache(CacheCmd),
}

// =============================================================================
// Search Command
// =============================================================================

/// Search the metadata source and every enabled backend by keyword
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search keyword (title)
    #[arg(required = true)]
    pub query: String,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

// =============================================================================
// Resolve Command
// =============================================================================

/// Resolve an identifier
#[derive(Args, Debug)]
pub struct ResolveCmd {
    /// Content id (`cms_` prefix for catalog ids)
    #[arg(required = true)]
    pub id: String,

    /// Backend endpoint the id belongs to
    #[arg(long, short = 'a')]
    pub api: Option<String>,

    /// Title hint
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Treat the id as a scraped metadata id
    #[arg(long)]
    pub scraped: bool,

    /// Fill blank fields from the scraped metadata source
    #[arg(long)]
    pub enrich: bool,
}

// =============================================================================
// Manifest Command
// =============================================================================

/// Fetch and sanitize an HLS manifest
#[derive(Args, Debug)]
pub struct ManifestCmd {
    /// Manifest URL
    #[arg(required = true)]
    pub url: String,

    /// Write the cleaned manifest to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

// =============================================================================
// Comments Command
// =============================================================================

/// Match a comment track
#[derive(Args, Debug)]
pub struct CommentsCmd {
    /// Episode or series title as shown by the catalog
    #[arg(required = true)]
    pub title: String,

    /// Episode number (1-based)
    #[arg(long, short = 'e', default_value = "1")]
    pub episode: usize,

    /// Maximum number of events to print
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

impl CommentsCmd {
    /// Zero-based episode index
    pub fn episode_index(&self) -> usize {
        self.episode.saturating_sub(1)
    }
}

// =============================================================================
// Progress Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum ProgressCmd {
    /// Save a checkpoint
    Save(ProgressSaveCmd),
    /// Show a checkpoint
    Load(ProgressKey),
    /// Delete a checkpoint
    Clear(ProgressKey),
}

/// Content+episode a checkpoint belongs to
#[derive(Args, Debug)]
pub struct ProgressKey {
    /// Content id
    #[arg(required = true)]
    pub content: String,

    /// Episode index (0-based)
    #[arg(required = true)]
    pub episode: usize,
}

#[derive(Args, Debug)]
pub struct ProgressSaveCmd {
    #[command(flatten)]
    pub key: ProgressKey,

    /// Position in seconds, or MM:SS / HH:MM:SS
    #[arg(required = true)]
    pub position: String,
}

impl ProgressSaveCmd {
    /// Parse the position argument
    pub fn parse_position(&self) -> Option<f64> {
        let s = self.position.trim();
        if let Ok(secs) = s.parse::<f64>() {
            return secs.is_finite().then_some(secs);
        }
        parse_timestamp(s).map(|secs| secs as f64)
    }
}

/// Parse timestamp string (HH:MM:SS or MM:SS) to seconds
fn parse_timestamp(s: &str) -> Option<u64> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.len() {
        2 => {
            let mins: u64 = parts[0].parse().ok()?;
            let secs: u64 = parts[1].parse().ok()?;
            Some(mins * 60 + secs)
        }
        3 => {
            let hours: u64 = parts[0].parse().ok()?;
            let mins: u64 = parts[1].parse().ok()?;
            let secs: u64 = parts[2].parse().ok()?;
            Some(hours * 3600 + mins * 60 + secs)
        }
        _ => None,
    }
}

// =============================================================================
// Skip Command
// =============================================================================

/// Show the skip policy, or update the given parts of it
#[derive(Args, Debug)]
pub struct SkipCmd {
    /// Seconds to skip at the start of each episode
    #[arg(long, short = 'i')]
    pub intro: Option<u32>,

    /// Seconds before the end at which to advance to the next episode
    #[arg(long, short = 'o')]
    pub outro: Option<u32>,
}

// =============================================================================
// Sources Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum SourcesCmd {
    /// List every backend
    List,
    /// Add a backend
    Add {
        /// Display name
        name: String,
        /// Endpoint URL
        endpoint: String,
    },
    /// Remove a backend
    Remove {
        id: String,
    },
    /// Enable or disable a backend
    Toggle {
        id: String,
    },
    /// Restore the default backend list
    Reset,
}

// =============================================================================
// History and Cache Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum HistoryCmd {
    /// List recently watched titles
    List,
    /// Forget one title
    Remove {
        content_id: String,
    },
    /// Forget everything
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum CacheCmd {
    /// Remove every stored application key
    Clear,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Status OK response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOk {
    pub status: &'static str,
}

impl Default for StatusOk {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print human-readable lines, or `data` as JSON
    pub fn print_lines<T: Serialize>(&self, data: T, lines: &[String]) -> anyhow::Result<()> {
        if self.json {
            return self.print(data);
        }
        for line in lines {
            println!("{}", line);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_command() {
        let cli = Cli::parse_from(["cinestream", "search", "batman", "-l", "5"]);
        if let Command::Search(cmd) = cli.command {
            assert_eq!(cmd.query, "batman");
            assert_eq!(cmd.limit, 5);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["cinestream", "--json", "--quiet", "-v", "search", "test"]);
        assert!(cli.json);
        assert!(cli.quiet);
        assert!(cli.verbose);
    }

    #[test]
    fn test_resolve_with_options() {
        let cli = Cli::parse_from([
            "cinestream",
            "resolve",
            "cms_4521",
            "--api",
            "https://b.example/api",
            "--title",
            "Show",
            "--enrich",
        ]);
        if let Command::Resolve(cmd) = cli.command {
            assert_eq!(cmd.id, "cms_4521");
            assert_eq!(cmd.api.as_deref(), Some("https://b.example/api"));
            assert_eq!(cmd.title.as_deref(), Some("Show"));
            assert!(cmd.enrich);
            assert!(!cmd.scraped);
        } else {
            panic!("Expected Resolve command");
        }
    }

    #[test]
    fn test_comments_episode_index() {
        let cli = Cli::parse_from(["cinestream", "comments", "Show", "-e", "3"]);
        if let Command::Comments(cmd) = cli.command {
            assert_eq!(cmd.episode_index(), 2);
        } else {
            panic!("Expected Comments command");
        }
    }

    #[test]
    fn test_progress_position_parsing() {
        let cli = Cli::parse_from(["cinestream", "progress", "save", "42", "0", "1:30:00"]);
        if let Command::Progress(ProgressCmd::Save(cmd)) = cli.command {
            assert_eq!(cmd.key.content, "42");
            assert_eq!(cmd.parse_position(), Some(5400.0));
        } else {
            panic!("Expected progress save");
        }

        let cmd = ProgressSaveCmd {
            key: ProgressKey {
                content: "1".into(),
                episode: 0,
            },
            position: "95.5".into(),
        };
        assert_eq!(cmd.parse_position(), Some(95.5));

        let cmd = ProgressSaveCmd {
            key: ProgressKey {
                content: "1".into(),
                episode: 0,
            },
            position: "soon".into(),
        };
        assert_eq!(cmd.parse_position(), None);
    }

    #[test]
    fn test_sources_subcommands() {
        let cli = Cli::parse_from(["cinestream", "sources", "add", "Mirror", "https://m/api"]);
        assert!(matches!(
            cli.command,
            Command::Sources(SourcesCmd::Add { ref name, .. }) if name == "Mirror"
        ));
        let cli = Cli::parse_from(["cinestream", "sources", "toggle", "abc"]);
        assert!(matches!(cli.command, Command::Sources(SourcesCmd::Toggle { .. })));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Error), 1);
        assert_eq!(i32::from(ExitCode::InvalidArgs), 2);
        assert_eq!(i32::from(ExitCode::NetworkError), 3);
        assert_eq!(i32::from(ExitCode::NotFound), 4);
        assert_eq!(i32::from(ExitCode::NoStreams), 5);
        assert_eq!(i32::from(ExitCode::NoComments), 6);
    }

    #[test]
    fn test_error_exit_mapping() {
        use crate::error::Error;
        assert_eq!(
            ExitCode::from(&Error::NoPlayableSource("x".into())),
            ExitCode::NoStreams
        );
        assert_eq!(
            ExitCode::from(&Error::NetworkExhausted {
                url: "u".into(),
                attempts: 2
            }),
            ExitCode::NetworkError
        );
    }
}
