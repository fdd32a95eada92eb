//! CLI argument definitions for the revmatch binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// revmatch - recommend reviewers for a paper by semantic similarity.
#[derive(Parser, Debug)]
#[command(name = "revmatch", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the embedding store, index and name map.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Print results as JSON.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recommend reviewers for a document (PDF or plain text).
    Recommend {
        /// The submitted paper.
        document: PathBuf,
        /// Number of reviewers to return.
        #[arg(short = 'k', long = "top-k")]
        k: Option<usize>,
    },
    /// Add a reviewer from a research summary.
    ///
    /// Re-adding a name that is already indexed replaces its stored
    /// embedding but appends a second index row, so the reviewer can appear
    /// twice in recommendations until the next `rebuild` or `remove`.
    Add(AddArgs),
    /// Remove a reviewer and rebuild the index.
    Remove {
        /// Reviewer name.
        name: String,
    },
    /// Rebuild the index from the embedding store.
    Rebuild,
    /// List reviewers in the embedding store.
    List,
    /// Replace the store with an embedded corpus of per-author papers and rebuild.
    Ingest {
        /// Directory with one subdirectory of `.pdf` or `.txt` papers per author.
        corpus_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("summary").required(true).multiple(false)))]
pub struct AddArgs {
    /// Reviewer name.
    pub name: String,

    /// Research summary or abstract.
    #[arg(long = "text", group = "summary")]
    pub text: Option<String>,

    /// File containing the research summary.
    #[arg(long = "text-file", group = "summary")]
    pub text_file: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > REVMATCH_CONFIG env var > ~/.revmatch/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("REVMATCH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// --data-dir override, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// --log-level override, if given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".revmatch").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".revmatch").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_recommend() {
        let args = CliArgs::parse_from(["revmatch", "recommend", "paper.pdf", "-k", "3"]);
        match args.command {
            Command::Recommend { document, k } => {
                assert_eq!(document, PathBuf::from("paper.pdf"));
                assert_eq!(k, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = CliArgs::parse_from(["revmatch", "list", "--data-dir", "/tmp/rv", "--json"]);
        assert!(matches!(args.command, Command::List));
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/tmp/rv"));
        assert!(args.json);
    }

    #[test]
    fn test_parse_add_with_text() {
        let args = CliArgs::parse_from(["revmatch", "add", "Ada", "--text", "analytical engines"]);
        match args.command {
            Command::Add(add) => {
                assert_eq!(add.name, "Ada");
                assert_eq!(add.text.as_deref(), Some("analytical engines"));
                assert!(add.text_file.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_add_requires_exactly_one_summary_source() {
        assert!(CliArgs::try_parse_from(["revmatch", "add", "Ada"]).is_err());
        assert!(CliArgs::try_parse_from([
            "revmatch",
            "add",
            "Ada",
            "--text",
            "x",
            "--text-file",
            "y.txt"
        ])
        .is_err());
    }

    #[test]
    fn test_config_path_flag_wins() {
        let args = CliArgs::parse_from(["revmatch", "-c", "/etc/revmatch.toml", "rebuild"]);
        assert_eq!(
            args.resolve_config_path(),
            PathBuf::from("/etc/revmatch.toml")
        );
        assert!(args.resolve_log_level().is_none());
    }

    #[test]
    fn test_add_help_mentions_duplicate_rows() {
        let mut command = CliArgs::command();
        let add = command.find_subcommand_mut("add").unwrap();
        let help = add
            .render_long_help()
            .to_string()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        assert!(help.contains("appends a second index row"));
        assert!(help.contains("rebuild"));
    }
}
