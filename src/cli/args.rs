//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// membranch - commit documents to isolated memory branches
#[derive(Parser, Debug)]
#[command(name = "mb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if mb was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Where `persist` takes its content from.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct ContentSource {
    /// Content given inline
    #[arg(long)]
    pub content: Option<String>,

    /// Read content from a file
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Commit content to a memory branch without touching the checkout
    #[command(
        long_about = "Commit content to a memory branch without touching the checkout.\n\n\
            The branch is created on first use, rooted in an empty tree. Content is \
            read from --content, --file, or standard input, in that order.",
        after_help = "\
EXAMPLES:
    # Record a note for agent a1
    mb persist agents/a1/note.md --content 'hello'

    # Same, with the namespace given separately
    mb persist note.md --namespace a1 --content 'hello'

    # Pipe a document onto a session branch and publish it
    cat plan.md | mb persist plan.md --branch session-42 --push"
    )]
    Persist {
        /// Path inside the memory branch
        path: String,

        /// Memory branch (prefix added when missing)
        #[arg(short, long)]
        branch: Option<String>,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,

        /// Namespace segment prepended to the path
        #[arg(long)]
        namespace: Option<String>,

        #[command(flatten)]
        source: ContentSource,

        /// Publish after committing
        #[arg(long)]
        push: bool,
    },

    /// Print content from a memory branch
    Read {
        /// Path inside the memory branch
        path: String,

        /// Memory branch
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// List memory branches, local and remote
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every path on a memory branch
    Paths {
        /// Memory branch
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Show a memory branch's history, newest first
    Log {
        /// Memory branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Maximum number of commits
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish a memory branch to the remote
    #[command(after_help = "\
SAFETY:
    Force pushes need both --force and --yes-force.
    Protected branches (main, master by default) are never force-pushed.
    If the remote moved ahead, the push is refused; fetch and reconcile first.")]
    Push {
        /// Memory branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Overwrite the remote branch
        #[arg(long)]
        force: bool,

        /// Confirm --force
        #[arg(long, requires = "force")]
        yes_force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_persist_with_inline_content() {
        let cli = Cli::try_parse_from([
            "mb", "persist", "a1/note.md", "--content", "hi", "--branch", "s1",
        ])
        .unwrap();
        match cli.command {
            Command::Persist {
                path,
                branch,
                source,
                push,
                ..
            } => {
                assert_eq!(path, "a1/note.md");
                assert_eq!(branch.as_deref(), Some("s1"));
                assert_eq!(source.content.as_deref(), Some("hi"));
                assert!(!push);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn content_and_file_conflict() {
        let result = Cli::try_parse_from([
            "mb", "persist", "x.md", "--content", "a", "--file", "b.md",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn yes_force_requires_force() {
        assert!(Cli::try_parse_from(["mb", "push", "--yes-force"]).is_err());
        assert!(Cli::try_parse_from(["mb", "push", "--force", "--yes-force"]).is_ok());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mb", "list", "-q", "--cwd", "/tmp"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.cwd, Some(PathBuf::from("/tmp")));
    }
}
