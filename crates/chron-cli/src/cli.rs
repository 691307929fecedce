use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chron",
    about = "Chronicle: versioned snapshots of generated files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to chron.toml
    #[arg(short, long, global = true, default_value = "chron.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a repository
    Init(InitArgs),
    /// Commit files from disk to a repository branch
    Apply(ApplyArgs),
    /// Queue a change request for the next drain
    Enqueue(EnqueueArgs),
    /// Apply every queued change request
    Drain(DrainArgs),
    /// Show commit history
    Log(LogArgs),
    /// Write the checked-out branch into the working tree
    Checkout(CheckoutArgs),
}

/// Where a repository lives and which branch it tracks.
#[derive(Args)]
pub struct RepoArgs {
    /// Repository path (the working tree, or the metadata directory if bare)
    #[arg(default_value = ".")]
    pub path: PathBuf,
    #[arg(short, long, default_value = "main")]
    pub branch: String,
    #[arg(long)]
    pub bare: bool,
}

#[derive(Args)]
pub struct InitArgs {
    #[command(flatten)]
    pub repo: RepoArgs,
}

/// Files to read from disk, plus deletions.
#[derive(Args)]
pub struct FileArgs {
    /// Files to upsert, relative to --from
    pub files: Vec<String>,
    /// Directory the files are read from
    #[arg(long, default_value = ".")]
    pub from: PathBuf,
    /// Paths to delete
    #[arg(long = "delete")]
    pub deletes: Vec<String>,
    /// Remove every file not named in this change
    #[arg(long)]
    pub clear_all: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Repository path
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
    #[arg(short, long, default_value = "main")]
    pub branch: String,
    #[arg(long)]
    pub bare: bool,
    #[arg(short, long)]
    pub message: String,
    /// Author as "Name <email>"
    #[arg(long)]
    pub author: String,
    #[command(flatten)]
    pub files: FileArgs,
}

#[derive(Args)]
pub struct EnqueueArgs {
    /// Repository id from chron.toml
    #[arg(long)]
    pub repo: String,
    /// Group id; requests sharing it are committed together
    #[arg(long)]
    pub group: String,
    #[arg(long)]
    pub principal: String,
    #[arg(short, long, default_value = "")]
    pub message: String,
    #[command(flatten)]
    pub files: FileArgs,
}

#[derive(Args)]
pub struct DrainArgs {
    /// Drain only this repository id
    #[arg(long)]
    pub repo: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub repo: RepoArgs,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct CheckoutArgs {
    #[command(flatten)]
    pub repo: RepoArgs,
    /// Overwrite local edits to tracked files
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["chron", "init", "/srv/inv", "--bare", "-b", "trunk"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.repo.path, PathBuf::from("/srv/inv"));
            assert_eq!(args.repo.branch, "trunk");
            assert!(args.repo.bare);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_apply() {
        let cli = Cli::try_parse_from([
            "chron",
            "apply",
            "--repo",
            "inv",
            "-m",
            "nightly",
            "--author",
            "Jane <jane@example.com>",
            "--clear-all",
            "--delete",
            "old.sql",
            "a.sql",
            "b.sql",
        ])
        .unwrap();
        if let Command::Apply(args) = cli.command {
            assert_eq!(args.message, "nightly");
            assert_eq!(args.files.files, vec!["a.sql", "b.sql"]);
            assert_eq!(args.files.deletes, vec!["old.sql"]);
            assert!(args.files.clear_all);
            assert_eq!(args.branch, "main");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_enqueue() {
        let cli = Cli::try_parse_from([
            "chron", "enqueue", "--repo", "inv", "--group", "g1", "--principal", "jdoe", "v.sql",
        ])
        .unwrap();
        if let Command::Enqueue(args) = cli.command {
            assert_eq!(args.group, "g1");
            assert_eq!(args.message, "");
            assert_eq!(args.files.from, PathBuf::from("."));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_drain_with_config() {
        let cli = Cli::try_parse_from(["chron", "drain", "-c", "/etc/chron.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/chron.toml"));
        assert!(matches!(cli.command, Command::Drain(DrainArgs { repo: None })));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["chron", "--verbose", "log"]).unwrap();
        assert!(cli.verbose);
    }
}
