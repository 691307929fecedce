use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chron_outbox::{NewRequest, OutboxConfig, OutboxProcessor, ProcessLock, SqliteQueue};
use chron_sync::{history, synchronize, ChangeSet, FileUpdate, Identity, Repository, SyncOutcome};
use colored::Colorize;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Init(args) => cmd_init(args),
        Command::Apply(args) => cmd_apply(&cli.config, args),
        Command::Enqueue(args) => cmd_enqueue(&cli.config, args),
        Command::Drain(args) => cmd_drain(&cli.config, args),
        Command::Log(args) => cmd_log(args),
        Command::Checkout(args) => cmd_checkout(args),
    }
}

fn load_config(path: &Path) -> anyhow::Result<OutboxConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(OutboxConfig::default());
    }
    OutboxConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Parse `Name <email>`; a bare string is taken as the name.
fn parse_author(s: &str) -> anyhow::Result<Identity> {
    let s = s.trim();
    match s.split_once('<') {
        Some((name, rest)) => {
            let Some(email) = rest.strip_suffix('>') else {
                bail!("malformed author {s:?}, expected \"Name <email>\"");
            };
            Ok(Identity::new(name.trim(), email.trim()))
        }
        None => Ok(Identity::new(s, "")),
    }
}

/// Read the named files and collect them with the deletions.
fn read_files(args: &FileArgs) -> anyhow::Result<Vec<FileUpdate>> {
    let mut updates = Vec::with_capacity(args.files.len() + args.deletes.len());
    for name in &args.files {
        let content = fs::read(args.from.join(name))
            .with_context(|| format!("reading {}", args.from.join(name).display()))?;
        updates.push(FileUpdate::upsert(name.replace('\\', "/"), content));
    }
    for name in &args.deletes {
        updates.push(FileUpdate::delete(name.replace('\\', "/")));
    }
    Ok(updates)
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let repo = &args.repo;
    Repository::init(&repo.path, &repo.branch, repo.bare)?;
    let mode = if repo.bare { "bare " } else { "" };
    println!(
        "{} Initialized {}repository in {}",
        "✓".green().bold(),
        mode,
        repo.path.display().to_string().bold()
    );
    println!("  Branch: {}", repo.branch.yellow());
    Ok(())
}

fn cmd_apply(config: &Path, args: ApplyArgs) -> anyhow::Result<()> {
    let config = load_config(config)?;
    // Same lock as drain: both may create the branch.
    let _lock = ProcessLock::acquire(&config.lock_path)?;
    let repo = Repository::open_or_init(&args.repo, &args.branch, args.bare)?;
    let mut change_set = ChangeSet::new(parse_author(&args.author)?, args.message);
    change_set.updates = read_files(&args.files)?;
    if args.files.clear_all {
        change_set = change_set.clearing_all();
    }

    match synchronize(&repo, &change_set)? {
        SyncOutcome::Applied { commit, parent, .. } => {
            let kind = if parent.is_some() { "" } else { " (root)" };
            println!(
                "{} {}{} on {}",
                "✓".green().bold(),
                commit.short_hex().yellow(),
                kind,
                args.branch.green()
            );
            if !repo.is_bare() && repo.refs().head_branch()?.as_deref() == Some(args.branch.as_str()) {
                let stats = repo.checkout_head(true)?;
                println!("  {} written, {} removed", stats.written, stats.removed);
            }
        }
        SyncOutcome::NoOp => println!("No changes."),
    }
    Ok(())
}

fn cmd_enqueue(config: &Path, args: EnqueueArgs) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let queued_at = chrono::Local::now().fixed_offset();
    let mut request = NewRequest::new(args.repo, args.group, args.principal, args.message, queued_at);
    if args.files.clear_all {
        request = request.clear_all();
    }
    for update in read_files(&args.files)? {
        request.files.push((Some(update.path), update.content));
    }

    let mut queue = SqliteQueue::open(&config.queue_path)
        .with_context(|| format!("opening queue {}", config.queue_path.display()))?;
    let id = queue.enqueue(&request)?;
    println!(
        "{} Queued request {} ({} files) for {}",
        "✓".green().bold(),
        id.to_string().bold(),
        request.files.len(),
        request.repo.yellow()
    );
    Ok(())
}

fn cmd_drain(config: &Path, args: DrainArgs) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let Some(id) = args.repo else {
        let report = chron_outbox::run(&config)?;
        for entry in &report.repositories {
            match &entry.result {
                Ok(stats) => println!(
                    "{} {}: {} groups, {} committed, {} unchanged",
                    "✓".green().bold(),
                    entry.repo.yellow(),
                    stats.groups,
                    stats.applied,
                    stats.noops
                ),
                Err(e) => println!("{} {}: {}", "✗".red().bold(), entry.repo.yellow(), e),
            }
        }
        if !report.is_success() {
            bail!("{} repositories failed to drain", report.failures());
        }
        return Ok(());
    };

    let _lock = ProcessLock::acquire(&config.lock_path)?;
    let registry = config.registry()?;
    let repo = registry.open(&id)?;
    let queue = SqliteQueue::open(&config.queue_path)?;
    let mut processor = OutboxProcessor::new(queue, config.directory());
    let stats = processor.drain(&id, &repo)?;
    println!(
        "{} {}: {} groups, {} committed, {} unchanged",
        "✓".green().bold(),
        id.yellow(),
        stats.groups,
        stats.applied,
        stats.noops
    );
    Ok(())
}

fn cmd_log(args: LogArgs) -> anyhow::Result<()> {
    let repo = Repository::open(&args.repo.path, &args.repo.branch, args.repo.bare)?;
    let commits = history(&repo, &args.repo.branch, Some(args.limit))?;
    if commits.is_empty() {
        println!("No commits on {}.", args.repo.branch.yellow());
        return Ok(());
    }
    for (id, commit) in commits {
        if args.oneline {
            println!("{} {}", id.short_hex().yellow(), commit.message);
        } else {
            println!("{} {}", "commit".yellow(), id.to_hex().yellow());
            println!("Author: {}", commit.author.identity);
            println!("Date:   {}", commit.author.when.to_rfc2822());
            println!("\n    {}\n", commit.message);
        }
    }
    Ok(())
}

fn cmd_checkout(args: CheckoutArgs) -> anyhow::Result<()> {
    let repo = Repository::open(&args.repo.path, &args.repo.branch, args.repo.bare)?;
    let stats = repo.checkout_head(args.force)?;
    println!(
        "{} {} written, {} removed",
        "✓".green().bold(),
        stats.written,
        stats.removed
    );
    Ok(())
}
