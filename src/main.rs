use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use hatchet::{
    parse_pattern_list, OsFs, ProtectionPolicy, PruneOptions, PruneReport, Pruner,
    SystemCommander, Toolchain,
};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Prune a Go monorepo down to the files needed to build selected packages",
    long_about = None
)]
struct Args {
    /// Source directory to prune
    #[arg(long)]
    dir: PathBuf,

    /// Comma-separated package patterns to keep (e.g. "example.com/app,./tools/...")
    #[arg(long)]
    packages: String,

    /// Also keep test files and test fixture data of kept packages
    #[arg(long)]
    with_tests: bool,

    /// Never delete files inside version-control metadata directories
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    protect_git: bool,

    /// Never delete go.mod/go.sum outside testdata directories
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    protect_gomod: bool,

    /// Show what would be removed, but don't remove anything
    #[arg(long)]
    dry_run: bool,

    /// Don't run the tidy command after pruning
    #[arg(long)]
    skip_tidy: bool,

    /// Toolchain profile (TOML) layered over the built-in Go profile
    #[arg(long)]
    toolchain: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hatchet={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: String) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

fn print_report(report: &PruneReport) {
    let clean = &report.clean;

    if clean.dry_run {
        for path in &clean.removed_files {
            println!("Would remove: {}", path.display());
        }
        for path in &clean.removed_dirs {
            println!("Would remove: {}/", path.display());
        }
    }

    println!("========================================");
    println!(
        "Packages: {} discovered, {} kept",
        report.discovered,
        report.keep.len().to_string().bold()
    );
    println!(
        "Files kept: {} ({} protected)",
        clean.kept.len(),
        clean.protected
    );
    if report.embeds_found > 0 {
        println!("Embedded files found: {}", report.embeds_found);
    }

    let summary = format!(
        "{} files, {} directories, {}",
        clean.removed_files.len(),
        clean.removed_dirs.len(),
        format_size(clean.reclaimed_bytes, BINARY)
    );
    if clean.dry_run {
        println!("Would remove: {}", summary.bold());
        println!("Dry run mode: No files were deleted.");
    } else {
        println!("Removed: {}", summary.bold().red());
    }

    if let Some(warning) = &report.tidy_warning {
        let mut message = warning.to_string();
        let mut source = warning.source();
        while let Some(cause) = source {
            message.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        println!("{}", format!("Warning: {message}").yellow());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let toolchain = match &args.toolchain {
        Some(path) => Toolchain::load(path)?,
        None => Toolchain::builtin()?,
    };

    let source_dir = args
        .dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve directory {}", args.dir.display()))?;

    let patterns = parse_pattern_list(&args.packages, &toolchain.pattern_syntax());
    if patterns.is_empty() {
        bail!("--packages must name at least one package pattern");
    }

    let options = PruneOptions {
        source_dir,
        patterns,
        with_tests: args.with_tests,
        policy: ProtectionPolicy {
            protect_vcs: args.protect_git,
            protect_manifests: args.protect_gomod,
        },
        dry_run: args.dry_run,
        tidy: !args.skip_tidy,
    };

    let commander = SystemCommander;
    let fs = OsFs;
    let pruner = Pruner::new(&commander, &fs, &toolchain);

    let progress = spinner(format!(
        "Listing {} packages in {}",
        toolchain.name,
        options.source_dir.display()
    ))?;
    let graph = pruner.discover(&options.source_dir);
    progress.finish_and_clear();
    let graph = graph.context("Failed to list packages")?;

    let report = pruner
        .prune(graph, &options)
        .with_context(|| format!("Failed to prune {}", options.source_dir.display()))?;

    print_report(&report);

    Ok(())
}
