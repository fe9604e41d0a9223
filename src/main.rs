use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use distpack::copy::{CopyOptions, EntryInfo, ListingPolicy, OsDepNames};
use distpack::filter::PatternFilter;
use distpack::{archive, build, cfg, copy, pack, ui};

/// Distpack - copy directory trees with filters and package them as zip distributions
#[derive(Parser)]
#[command(name = "distpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Suppress per-file progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the packaging plan (defaults to ./distpack.toml)
    #[arg(long, global = true, env = "DISTPACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default packaging plan
    Init {
        /// Overwrite an existing plan
        #[arg(short, long)]
        force: bool,
    },

    /// Copy one file, including its permission bits
    CopyFile {
        src: PathBuf,
        dst: PathBuf,

        /// Apply the platform executable suffix to the source name
        #[arg(long)]
        exe: bool,
    },

    /// Copy files into a directory under their base names
    CopyToDir {
        dst: PathBuf,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Apply the platform executable suffix to the source names
        #[arg(long)]
        exe: bool,
    },

    /// Copy a directory tree into DST/<name of SRC>
    CopyTree {
        src: PathBuf,
        dst: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Fail on directory read errors instead of skipping the rest of the listing
        #[arg(long)]
        strict: bool,

        /// Keep source modification times
        #[arg(long)]
        preserve_mtime: bool,
    },

    /// Build a zip archive from a prepared distribution directory
    Zip {
        /// Output archive path
        archive: PathBuf,

        /// Top-level folder name inside the archive
        dist_name: String,

        /// Directory holding the distribution contents
        dir: PathBuf,
    },

    /// Run the packaging plan: lay out the staging directory, then archive it
    Build {
        /// Remove an existing staging directory first
        #[arg(long)]
        clean: bool,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Skip entries whose name matches this glob (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Only copy files whose name matches this glob (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    include: Vec<String>,

    /// Skip entries whose name starts with a dot
    #[arg(long)]
    skip_hidden: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    ui::init(cli.quiet);

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(cfg::DEFAULT_CONFIG_FILE));

    let result = match cli.command {
        Commands::Init { force } => cmd_init(&config_path, force),
        Commands::CopyFile { src, dst, exe } => cmd_copy_file(&src, &dst, exe),
        Commands::CopyToDir { dst, files, exe } => cmd_copy_to_dir(&dst, &files, exe),
        Commands::CopyTree {
            src,
            dst,
            filter,
            strict,
            preserve_mtime,
        } => cmd_copy_tree(&src, &dst, &filter, strict, preserve_mtime),
        Commands::Zip {
            archive,
            dist_name,
            dir,
        } => cmd_zip(&archive, &dist_name, &dir),
        Commands::Build { clean } => cmd_build(&config_path, clean),
    };

    if let Err(e) = result {
        ui::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

fn exe_options(exe: bool) -> CopyOptions {
    CopyOptions {
        os_names: if exe {
            OsDepNames::executables()
        } else {
            OsDepNames::new()
        },
        ..CopyOptions::default()
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    cfg::init(config_path, force)?;
    ui::success(&format!("Wrote {}", config_path.display()));
    ui::hint("Edit the [[files]] and [[trees]] steps, then run 'distpack build'");
    Ok(())
}

fn cmd_copy_file(src: &Path, dst: &Path, exe: bool) -> Result<()> {
    copy::copy_file(dst, src, &exe_options(exe))?;
    Ok(())
}

fn cmd_copy_to_dir(dst: &Path, files: &[PathBuf], exe: bool) -> Result<()> {
    copy::copy_to_dir(dst, files, &exe_options(exe))?;
    ui::success(&format!("Copied {} files to {}", files.len(), dst.display()));
    Ok(())
}

fn cmd_copy_tree(
    src: &Path,
    dst: &Path,
    args: &FilterArgs,
    strict: bool,
    preserve_mtime: bool,
) -> Result<()> {
    let opts = CopyOptions {
        listing: if strict {
            ListingPolicy::Fail
        } else {
            ListingPolicy::Truncate
        },
        preserve_mtime,
        ..CopyOptions::default()
    };
    let filter = PatternFilter::new(&args.include, &args.exclude, args.skip_hidden)?;
    let matches = |dir: &Path, entry: &EntryInfo| filter.matches(dir, entry);
    let predicate: Option<copy::Filter<'_>> = if filter.is_noop() {
        None
    } else {
        Some(&matches)
    };

    let nested = pack::copy_tree(dst, src, &opts, predicate)?;
    ui::success(&format!("Copied {} → {}", src.display(), nested.display()));
    Ok(())
}

fn cmd_zip(archive_path: &Path, dist_name: &str, dir: &Path) -> Result<()> {
    ui::info(&format!("Packing {} as {}/", dir.display(), dist_name));
    let summary = archive::zip_dist(archive_path, dist_name, dir)?;
    ui::success(&format!(
        "Wrote {} ({} files, {})",
        archive_path.display(),
        summary.file_count,
        ui::format_bytes(summary.size_bytes)
    ));
    Ok(())
}

fn cmd_build(config_path: &Path, clean: bool) -> Result<()> {
    let config = cfg::load(config_path)?;
    let base = cfg::base_dir(config_path);

    ui::section(&format!("Building {}", config.dist.name));
    let report = build::run(&config, &base, clean)
        .with_context(|| format!("Build of {} failed", config.dist.name))?;

    let (staged, staged_bytes) = archive::count_files_and_size(&report.staging)?;
    println!(
        "  {} {} files, {}",
        "staged:".dimmed(),
        staged,
        ui::format_bytes(staged_bytes)
    );
    ui::success(&format!(
        "Wrote {} ({} files, {})",
        report.archive.display(),
        report.summary.file_count,
        ui::format_bytes(report.summary.size_bytes)
    ));
    Ok(())
}
