use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use humansize::{format_size, BINARY};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::commands::{self, SvnSyncRequest};
use crate::config::Settings;
use crate::error::SyncError;
use crate::fs::ObjectStore;
use crate::source::SvnCli;
use crate::sync::{RunState, RunSummary, SyncConfig, TransformOptions};

/// Push static media to an S3 bucket, uploading only what changed.
#[derive(Debug, Parser)]
#[command(name = "mediasync", version)]
pub struct Cli {
    /// Settings file (default: <config dir>/mediasync/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Push the media root directory to the bucket
    ///
    /// Objects are written without a public-read ACL; grant read access with
    /// a bucket policy.
    #[command(name = "s3-push")]
    S3Push {
        #[command(flatten)]
        common: CommonArgs,

        /// Upload every file without checking the bucket
        #[arg(long)]
        force: bool,
    },

    /// Push the changes of a Subversion working copy to the bucket
    #[command(name = "s3-svnsync")]
    S3Svnsync {
        #[command(flatten)]
        common: CommonArgs,

        /// Accept a working copy whose URL differs from the one last synced
        #[arg(long)]
        ignore_url: bool,

        /// Revision the working copy is expected to be at
        #[arg(long, value_name = "N")]
        revision: Option<u64>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Key prefix inside the bucket
    #[arg(short, long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,

    /// Gzip stylesheets and scripts, whatever their size
    #[arg(long)]
    pub gzip: bool,

    /// Send a two-year Cache-Control header
    ///
    /// The matching Expires date is stored as x-amz-meta-expires object
    /// metadata, not as an HTTP Expires header, so only Cache-Control takes
    /// effect.
    #[arg(long)]
    pub expires: bool,

    /// Show what would be uploaded without uploading
    #[arg(long = "dryrun", alias = "dry-run")]
    pub dry_run: bool,

    /// Concurrent uploads
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub workers: usize,

    /// One line per file decision and upload
    #[arg(short, long)]
    pub verbose: bool,

    /// Also log headers and sizes of every upload
    #[arg(long)]
    pub debug: bool,

    /// Media root, overriding the settings
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,
}

impl CommonArgs {
    fn sync_config(&self, force: bool) -> SyncConfig {
        SyncConfig {
            prefix: self.prefix.clone(),
            force,
            dry_run: self.dry_run,
            workers: self.workers,
            transform: TransformOptions {
                gzip: self.gzip,
                expires: self.expires,
            },
            synced_revision: None,
        }
    }
}

impl Cli {
    pub fn common(&self) -> &CommonArgs {
        match &self.command {
            Commands::S3Push { common, .. } | Commands::S3Svnsync { common, .. } => common,
        }
    }

    /// Default log directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        let common = self.common();
        if common.debug {
            "debug"
        } else if common.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Run the selected command and report its outcome.
pub async fn run(cli: Cli) -> RunState {
    match execute(cli).await {
        Ok(summary) => {
            print_summary(&summary);
            summary.state()
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            RunState::Aborted
        }
    }
}

async fn execute(cli: Cli) -> Result<RunSummary, SyncError> {
    let mut settings = Settings::load(cli.config.as_deref())?.with_env();
    if let Some(root) = &cli.common().root {
        settings.media_root = Some(root.clone());
    }
    let deploy = settings.validate()?;
    let store: Arc<dyn ObjectStore> = Arc::new(deploy.open_store()?);
    info!(
        provider = deploy.provider.display_name(),
        bucket = %deploy.bucket,
        "opened object store"
    );

    match cli.command {
        Commands::S3Push { common, force } => {
            commands::push(store, deploy.media_root, common.sync_config(force)).await
        }
        Commands::S3Svnsync {
            common,
            ignore_url,
            revision,
        } => {
            let request = SvnSyncRequest {
                root: deploy.media_root,
                marker_key: deploy.svn_marker_key,
                ignore_url,
                revision,
                config: common.sync_config(false),
            };
            commands::svn_sync(store, SvnCli::default(), request).await
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let title = if summary.dry_run { "Dry run complete" } else { "Sync complete" };
    println!("{}", title.bold());

    if summary.dry_run {
        println!("  {:<14}{}", "would upload:", summary.would_upload.to_string().cyan());
    } else {
        println!("  {:<14}{}", "uploaded:", summary.uploaded.to_string().green());
    }
    println!("  {:<14}{}", "skipped:", summary.skipped);
    let failed = summary.failed.to_string();
    println!(
        "  {:<14}{}",
        "failed:",
        if summary.failed > 0 { failed.red() } else { failed.normal() }
    );
    println!("  {:<14}{}", "sent:", format_size(summary.bytes_sent, BINARY));
    println!("  {:<14}{:.2?}", "elapsed:", summary.duration);

    for failure in &summary.failures {
        println!("  {} {}: {}", "✗".red(), failure.logical_key, failure.reason);
    }
}
