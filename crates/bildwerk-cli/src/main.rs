// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bildwerk — compose images and PDF pages into one paginated PDF.
//
// Entry point. Initialises logging, parses arguments, and runs the requested
// command. Failures are reported in plain language with a suggestion.

mod args;

use std::process::ExitCode;

use anyhow::{Context, Result};
use bildwerk_core::human_errors::{HumanError, Severity, humanize_error};
use bildwerk_core::{AppConfig, BildwerkError};
use bildwerk_document::{
    ComposeInput, Composer, EmitOptions, ImageRasterProcessor, LayoutSummary, MagickRasterizer,
    discover,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use args::{Cli, Commands, ComposeArgs};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compose(args) => compose(args).await,
        Commands::Config { write } => {
            AppConfig::default()
                .save(&write)
                .with_context(|| format!("writing {}", write.display()))?;
            println!("Wrote default settings → {}", write.display());
            Ok(())
        }
    }
}

async fn compose(args: ComposeArgs) -> Result<()> {
    let file_config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let config = args.apply_to(file_config);
    let layout_config = config.layout_config();
    layout_config.validate()?;

    // Holds the rendered PDF pages until the run is over.
    let input_set = tokio::task::spawn_blocking({
        let paths = args.inputs.clone();
        let rasterizer = MagickRasterizer::with_density(config.pdf_density_dpi);
        move || discover(&paths, &rasterizer)
    })
    .await??;

    let inputs: Vec<ComposeInput> = input_set
        .sources
        .iter()
        .map(|source| {
            ComposeInput::new(source.clone()).with_transform(config.edit_for(&source.display_name()))
        })
        .collect();

    let composer = Composer::new(ImageRasterProcessor, config.worker_pool_size).with_emit_options(
        EmitOptions {
            title: config.document_title.clone(),
        },
    );

    debug!(
        inputs = inputs.len(),
        pool = composer.pool_size(),
        "Composer ready"
    );

    if args.dry_run {
        let placements = composer.plan(&inputs, &layout_config)?;
        let summary = LayoutSummary::of(&placements);
        let report = serde_json::json!({
            "summary": summary,
            "placements": placements,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling");
                cancel.cancel();
            }
        }
    });

    let document = composer.compose(inputs, &layout_config, &cancel).await?;
    drop(input_set);

    // `output` is required unless this is a dry run.
    let output = args
        .output
        .context("an output file is required (use -o)")?;
    document.write_to(&output)?;

    info!(
        run = %document.run_id,
        created_at = %document.created_at.to_rfc3339(),
        "Done"
    );
    print_summary(&document.summary());
    println!("Wrote → {}", output.display());
    println!("sha256 {}", document.document_hash);
    Ok(())
}

fn print_summary(summary: &LayoutSummary) {
    println!(
        "{} image(s) on {} page(s), {} full-page",
        summary.images, summary.pages, summary.full_page_images
    );
}

fn report(err: &anyhow::Error) {
    debug!(error = ?err, "Command failed");
    match err.downcast_ref::<BildwerkError>() {
        Some(bildwerk_err) => {
            for line in describe(bildwerk_err) {
                eprintln!("{line}");
            }
        }
        None => eprintln!("error: {err:#}"),
    }
}

/// The lines printed for a failed run.
fn describe(err: &BildwerkError) -> Vec<String> {
    let HumanError {
        message,
        suggestion,
        retriable,
        severity,
    } = humanize_error(err);

    let label = match severity {
        Severity::Transient => "error",
        Severity::ActionRequired => "action needed",
        Severity::Permanent => "unusable input",
    };
    let mut lines = vec![format!("{label}: {message}"), format!("  {suggestion}")];
    if retriable {
        lines.push("  Running the same command again may work.".into());
    }
    if let Some(index) = err.image_index() {
        lines.push(format!("  (input #{index}: {err})"));
    }
    lines
}
