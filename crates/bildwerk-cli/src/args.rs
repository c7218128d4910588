// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use bildwerk_core::AppConfig;
use bildwerk_core::types::{Orientation, PageSize};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "bildwerk",
    about = "Compose images and PDF pages into one paginated PDF",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Lay out images top to bottom and write them as a PDF
    Compose(ComposeArgs),

    /// Write a settings file with every default filled in
    Config {
        /// Where to write the settings file
        #[arg(long, value_name = "FILE")]
        write: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct ComposeArgs {
    /// Images (jpg, jpeg, png, bmp, tiff) and PDFs, in page order
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Output PDF file
    #[arg(short, long, required_unless_present = "dry_run")]
    pub output: Option<PathBuf>,

    /// Settings file (JSON); flags below override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output paper size
    #[arg(long, value_enum)]
    pub page_size: Option<PageSizeArg>,

    /// Output orientation
    #[arg(long, value_enum)]
    pub orientation: Option<OrientationArg>,

    /// Page margin in points
    #[arg(long)]
    pub margin: Option<f64>,

    /// Gap between stacked images in points
    #[arg(long)]
    pub spacing: Option<f64>,

    /// Place page-shaped images edge to edge, without margin
    #[arg(long)]
    pub omit_full_page_margin: bool,

    /// Convert every image to black and white for faxing
    #[arg(long)]
    pub fax: bool,

    /// Aspect-ratio tolerance for page-shaped images
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Images rasterized at the same time
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Document title metadata
    #[arg(long)]
    pub title: Option<String>,

    /// Print the page layout as JSON instead of writing a PDF
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PageSizeArg {
    A4,
    Letter,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => Self::A4,
            PageSizeArg::Letter => Self::Letter,
        }
    }
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Portrait => Self::Portrait,
            OrientationArg::Landscape => Self::Landscape,
        }
    }
}

impl ComposeArgs {
    /// Layer the flags given on the command line over `config`.
    pub fn apply_to(&self, mut config: AppConfig) -> AppConfig {
        if let Some(page_size) = self.page_size {
            config.page_size = page_size.into();
        }
        if let Some(orientation) = self.orientation {
            config.orientation = orientation.into();
        }
        if let Some(margin) = self.margin {
            config.margin_points = margin;
        }
        if let Some(spacing) = self.spacing {
            config.spacing_points = spacing;
        }
        if let Some(tolerance) = self.tolerance {
            config.full_page_tolerance = tolerance;
        }
        if let Some(jobs) = self.jobs {
            config.worker_pool_size = jobs;
        }
        if let Some(title) = &self.title {
            config.document_title = title.clone();
        }
        config.omit_full_page_margin |= self.omit_full_page_margin;
        config.optimize_for_fax |= self.fax;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(args: &[&str]) -> ComposeArgs {
        let cli = Cli::try_parse_from(std::iter::once("bildwerk").chain(args.iter().copied()))
            .unwrap();
        match cli.command {
            Commands::Compose(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flags_override_the_settings_file() {
        let args = compose(&[
            "compose",
            "a.jpg",
            "b.pdf",
            "-o",
            "out.pdf",
            "--page-size",
            "letter",
            "--orientation",
            "landscape",
            "--margin",
            "10",
            "--fax",
            "--jobs",
            "8",
        ]);
        assert_eq!(args.inputs.len(), 2);

        let config = args.apply_to(AppConfig::default());
        assert_eq!(config.page_size, PageSize::Letter);
        assert_eq!(config.orientation, Orientation::Landscape);
        assert_eq!(config.margin_points, 10.0);
        assert_eq!(config.spacing_points, 36.0);
        assert!(config.optimize_for_fax);
        assert!(!config.omit_full_page_margin);
        assert_eq!(config.worker_pool_size, 8);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let args = compose(&["compose", "a.jpg", "-o", "out.pdf"]);
        let mut file = AppConfig::default();
        file.optimize_for_fax = true;
        file.margin_points = 12.0;

        let config = args.apply_to(file.clone());
        assert_eq!(config, file);
    }

    #[test]
    fn output_is_optional_only_for_dry_runs() {
        assert!(Cli::try_parse_from(["bildwerk", "compose", "a.jpg"]).is_err());
        let args = compose(&["compose", "a.jpg", "--dry-run"]);
        assert!(args.output.is_none());
        assert!(args.dry_run);
    }

    #[test]
    fn config_command_takes_a_path() {
        let cli = Cli::try_parse_from(["bildwerk", "config", "--write", "bildwerk.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { .. }));
    }
}
