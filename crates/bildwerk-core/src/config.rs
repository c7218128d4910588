// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// The layout engine never reads defaults on its own; `AppConfig` is where the
// front end keeps them and turns them into an explicit `LayoutConfig`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{
    DEFAULT_FULL_PAGE_TOLERANCE, LayoutConfig, Orientation, PageSize, UserTransform,
};

/// Persistent settings for composing documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub page_size: PageSize,
    pub orientation: Orientation,
    /// Margin around every page, in points.
    pub margin_points: f64,
    /// Vertical gap between stacked images, in points.
    pub spacing_points: f64,
    pub omit_full_page_margin: bool,
    pub optimize_for_fax: bool,
    pub full_page_tolerance: f64,
    /// Upper bound on images rasterized at the same time.
    pub worker_pool_size: usize,
    /// Resolution used when rasterizing PDF inputs into page images.
    pub pdf_density_dpi: u32,
    /// Title written into the PDF metadata.
    pub document_title: String,
    /// Per-image edits keyed by input file name.
    pub images: BTreeMap<String, UserTransform>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin_points: 36.0,
            spacing_points: 36.0,
            omit_full_page_margin: false,
            optimize_for_fax: false,
            full_page_tolerance: DEFAULT_FULL_PAGE_TOLERANCE,
            worker_pool_size: 4,
            pdf_density_dpi: 216,
            document_title: "Bildwerk Document".into(),
            images: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// The explicit layout configuration for one run.
    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            page_size: self.page_size,
            orientation: self.orientation,
            margin_points: self.margin_points,
            spacing_points: self.spacing_points,
            omit_full_page_margin: self.omit_full_page_margin,
            optimize_for_fax: self.optimize_for_fax,
            full_page_tolerance: self.full_page_tolerance,
        }
    }

    /// The user edit recorded for `file_name`, or the identity edit.
    pub fn edit_for(&self, file_name: &str) -> UserTransform {
        self.images.get(file_name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CropRegion;

    #[test]
    fn defaults_match_the_classic_a4_layout() {
        let config = AppConfig::default();
        let layout = config.layout_config();
        assert_eq!(layout.page_size, PageSize::A4);
        assert_eq!(layout.orientation, Orientation::Portrait);
        assert_eq!(layout.margin_points, 36.0);
        assert_eq!(layout.spacing_points, 36.0);
        assert_eq!(layout.full_page_tolerance, DEFAULT_FULL_PAGE_TOLERANCE);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "page_size": "Letter", "optimize_for_fax": true }"#).unwrap();
        assert_eq!(config.page_size, PageSize::Letter);
        assert!(config.optimize_for_fax);
        assert_eq!(config.margin_points, 36.0);
        assert_eq!(config.worker_pool_size, 4);
    }

    #[test]
    fn save_then_load_preserves_image_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bildwerk.json");

        let mut config = AppConfig::default();
        config.images.insert(
            "receipt.jpg".into(),
            UserTransform {
                rotation_degrees: 90,
                scale_x: -1.0,
                scale_y: 1.0,
                crop: Some(CropRegion {
                    x: 5,
                    y: 5,
                    width: 50,
                    height: 60,
                }),
            },
        );
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.edit_for("receipt.jpg").rotation_degrees, 90);
        assert!(loaded.edit_for("other.png").is_identity());
    }
}
