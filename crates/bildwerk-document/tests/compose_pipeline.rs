// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{
    DEFAULT_FULL_PAGE_TOLERANCE, ExifOrientation, LayoutConfig, Orientation, PageSize,
    PixelBuffer, PixelFormat, SourceRef, UserTransform,
};
use bildwerk_document::{
    ComposeInput, ComposedDocument, Composer, ImageRasterProcessor, PdfInspector, RasterProcessor,
    page_count,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio_util::sync::CancellationToken;

fn config() -> LayoutConfig {
    LayoutConfig {
        page_size: PageSize::A4,
        orientation: Orientation::Portrait,
        margin_points: 30.0,
        spacing_points: 30.0,
        omit_full_page_margin: false,
        optimize_for_fax: false,
        full_page_tolerance: DEFAULT_FULL_PAGE_TOLERANCE,
    }
}

/// Produces flat grey buffers of a size looked up by source name, and tracks
/// how many calls were made and how many run at the same time.
#[derive(Default)]
struct FakeProcessor {
    sizes: HashMap<String, (u32, u32)>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeProcessor {
    fn with_sizes(sizes: &[(&str, u32, u32)]) -> Self {
        Self {
            sizes: sizes
                .iter()
                .map(|(name, w, h)| (name.to_string(), (*w, *h)))
                .collect(),
            ..Self::default()
        }
    }
}

impl RasterProcessor for FakeProcessor {
    fn process(
        &self,
        source: &SourceRef,
        transform: &UserTransform,
        fax: bool,
    ) -> Result<PixelBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);

        let name = source.display_name();
        let Some(&(width, height)) = self.sizes.get(&name) else {
            return Err(BildwerkError::UnsupportedInput {
                index: 0,
                source_name: name,
                reason: "unknown test image".into(),
            });
        };
        let format = if fax { PixelFormat::Luma8 } else { PixelFormat::Rgb8 };
        Ok(PixelBuffer {
            width,
            height,
            format,
            pixels: vec![128; width as usize * height as usize * format.channels()],
            residual_orientation: ExifOrientation::Normal,
            baked_transform: *transform,
            fax,
        })
    }
}

fn inputs(names: &[&str]) -> Vec<ComposeInput> {
    names
        .iter()
        .map(|name| ComposeInput::new(SourceRef::from_path(*name)))
        .collect()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn emitted_page_count_matches_the_layout() {
    let processor = FakeProcessor::with_sizes(&[
        ("a.jpg", 400, 300),
        ("b.jpg", 1000, 1000),
        ("c.jpg", 1000, 200),
    ]);
    let composer = Composer::new(processor, 2);

    let doc = composer
        .compose(
            inputs(&["a.jpg", "b.jpg", "c.jpg"]),
            &config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(doc.placements.len(), 3);
    assert_eq!(doc.page_count, page_count(&doc.placements));
    assert_eq!(doc.page_count, 2);

    let inspector = PdfInspector::from_bytes(&doc.bytes).unwrap();
    assert_eq!(inspector.page_count(), doc.page_count);
    assert_eq!(ComposedDocument::MIME_TYPE, "application/pdf");
}

#[tokio::test]
async fn document_hash_covers_the_emitted_bytes() {
    use sha2::{Digest, Sha256};

    let composer = Composer::new(FakeProcessor::with_sizes(&[("a.jpg", 640, 480)]), 1);
    let doc = composer
        .compose(inputs(&["a.jpg"]), &config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(doc.document_hash.len(), 64);
    assert_eq!(doc.document_hash, hex::encode(Sha256::digest(&doc.bytes)));
    assert!(doc.created_at <= chrono::Utc::now());
}

#[tokio::test]
async fn landscape_photo_example_end_to_end() {
    let composer = Composer::new(FakeProcessor::with_sizes(&[("photo.jpg", 400, 300)]), 1);
    let doc = composer
        .compose(inputs(&["photo.jpg"]), &config(), &CancellationToken::new())
        .await
        .unwrap();

    let placement = doc.placements[0];
    assert_eq!(placement.page_index, 0);
    assert!((placement.render_width - 535.28).abs() < 1e-6);
    assert_eq!(placement.render_height, 402.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.pdf");
    doc.write_to(&path).unwrap();

    let inspector = PdfInspector::open(&path).unwrap();
    assert_eq!(inspector.page_count(), 1);
    let (width, height) = inspector.page_size(1).unwrap();
    assert!((width - 595.28).abs() < 0.5, "width {width}");
    assert!((height - 841.89).abs() < 0.5, "height {height}");
}

#[tokio::test]
async fn fax_mode_keeps_placements_and_emits_grey() {
    let sizes = [("a.jpg", 640, 480), ("b.jpg", 480, 640)];
    let names = ["a.jpg", "b.jpg"];

    let plain = Composer::new(FakeProcessor::with_sizes(&sizes), 2)
        .compose(inputs(&names), &config(), &CancellationToken::new())
        .await
        .unwrap();

    let fax_config = LayoutConfig {
        optimize_for_fax: true,
        ..config()
    };
    let fax = Composer::new(FakeProcessor::with_sizes(&sizes), 2)
        .compose(inputs(&names), &fax_config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(plain.placements, fax.placements);
    assert!(fax.bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn cancelled_run_produces_nothing() {
    let composer = Composer::new(FakeProcessor::with_sizes(&[("a.jpg", 10, 10)]), 1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = composer
        .compose(inputs(&["a.jpg"]), &config(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, BildwerkError::Cancelled));
}

#[tokio::test]
async fn first_failure_reports_its_position() {
    let composer = Composer::new(
        FakeProcessor::with_sizes(&[("a.jpg", 10, 10), ("c.jpg", 10, 10)]),
        3,
    );
    let err = composer
        .compose(
            inputs(&["a.jpg", "missing.jpg", "c.jpg"]),
            &config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.image_index(), Some(1));
    assert!(matches!(err, BildwerkError::UnsupportedInput { .. }));
}

#[tokio::test]
async fn early_failure_stops_the_raster_stage() {
    let mut names = vec!["bad.jpg"];
    let good = ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg", "8.jpg"];
    names.extend(good);
    let sizes: Vec<(&str, u32, u32)> = good.iter().map(|n| (*n, 10, 10)).collect();
    let processor = FakeProcessor {
        delay: Duration::from_millis(20),
        ..FakeProcessor::with_sizes(&sizes)
    };
    let calls = Arc::clone(&processor.calls);

    let err = Composer::new(processor, 1)
        .compose(inputs(&names), &config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.image_index(), Some(0));

    // Nothing is started after the failure, not even in the background.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelling_mid_raster_stops_further_work() {
    let names = ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"];
    let sizes: Vec<(&str, u32, u32)> = names.iter().map(|n| (*n, 10, 10)).collect();
    let processor = FakeProcessor {
        delay: Duration::from_millis(50),
        ..FakeProcessor::with_sizes(&sizes)
    };
    let calls = Arc::clone(&processor.calls);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        }
    });

    let err = Composer::new(processor, 2)
        .compose(inputs(&names), &config(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, BildwerkError::Cancelled));

    tokio::time::sleep(Duration::from_millis(150)).await;
    let started = calls.load(Ordering::SeqCst);
    assert!(started <= 2, "{started} images rasterized after cancel");
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let composer = Composer::new(FakeProcessor::default(), 1);
    let err = composer
        .compose(Vec::new(), &config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BildwerkError::NoInputs));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raster_stage_respects_the_pool_size() {
    let names = ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"];
    let sizes: Vec<(&str, u32, u32)> = names.iter().map(|n| (*n, 20, 20)).collect();
    let processor = FakeProcessor {
        delay: Duration::from_millis(20),
        ..FakeProcessor::with_sizes(&sizes)
    };
    let peak = Arc::clone(&processor.peak);

    let doc = Composer::new(processor, 2)
        .compose(inputs(&names), &config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(doc.placements.len(), 6);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency {peak}");
}

#[tokio::test]
async fn real_images_compose_and_plan_agree() {
    let dir = tempfile::tempdir().unwrap();
    let wide = dir.path().join("wide.png");
    let tall = dir.path().join("tall.png");
    std::fs::write(&wide, png_bytes(60, 30)).unwrap();
    std::fs::write(&tall, png_bytes(30, 60)).unwrap();

    let edit = UserTransform {
        rotation_degrees: 90,
        ..UserTransform::identity()
    };
    let inputs = vec![
        ComposeInput::new(SourceRef::from_path(&wide)).with_transform(edit),
        ComposeInput::new(SourceRef::from_path(&tall)),
    ];

    let composer = Composer::new(ImageRasterProcessor, 2);
    let planned = composer.plan(&inputs, &config()).unwrap();
    let doc = composer
        .compose(inputs, &config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(planned, doc.placements);
    // Both end up 30x60 and each needs more than half the page.
    assert_eq!(doc.page_count, 2);
    assert_eq!(PdfInspector::from_bytes(&doc.bytes).unwrap().page_count(), 2);
}

/// JPEG bytes with an Exif APP1 segment whose Orientation tag is 6.
fn rotated_phone_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 60, 60])))
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .unwrap();
    let exif: &[u8] = &[
        b'E', b'x', b'i', b'f', 0, 0, b'M', b'M', 0, 0x2a, 0, 0, 0, 8, // TIFF header
        0, 1, // one entry
        0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, 6, 0, 0, // Orientation = 6
        0, 0, 0, 0, // no next IFD
    ];
    let mut bytes = vec![0xff, 0xd8, 0xff, 0xe1];
    bytes.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
    bytes.extend_from_slice(exif);
    bytes.extend_from_slice(&jpeg[2..]);
    bytes
}

#[tokio::test]
async fn exif_rotated_photo_is_planned_and_composed_alike() {
    use bildwerk_core::types::Rotation;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phone.jpg");
    std::fs::write(&path, rotated_phone_jpeg(80, 40)).unwrap();
    let inputs = vec![ComposeInput::new(SourceRef::from_path(&path))];

    let composer = Composer::new(ImageRasterProcessor, 1);
    let planned = composer.plan(&inputs, &config()).unwrap();
    let doc = composer
        .compose(inputs, &config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(planned, doc.placements);
    let placement = doc.placements[0];
    assert_eq!(placement.rotation_quadrant, Rotation::Clockwise90);
    // Displayed upright it is 40x80, so taller than wide on the page.
    assert!(placement.render_height > placement.render_width);
    assert_eq!(PdfInspector::from_bytes(&doc.bytes).unwrap().page_count(), 1);
}

#[tokio::test]
async fn inspector_counts_pages_of_foreign_pdfs() {
    use lopdf::{Dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..3 {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(3)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let inspector = PdfInspector::from_bytes(&bytes).unwrap();
    assert_eq!(inspector.page_count(), 3);
    assert_eq!(inspector.page_size(2), Some((612.0, 792.0)));
}
