mod common;

use common::{write_pdf, FixtureImage, FixturePage};
use pdf_tools::{
    compress_file, CompressionParams, Error, ImageSource, NativeDocument, PageSource, RendererKind,
};
use std::fs;

/// A "scan": each page is one uncompressed full-page image.
fn scanned_pdf(path: &std::path::Path, pages: usize) {
    let pages: Vec<FixturePage> = (0..pages)
        .map(|_| FixturePage {
            width: 600.0,
            height: 800.0,
            images: vec![FixtureImage::scan(600, 800)],
        })
        .collect();
    write_pdf(path, &pages);
}

#[test]
fn one_output_page_per_input_page_within_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    scanned_pdf(&input, 3);

    let params = CompressionParams {
        max_width: 300,
        max_height: 300,
        ..Default::default()
    };
    let report = compress_file(&input, None, &params, RendererKind::Native).unwrap();
    assert_eq!(report.output, dir.path().join("scan_advanced_compressed.pdf"));
    assert_eq!((report.pages, report.rendered, report.blank), (3, 3, 0));

    let output = NativeDocument::open(&report.output).unwrap();
    assert_eq!(output.page_count(), 3);
    for page in 0..3 {
        let images = output.page_images(page).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].width <= 300 && images[0].height <= 300);
        assert_eq!(images[0].filters, vec!["DCTDecode".to_string()]);
    }
}

#[test]
fn large_scan_shrinks_substantially() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    scanned_pdf(&input, 4);

    let report = compress_file(&input, None, &CompressionParams::default(), RendererKind::Native).unwrap();
    assert!(report.compressed_size < report.original_size);
    assert!(report.reduction_percent() >= 90.0, "{}", report.reduction_percent());
}

#[test]
fn lower_quality_never_larger() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    scanned_pdf(&input, 1);

    let low = CompressionParams {
        quality: 1,
        ..Default::default()
    };
    let high = CompressionParams {
        quality: 100,
        ..Default::default()
    };
    let low_report =
        compress_file(&input, Some(&dir.path().join("low.pdf")), &low, RendererKind::Native).unwrap();
    let high_report =
        compress_file(&input, Some(&dir.path().join("high.pdf")), &high, RendererKind::Native).unwrap();
    assert!(low_report.compressed_size <= high_report.compressed_size);
}

#[test]
fn output_name_gets_pdf_extension() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    scanned_pdf(&input, 1);

    let report = compress_file(
        &input,
        Some(&dir.path().join("smaller")),
        &CompressionParams::default(),
        RendererKind::Native,
    )
    .unwrap();
    assert_eq!(report.output, dir.path().join("smaller.pdf"));
    assert!(report.output.exists());
}

#[test]
fn invalid_parameters_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    scanned_pdf(&input, 1);

    let params = CompressionParams {
        quality: 101,
        ..Default::default()
    };
    let err = compress_file(&input, None, &params, RendererKind::Native).unwrap_err();
    assert!(matches!(err, Error::InvalidQuality(101)));
}

#[test]
fn corrupt_input_is_fatal_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    fs::write(&input, b"%PDF-1.4 truncated").unwrap();

    let err = compress_file(&input, None, &CompressionParams::default(), RendererKind::Native).unwrap_err();
    assert!(matches!(err, Error::DocumentOpen { .. }));
    assert!(!dir.path().join("broken_advanced_compressed.pdf").exists());
}

#[test]
fn palette_scan_renders_natively() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("palette.pdf");
    write_pdf(
        &input,
        &[FixturePage {
            width: 60.0,
            height: 60.0,
            images: vec![FixtureImage::indexed(60, 60)],
        }],
    );

    let report = compress_file(&input, None, &CompressionParams::default(), RendererKind::Native).unwrap();
    assert_eq!((report.pages, report.rendered, report.blank), (1, 1, 0));

    let output = NativeDocument::open(&report.output).unwrap();
    let page = output.page_images(0).unwrap()[0].decode().unwrap().to_rgb8();
    let (w, h) = page.dimensions();
    let left = page.get_pixel(w / 8, h / 2).0;
    let right = page.get_pixel(w - w / 8, h / 2).0;
    assert!(left[0] > 200 && left[2] < 60, "{:?}", left);
    assert!(right[2] > 200 && right[0] < 60, "{:?}", right);
}

#[test]
fn pages_without_images_are_reported_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mixed.pdf");
    write_pdf(
        &input,
        &[
            FixturePage {
                width: 300.0,
                height: 400.0,
                images: vec![FixtureImage::scan(300, 400)],
            },
            FixturePage {
                width: 300.0,
                height: 400.0,
                images: Vec::new(),
            },
        ],
    );

    let report = compress_file(&input, None, &CompressionParams::default(), RendererKind::Native).unwrap();
    assert_eq!((report.pages, report.rendered, report.blank, report.empty), (2, 2, 0, 1));
}
