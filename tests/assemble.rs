mod common;

use common::{write_image, write_pdf, FixtureImage, FixturePage};
use pdf_tools::{
    create_pdf, extract_file, AssembleOptions, DuplicatePolicy, Error, ExtractOptions, ImageSource,
    NativeDocument, PageSize, PageSource,
};
use std::fs;

#[test]
fn pages_follow_numeric_order() {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    fs::create_dir(&pages).unwrap();
    // Widths encode the page number so the order can be read back.
    write_image(&pages.join("doc_page10_img1.png"), 100, 50);
    write_image(&pages.join("doc_page2_img1.jpg"), 20, 50);
    write_image(&pages.join("doc_page1_img1.bmp"), 10, 50);
    write_image(&pages.join("cover.png"), 30, 30);
    fs::write(pages.join("notes.txt"), b"ignored").unwrap();

    let report = create_pdf(&pages, &AssembleOptions::default()).unwrap();
    assert_eq!(report.output, dir.path().join("pages_combined.pdf"));
    assert_eq!((report.pages, report.skipped, report.failed), (3, 1, 0));

    let doc = NativeDocument::open(&report.output).unwrap();
    assert_eq!(doc.page_count(), 3);
    let widths: Vec<u32> = (0..3).map(|p| doc.page_images(p).unwrap()[0].width).collect();
    assert_eq!(widths, vec![10, 20, 100]);

    // 96 DPI: 100 px -> 75 pt
    assert_eq!(doc.page_size(2).unwrap(), PageSize::new(75.0, 37.5));
}

#[test]
fn jpeg_sources_are_embedded_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let jpeg = dir.path().join("x_page1_a.jpg");
    write_image(&jpeg, 40, 30);

    let options = AssembleOptions {
        output: Some(dir.path().join("out")),
        ..Default::default()
    };
    let report = create_pdf(dir.path(), &options).unwrap();
    assert_eq!(report.output, dir.path().join("out.pdf"));

    let doc = NativeDocument::open(&report.output).unwrap();
    let images = doc.page_images(0).unwrap();
    assert_eq!(images[0].filters, vec!["DCTDecode".to_string()]);
    assert_eq!(images[0].data, fs::read(&jpeg).unwrap());
}

#[test]
fn duplicate_page_numbers() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("a_page1_x.png"), 10, 10);
    write_image(&dir.path().join("a_page1_y.png"), 20, 20);
    write_image(&dir.path().join("a_page2_x.png"), 30, 30);

    let options = AssembleOptions {
        output: Some(dir.path().join("first.pdf")),
        ..Default::default()
    };
    let first = create_pdf(dir.path(), &options).unwrap();
    assert_eq!((first.pages, first.skipped), (2, 1));

    let options = AssembleOptions {
        output: Some(dir.path().join("all.pdf")),
        duplicates: DuplicatePolicy::KeepAll,
        ..Default::default()
    };
    let all = create_pdf(dir.path(), &options).unwrap();
    assert_eq!((all.pages, all.skipped), (3, 0));
}

#[test]
fn undecodable_images_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("a_page1_x.png"), 10, 10);
    fs::write(dir.path().join("a_page2_x.png"), b"not a png").unwrap();

    let options = AssembleOptions {
        output: Some(dir.path().join("out.pdf")),
        ..Default::default()
    };
    let report = create_pdf(dir.path(), &options).unwrap();
    assert_eq!((report.pages, report.failed), (1, 1));
}

#[test]
fn all_images_broken_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a_page1_x.png"), b"not a png").unwrap();

    let err = create_pdf(dir.path(), &AssembleOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NothingAssembled(_)));
}

#[test]
fn missing_directory_is_fatal() {
    let err = create_pdf(std::path::Path::new("/no/such/dir"), &AssembleOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn extracted_images_reassemble() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("book.pdf");
    let pages: Vec<FixturePage> = [(200, 100), (120, 240)]
        .iter()
        .map(|&(w, h)| FixturePage {
            width: w as f32,
            height: h as f32,
            images: vec![FixtureImage::flate(w, h)],
        })
        .collect();
    write_pdf(&pdf, &pages);

    let extracted = extract_file(&pdf, &ExtractOptions::default()).unwrap();
    assert_eq!(extracted.accepted, 2);

    let report = create_pdf(&extracted.output_dir, &AssembleOptions::default()).unwrap();
    assert_eq!(report.output, dir.path().join("book_images_combined.pdf"));

    let doc = NativeDocument::open(&report.output).unwrap();
    let sizes: Vec<(u32, u32)> = (0..2)
        .map(|p| {
            let image = &doc.page_images(p).unwrap()[0];
            (image.width, image.height)
        })
        .collect();
    assert_eq!(sizes, vec![(200, 100), (120, 240)]);
}
