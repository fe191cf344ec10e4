//! Lossless size reduction: object garbage collection and stream deflation.

use log::{debug, info};
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::files;
use crate::output;

/// How aggressively to rewrite the document structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CompressionLevel {
    /// Drop unreferenced objects
    Low,
    /// Also deflate uncompressed streams
    #[default]
    Medium,
    /// Also remove empty streams and renumber objects
    High,
}

/// Outcome of a lossless optimisation
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub output: PathBuf,
    pub original_size: u64,
    pub optimized_size: u64,
    /// Objects removed from the file
    pub removed_objects: usize,
}

impl OptimizationReport {
    /// Size reduction relative to the input, in percent (negative if it grew).
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.optimized_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Apply `level` to a loaded document, returning the number of objects removed.
pub fn optimize_document(doc: &mut Document, level: CompressionLevel) -> usize {
    let mut removed = doc.prune_objects().len();
    debug!("Pruned {} unreferenced objects", removed);

    if level == CompressionLevel::Low {
        return removed;
    }
    doc.compress();

    if level == CompressionLevel::High {
        let empty = doc.delete_zero_length_streams().len();
        debug!("Deleted {} empty streams", empty);
        removed += empty;
        // Deleting streams can orphan the objects that pointed at them.
        removed += doc.prune_objects().len();
        doc.renumber_objects();
    }
    removed
}

/// Optimise the PDF at `input`.
///
/// `destination` defaults to `{input without extension}_compressed.pdf`.
pub fn optimize_file(input: &Path, destination: Option<&Path>, level: CompressionLevel) -> Result<OptimizationReport> {
    if !input.is_file() {
        return Err(Error::DocumentOpen {
            path: input.to_path_buf(),
            reason: "no such file".to_string(),
        });
    }
    let original_size = fs::metadata(input)?.len();
    let mut doc = Document::load(input).map_err(|e| Error::DocumentOpen {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;

    let removed_objects = optimize_document(&mut doc, level);

    let target = match destination {
        Some(path) => output::ensure_pdf_extension(path.to_path_buf()),
        None => files::default_optimize_output(input),
    };
    let optimized_size = output::save_atomically(&mut doc, &target)?;
    info!(
        "Optimised {} ({:?}): {} -> {} bytes",
        input.display(),
        level,
        original_size,
        optimized_size
    );

    Ok(OptimizationReport {
        output: target,
        original_size,
        optimized_size,
        removed_objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    /// One page, plus an orphaned stream and an uncompressed content stream.
    fn bloated_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = "BT /F1 12 Tf 72 720 Td (hello hello hello hello hello) Tj ET\n".repeat(50);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.add_object(Stream::new(dictionary! {}, vec![0u8; 4096]));
        doc
    }

    #[test]
    fn low_prunes_orphans() {
        let mut doc = bloated_document();
        let before = doc.objects.len();
        let removed = optimize_document(&mut doc, CompressionLevel::Low);
        assert_eq!(removed, 1);
        assert_eq!(doc.objects.len(), before - 1);
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn medium_output_is_smaller_and_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bloated.pdf");
        bloated_document().save(&input).unwrap();

        let report = optimize_file(&input, None, CompressionLevel::Medium).unwrap();
        assert_eq!(report.output, dir.path().join("bloated_compressed.pdf"));
        assert!(report.optimized_size < report.original_size);
        assert!(report.reduction_percent() > 0.0);

        let reloaded = Document::load(&report.output).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    #[test]
    fn high_keeps_pages() {
        let mut doc = bloated_document();
        optimize_document(&mut doc, CompressionLevel::High);
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn unreadable_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("junk.pdf");
        fs::write(&input, b"this is not a pdf").unwrap();
        let err = optimize_file(&input, None, CompressionLevel::Low).unwrap_err();
        assert!(matches!(err, Error::DocumentOpen { .. }));
    }
}
