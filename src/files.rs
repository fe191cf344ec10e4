//! Directory scanning and default output naming.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Image extensions the rotate and create_pdf commands pick up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

/// Whether `path` has one of [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// File stem as a string, falling back to `default` for odd names.
pub fn stem_or<'a>(path: &'a Path, default: &'a str) -> std::borrow::Cow<'a, str> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or(std::borrow::Cow::Borrowed(default))
}

/// `path` with its extension replaced by `{suffix}`, keeping the directory.
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = stem_or(path, "output");
    path.with_file_name(format!("{}{}", stem, suffix))
}

/// `{pdf_stem}_images` beside the PDF.
pub fn default_extract_dir(pdf: &Path) -> PathBuf {
    sibling_with_suffix(pdf, "_images")
}

/// `{directory}_combined.pdf` beside the directory.
pub fn default_assembly_output(dir: &Path) -> PathBuf {
    // Trailing separators and "." would otherwise yield an empty name.
    let resolved = if dir.file_name().is_none() {
        dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
    } else {
        dir.to_path_buf()
    };
    let name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "images".to_string());
    resolved.with_file_name(format!("{}_combined.pdf", name))
}

/// `{input without extension}_advanced_compressed.pdf`.
pub fn default_compress_output(pdf: &Path) -> PathBuf {
    sibling_with_suffix(pdf, "_advanced_compressed.pdf")
}

/// `{input without extension}_compressed.pdf`.
pub fn default_optimize_output(pdf: &Path) -> PathBuf {
    sibling_with_suffix(pdf, "_compressed.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_supported_image(Path::new("scan.PNG")));
        assert!(is_supported_image(Path::new("a/b/photo.JpEg")));
        assert!(is_supported_image(Path::new("x.webp")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("README")));
    }

    #[test]
    fn default_names() {
        assert_eq!(
            default_extract_dir(Path::new("/tmp/report.pdf")),
            PathBuf::from("/tmp/report_images")
        );
        assert_eq!(
            default_compress_output(Path::new("docs/scan.pdf")),
            PathBuf::from("docs/scan_advanced_compressed.pdf")
        );
        assert_eq!(
            default_optimize_output(Path::new("scan.pdf")),
            PathBuf::from("scan_compressed.pdf")
        );
        assert_eq!(
            default_assembly_output(Path::new("/data/pages")),
            PathBuf::from("/data/pages_combined.pdf")
        );
    }

    #[test]
    fn listing_is_sorted_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();

        let names: Vec<_> = list_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.txt"]);
    }

    #[test]
    fn listing_missing_directory_fails() {
        let err = list_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
