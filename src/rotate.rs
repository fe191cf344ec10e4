//! Batch 90-degree rotation of image files.

use image::DynamicImage;
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::files;

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Direction {
    #[value(alias = "cw")]
    Clockwise,
    #[default]
    #[value(alias = "acw", alias = "counterclockwise", alias = "ccw")]
    Anticlockwise,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Clockwise => "clockwise",
            Direction::Anticlockwise => "anticlockwise",
        }
    }

    /// Rotate a bitmap a quarter turn in this direction.
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        match self {
            Direction::Clockwise => img.rotate90(),
            Direction::Anticlockwise => img.rotate270(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a rotation batch
#[derive(Debug, Clone, Default)]
pub struct RotationReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Files without a supported image extension
    pub skipped: usize,
    /// Written files in processing order
    pub outputs: Vec<PathBuf>,
}

/// Where the rotated copy of `path` goes.
pub fn rotated_path(path: &Path, direction: Direction, overwrite: bool) -> PathBuf {
    if overwrite {
        return path.to_path_buf();
    }
    let stem = files::stem_or(path, "image");
    let name = match path.extension() {
        Some(ext) => format!("{}_rotated_{}.{}", stem, direction, ext.to_string_lossy()),
        None => format!("{}_rotated_{}", stem, direction),
    };
    path.with_file_name(name)
}

fn rotate_file(path: &Path, target: &Path, direction: Direction) -> Result<()> {
    let img = image::open(path)?;
    let rotated = direction.apply(&img);
    rotated.save(target)?;
    Ok(())
}

/// Rotate every supported image directly inside `dir`.
pub fn rotate_directory(dir: &Path, direction: Direction, overwrite: bool) -> Result<RotationReport> {
    let mut report = RotationReport::default();

    for path in files::list_files(dir)? {
        if !files::is_supported_image(&path) {
            report.skipped += 1;
            continue;
        }

        let target = rotated_path(&path, direction, overwrite);
        match rotate_file(&path, &target, direction) {
            Ok(()) => {
                info!("Rotated {} {}", path.display(), direction);
                report.succeeded += 1;
                report.outputs.push(target);
            }
            Err(e) => {
                warn!("Failed to rotate {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
