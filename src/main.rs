//! PDF Tools CLI
//!
//! Command-line interface for extracting, rotating, assembling and
//! compressing PDF page images.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_tools::{
    compress_file, create_pdf, extract_file, optimize_file, rotate_directory, AssembleOptions,
    CompressionParams, DuplicatePolicy, ExtractOptions,
};

use cli::{Args, Command};

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .parse_default_env()
        .init();

    match args.command {
        Command::Extract {
            pdf_path,
            min_width,
            min_height,
            output_dir,
        } => {
            let options = ExtractOptions {
                min_width,
                min_height,
                output_dir,
            };
            let report = extract_file(&pdf_path, &options)
                .with_context(|| format!("Failed to extract images from {}", pdf_path.display()))?;

            println!(
                "Extracted {} images to {} ({} below {}x{}, {} failed)",
                report.accepted,
                report.output_dir.display(),
                report.rejected,
                min_width,
                min_height,
                report.failed
            );
        }

        Command::Rotate {
            directory,
            direction,
            no_overwrite,
        } => {
            let report = rotate_directory(&directory, direction, !no_overwrite)
                .with_context(|| format!("Failed to rotate images in {}", directory.display()))?;

            println!(
                "Rotated {} images {} ({} failed, {} skipped)",
                report.succeeded, direction, report.failed, report.skipped
            );
        }

        Command::CreatePdf {
            directory,
            output,
            page_dpi,
            keep_duplicates,
        } => {
            let options = AssembleOptions {
                output,
                page_dpi,
                duplicates: if keep_duplicates {
                    DuplicatePolicy::KeepAll
                } else {
                    DuplicatePolicy::FirstByName
                },
            };
            let report = create_pdf(&directory, &options)
                .with_context(|| format!("Failed to create PDF from {}", directory.display()))?;

            println!(
                "Created {} with {} pages ({} skipped, {} failed)",
                report.output.display(),
                report.pages,
                report.skipped,
                report.failed
            );
        }

        Command::Compress {
            pdf_path,
            quality,
            max_width,
            max_height,
            output,
            page_dpi,
            renderer,
        } => {
            let params = CompressionParams {
                quality,
                max_width,
                max_height,
                page_dpi,
            };
            let report = compress_file(&pdf_path, output.as_deref(), &params, renderer)
                .with_context(|| format!("Failed to compress {}", pdf_path.display()))?;

            println!("Compressed {} pages into {}", report.pages, report.output.display());
            if report.blank > 0 {
                println!("  {} pages could not be rendered and were left blank", report.blank);
            }
            if report.empty > 0 {
                println!(
                    "  {} pages had no content the renderer could draw and are white",
                    report.empty
                );
            }
            println!(
                "  {} -> {} ({:.1}% reduction)",
                human_size(report.original_size),
                human_size(report.compressed_size),
                report.reduction_percent()
            );
        }

        Command::CompressLossless {
            pdf_path,
            level,
            output,
        } => {
            let report = optimize_file(&pdf_path, output.as_deref(), level)
                .with_context(|| format!("Failed to optimise {}", pdf_path.display()))?;

            println!("Optimised {} into {}", pdf_path.display(), report.output.display());
            println!(
                "  {} -> {} ({:.1}% reduction, {} objects removed)",
                human_size(report.original_size),
                human_size(report.optimized_size),
                report.reduction_percent(),
                report.removed_objects
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.00 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MB");
    }
}
