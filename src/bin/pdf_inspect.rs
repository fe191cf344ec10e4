//! Print the pages and embedded images of a PDF.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_tools::{ImageSource, NativeDocument, PageSource};
use std::path::PathBuf;

/// List page sizes and embedded image objects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PDF file path
    pdf: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let doc = NativeDocument::open(&args.pdf)
        .with_context(|| format!("Failed to open {}", args.pdf.display()))?;

    println!("{}: {} pages", args.pdf.display(), doc.page_count());

    let mut total = 0;
    for page in 0..doc.page_count() {
        match doc.page_size(page) {
            Ok(size) => println!("Page {}: {:.1} x {:.1} pt", page + 1, size.width, size.height),
            Err(e) => println!("Page {}: size unavailable ({})", page + 1, e),
        }

        let images = match doc.page_images(page) {
            Ok(images) => images,
            Err(e) => {
                println!("  images unavailable: {}", e);
                continue;
            }
        };
        for (index, image) in images.iter().enumerate() {
            let filters = if image.filters.is_empty() {
                "raw".to_string()
            } else {
                image.filters.join(", ")
            };
            println!(
                "  img{}: {}x{} px, {} {}-bit, [{}]{}",
                index + 1,
                image.width,
                image.height,
                image.color_space,
                image.bits_per_component,
                filters,
                if image.soft_mask.is_some() { " +alpha" } else { "" }
            );
        }
        total += images.len();
    }

    println!("{} image objects", total);
    Ok(())
}
