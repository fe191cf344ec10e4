use clap::{Parser, Subcommand};
use pdf_tools::{CompressionLevel, Direction, RendererKind, DEFAULT_PAGE_DPI};
use std::path::PathBuf;

const WORKFLOW: &str = "\
Examples:
  pdf-tools extract scan.pdf --min-width 100 --min-height 100
  pdf-tools rotate scan_images --direction cw
  pdf-tools create_pdf scan_images -o scan_fixed.pdf
  pdf-tools compress scan_fixed.pdf -q 30 --max-width 1200 --max-height 1600
  pdf-tools compress_lossless report.pdf --level high

Typical workflow: extract the page images, rotate the ones that need it,
assemble them back into a PDF with create_pdf, then compress the result.";

#[derive(Parser, Debug)]
#[command(name = "pdf-tools")]
#[command(
    author,
    version,
    about = "Extract, rotate, reassemble and compress the images in PDF files",
    arg_required_else_help = true,
    after_long_help = WORKFLOW
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save embedded images of a PDF as PNG files
    Extract {
        /// Input PDF file path
        pdf_path: PathBuf,

        /// Minimum image width in pixels
        #[arg(long, default_value = "50")]
        min_width: u32,

        /// Minimum image height in pixels
        #[arg(long, default_value = "50")]
        min_height: u32,

        /// Destination directory (defaults to {pdf_name}_images)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Rotate every image in a directory by 90 degrees
    Rotate {
        /// Directory containing the images
        directory: PathBuf,

        /// Rotation direction
        #[arg(short, long, value_enum, ignore_case = true, default_value = "anticlockwise")]
        direction: Direction,

        /// Write {name}_rotated_{direction}.{ext} instead of replacing the originals
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Build a PDF from images named *_page{N}_*.{ext}
    #[command(name = "create_pdf")]
    CreatePdf {
        /// Directory containing the page images
        directory: PathBuf,

        /// Output PDF path (defaults to {directory}_combined.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resolution used to size pages from image pixels
        #[arg(long, default_value_t = DEFAULT_PAGE_DPI)]
        page_dpi: f32,

        /// Add every image sharing a page number instead of only the first
        #[arg(long)]
        keep_duplicates: bool,
    },

    /// Shrink a PDF by re-rendering every page as a JPEG image
    Compress {
        /// Input PDF file path
        pdf_path: PathBuf,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,

        /// Maximum rendered page width in pixels
        #[arg(long, default_value = "1200", value_parser = clap::value_parser!(u32).range(1..=65535))]
        max_width: u32,

        /// Maximum rendered page height in pixels
        #[arg(long, default_value = "1600", value_parser = clap::value_parser!(u32).range(1..=65535))]
        max_height: u32,

        /// Output PDF path (defaults to {name}_advanced_compressed.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resolution used to size output pages from rendered pixels
        #[arg(long, default_value_t = DEFAULT_PAGE_DPI)]
        page_dpi: f32,

        /// Page renderer
        #[arg(long, value_enum, default_value = "auto")]
        renderer: RendererKind,
    },

    /// Shrink a PDF without touching its content
    #[command(name = "compress_lossless")]
    CompressLossless {
        /// Input PDF file path
        pdf_path: PathBuf,

        /// Optimisation level
        #[arg(short, long, value_enum, default_value = "medium")]
        level: CompressionLevel,

        /// Output PDF path (defaults to {name}_compressed.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
