use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

use jpegthumb_core::JpegImage;

#[derive(Parser)]
#[command(name = "jpegthumb")]
#[command(about = "Make a JPEG thumbnail using scaled decoding", long_about = None)]
#[command(version)]
struct Args {
    /// Input JPEG file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output thumbnail file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Thumbnail width
    #[arg(long, value_name = "PIXELS", default_value_t = 128)]
    width: u32,

    /// Thumbnail height
    #[arg(long, value_name = "PIXELS", default_value_t = 96)]
    height: u32,

    /// JPEG quality (0-100)
    #[arg(long, value_name = "QUALITY", default_value_t = 75)]
    quality: u8,

    /// Comment to store in the thumbnail
    #[arg(long, value_name = "TEXT")]
    comment: Option<String>,

    /// Cut --width x --height at --x, --y out of the full image instead of scaling
    #[arg(long, default_value_t)]
    trim: bool,

    /// Left edge of the trimmed region
    #[arg(
        long,
        value_name = "PIXELS",
        default_value_t = 0,
        requires = "trim",
        allow_hyphen_values = true
    )]
    x: i32,

    /// Top edge of the trimmed region
    #[arg(
        long,
        value_name = "PIXELS",
        default_value_t = 0,
        requires = "trim",
        allow_hyphen_values = true
    )]
    y: i32,

    /// Verbose output
    #[arg(short, long, default_value_t)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose);

    let mut image = match JpegImage::open_file(&args.input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Cannot open {}: {e}", args.input.display());
            std::process::exit(1);
        }
    };

    if let Some(comment) = image.comment() {
        println!("Comment: {comment}");
    }
    if let Some(record) = image.provenance() {
        if let Some(uri) = &record.uri {
            println!("Thumb URI: {uri}");
        }
        if let Some(mtime) = record.mtime {
            println!("Thumb MTime: {mtime}");
        }
        if let Some(mimetype) = &record.mimetype {
            println!("Thumb Mimetype: {mimetype}");
        }
        if let (Some(w), Some(h)) = (record.width, record.height) {
            println!("Thumb Image: {w}x{h}");
        }
    }
    let (width, height) = image.size();
    println!("Image size: {width}x{height}");

    if args.trim {
        image.set_decode_bounds(args.x, args.y, args.width, args.height);
    } else {
        image.set_decode_size(args.width, args.height);
    }
    image.set_quality(args.quality);
    image.set_comment(args.comment.as_deref());
    image.enable_provenance(true);
    image.set_file_output(&args.output);

    if args.trim {
        image
            .trim()
            .with_context(|| format!("Failed to trim {}", args.input.display()))?;
    } else {
        image
            .encode()
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    }
    image.close();

    Ok(())
}
