use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_darkmode::{ConversionReport, ConvertError, DarkModeConverter, StyleKey};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdf-darkmode")]
#[command(about = "Convert a PDF into a dark-mode PDF", long_about = None)]
struct Args {
    /// PDF file to convert
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Where to write the dark-mode PDF
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Fallback font for regular text
    #[arg(long, value_name = "FONT")]
    regular: Option<PathBuf>,

    /// Fallback font for bold text
    #[arg(long, value_name = "FONT")]
    bold: Option<PathBuf>,

    /// Fallback font for italic text
    #[arg(long, value_name = "FONT")]
    italic: Option<PathBuf>,

    /// Fallback font for bold italic text
    #[arg(long, value_name = "FONT")]
    bold_italic: Option<PathBuf>,

    /// Password for encrypted PDFs
    #[arg(short, long)]
    password: Option<String>,

    /// Write uncompressed streams
    #[arg(long)]
    no_compress: bool,

    /// Log every path and span decision
    #[arg(short, long)]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

enum Message {
    Progress(u32, u32),
    Done(Result<ConversionReport, ConvertError>),
}

fn main() {
    let args = Args::parse();

    let filter = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let mut builder = DarkModeConverter::builder().compress(!args.no_compress);
    for (style, path) in [
        (StyleKey::Regular, args.regular),
        (StyleKey::Bold, args.bold),
        (StyleKey::Italic, args.italic),
        (StyleKey::BoldItalic, args.bold_italic),
    ] {
        if let Some(path) = path {
            builder = builder.fallback_font(style, path);
        }
    }
    if let Some(password) = args.password {
        builder = builder.password(password);
    }
    let converter = builder.build();

    // Conversion runs on a worker; progress comes back over the channel.
    let (tx, rx) = mpsc::channel();
    let (input, output) = (args.input.clone(), args.output.clone());
    let worker = thread::spawn(move || {
        let progress_tx = tx.clone();
        let result = converter.convert_with_progress(&input, &output, |done, total| {
            let _ = progress_tx.send(Message::Progress(done, total));
        });
        let _ = tx.send(Message::Done(result));
    });

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] page {pos}/{len}") {
        bar.set_style(style.progress_chars("#>-"));
    }

    let mut result = None;
    for message in rx {
        match message {
            Message::Progress(done, total) => {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            }
            Message::Done(r) => result = Some(r),
        }
    }
    bar.finish_and_clear();
    if worker.join().is_err() && result.is_none() {
        eprintln!("Error converting {:?}: worker thread panicked", args.input);
        std::process::exit(1);
    }

    match result {
        Some(Ok(report)) => {
            if !args.quiet {
                println!(
                    "Wrote {:?}: {} pages, {} spans ({} via fallback), {} paths, {} images",
                    args.output,
                    report.pages,
                    report.spans_inserted + report.spans_via_fallback,
                    report.spans_via_fallback,
                    report.paths_redrawn,
                    report.images_copied
                );
                if !report.skipped.is_empty() {
                    println!("Skipped {} items:", report.skipped.len());
                    for item in &report.skipped {
                        println!("  {}", item);
                    }
                }
            }
        }
        Some(Err(e)) => {
            eprintln!("Error converting {:?}: {}", args.input, e);
            std::process::exit(1);
        }
        None => {
            eprintln!("Error converting {:?}: no result", args.input);
            std::process::exit(1);
        }
    }
}
