//! formscan CLI - PDF form extraction tool

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use formscan::{
    DirectorySink, DocumentExtractor, ExtractOptions, JsonFormat, NoOcr, OcrEngine, PdfBackend,
    ReportSink, TesseractConfig, TesseractEngine,
};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "formscan")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract PDF form text, image OCR and checkbox counts to JSON", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    extract: ExtractArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the JSON report and chart
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (default: <stem>_output)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Count checkboxes per page, without OCR
    #[command(alias = "cb")]
    Checkboxes {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Rasterization resolution
        #[arg(long, default_value = "72")]
        dpi: u32,

        /// Print the counts as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Args, Clone)]
struct ExtractArgs {
    /// Output compact JSON
    #[arg(long)]
    compact: bool,

    /// Replace undecodable images with empty OCR text instead of failing
    #[arg(long)]
    lenient: bool,

    /// Process pages one at a time
    #[arg(long)]
    sequential: bool,

    /// Rasterization resolution
    #[arg(long, default_value = "72")]
    dpi: u32,

    /// Path to the tesseract executable
    #[arg(long, env = "TESSERACT_CMD", value_name = "PATH")]
    tesseract: Option<PathBuf>,

    /// OCR language
    #[arg(long, env = "TESSERACT_LANG", default_value = "eng")]
    lang: String,

    /// Skip OCR; embedded images get empty text
    #[arg(long)]
    no_ocr: bool,

    /// Do not write the checkbox chart
    #[arg(long)]
    no_chart: bool,
}

impl ExtractArgs {
    fn options(&self) -> ExtractOptions {
        let mut options = ExtractOptions::new()
            .with_dpi(self.dpi)
            .with_parallel(!self.sequential);
        if self.lenient {
            options = options.lenient();
        }
        options
    }

    fn ocr(&self) -> CliResult<Box<dyn OcrEngine>> {
        if self.no_ocr {
            return Ok(Box::new(NoOcr));
        }

        let mut config = TesseractConfig::default().with_language(&self.lang);
        if let Some(ref command) = self.tesseract {
            config = config.with_command(command.clone());
        }
        let engine = TesseractEngine::new(config);
        let version = engine.check_available()?;
        log::info!("Using {}", version);
        Ok(Box::new(engine))
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Extract {
            input,
            output,
            args,
        }) => cmd_extract(&input, output.as_deref(), &args),
        Some(Commands::Checkboxes { input, dpi, json }) => cmd_checkboxes(&input, dpi, json),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: extract if input is provided
            if let Some(input) = cli.input {
                cmd_extract(&input, cli.output.as_deref(), &cli.extract)
            } else {
                println!("{}", "Usage: formscan <FILE> [OUTPUT]".yellow());
                println!("       formscan --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_extract(input: &Path, output: Option<&Path>, args: &ExtractArgs) -> CliResult {
    let stem = input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(format!("{}_output", stem)));

    let ocr = args.ocr()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Extracting...");

    let progress = pb.clone();
    let options = args.options().on_page(move |done, total| {
        progress.set_length(total as u64);
        progress.set_position(done as u64);
    });
    let extractor = DocumentExtractor::open_with_options(input, options)?;
    pb.set_length(extractor.page_count() as u64);

    let doc = match extractor.extract(ocr.as_ref()) {
        Ok(doc) => doc,
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };
    pb.finish_with_message("Done!");

    let format = if args.compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let mut sink = DirectorySink::new(&output_dir).with_format(format);
    if args.no_chart {
        sink = sink.without_chart();
    }
    let artifacts = sink.write(&stem, &doc)?;

    println!();
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!("{}: {}", "Images".bold(), doc.image_count());
    println!("{}: {}", "Checkboxes".bold(), doc.checkbox_count());

    println!("\n{}", "Output files:".green().bold());
    match artifacts.chart {
        Some(chart) => {
            println!("  {} {}", "├─".dimmed(), artifacts.json.display());
            println!("  {} {}", "└─".dimmed(), chart.display());
        }
        None => println!("  {} {}", "└─".dimmed(), artifacts.json.display()),
    }

    Ok(())
}

fn cmd_checkboxes(input: &Path, dpi: u32, json: bool) -> CliResult {
    let options = ExtractOptions::new().with_dpi(dpi);
    let counts = formscan::count_checkboxes(input, options)?;

    if json {
        println!("{}", serde_json::to_string(&counts)?);
        return Ok(());
    }

    println!("{}", "Checkboxes".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for (i, count) in counts.iter().enumerate() {
        println!("{} {}: {}", "Page".bold(), i + 1, count);
    }
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Total".bold(), counts.iter().sum::<u32>());

    Ok(())
}

fn cmd_info(input: &Path) -> CliResult {
    let extractor = DocumentExtractor::open(input)?;
    let metadata = extractor.metadata();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), metadata.pdf_version);
    println!("{}: {}", "Pages".bold(), metadata.page_count);

    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }
    if let Some(ref producer) = metadata.producer {
        println!("{}: {}", "Producer".bold(), producer);
    }
    if let Some(ref created) = metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }
    if let Some(ref modified) = metadata.modified {
        println!("{}: {}", "Modified".bold(), modified);
    }

    println!();
    println!("{}", "Embedded Images".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let backend = extractor.backend();
    let mut total = 0;
    for page in 1..=backend.page_count() {
        let images = backend.page_images(page)?;
        total += images.len();
        println!("{} {}: {}", "Page".bold(), page, images.len());
    }
    println!("{}: {}", "Total".bold(), total);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "formscan".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF form extraction tool");
    println!();
    println!(
        "OCR: tesseract (default {})",
        TesseractConfig::platform_default().command.display()
    );
    println!("License: MIT");
}
