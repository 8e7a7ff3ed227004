use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenvy::dotenv;
use thiserror::Error;
use walkdir::WalkDir;

use tei_reader_backend::book_structure::{BookBlock, BookIndex, FsXmlSource, DEFAULT_BASE_URL};
use tei_reader_backend::logger;
use tei_reader_backend::{parse_tei_with_settings, ParsedDocument, ParserSettings};

#[derive(Error, Debug)]
enum CliError {
    #[error("{failed} of {total} documents could not be parsed")]
    CheckFailed { failed: usize, total: usize },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

fn load_document(path: &Path, settings: &ParserSettings) -> Result<ParsedDocument> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = parse_tei_with_settings(&xml, settings)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(parsed)
}

fn print_summary(parsed: &ParsedDocument) {
    let m = &parsed.metadata;
    println!("{}", m.title.bold());
    println!("Author: {}", m.author);
    println!("Editor: {}", m.editor);
    if !m.publication_date.is_empty() {
        println!("Date: {}", m.publication_date);
    }
    println!("Mode: {:?}", parsed.mode);
    println!();

    for section in &parsed.sections {
        let flagged = section.verses.iter().filter(|v| v.has_apparatus).count();
        println!(
            "{}  {}  {} verses, {} with variants",
            section.id, section.label, section.verses.len(), flagged
        );
    }

    println!();
    println!("Apparatus entries: {}", parsed.apparatus.len());
    println!("Commentary entries: {}", parsed.commentary.len());
    println!("Fragment links: {}", parsed.fragments.len());
}

fn parse_command(file: &Path, json: bool, pretty: bool, settings: &ParserSettings) -> Result<()> {
    let parsed = load_document(file, settings)?;

    if json {
        let out = if pretty {
            serde_json::to_string_pretty(&parsed)?
        } else {
            serde_json::to_string(&parsed)?
        };
        println!("{}", out);
    } else {
        print_summary(&parsed);
    }

    Ok(())
}

fn sections_command(file: &Path, settings: &ParserSettings) -> Result<()> {
    let parsed = load_document(file, settings)?;
    for section in &parsed.sections {
        println!("{}\t{}\t{}", section.id, section.label, section.verses.len());
    }
    Ok(())
}

fn check_command(dir: &Path, settings: &ParserSettings) -> Result<()> {
    if !dir.is_dir() {
        return Err(CliError::NotADirectory(dir.to_path_buf()).into());
    }

    let mut total = 0;
    let mut failed = 0;

    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("xml") {
            continue;
        }

        total += 1;
        match load_document(path, settings) {
            Ok(parsed) => println!(
                "{} {} ({} sections)",
                "OK".green(),
                path.display(),
                parsed.sections.len()
            ),
            Err(e) => {
                failed += 1;
                println!("{} {}: {:#}", "FAILED".red(), path.display(), e);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::CheckFailed { failed, total }.into());
    }
    println!("{} documents parsed", total);
    Ok(())
}

fn toc_command(manifest: &Path, root: Option<PathBuf>, base_url: &str, settings: &ParserSettings) -> Result<()> {
    let json = fs::read_to_string(manifest)
        .with_context(|| format!("Failed to read {}", manifest.display()))?;
    let blocks = BookBlock::list_from_json(&json)
        .with_context(|| format!("Invalid book structure in {}", manifest.display()))?;

    let root = root.unwrap_or_else(|| manifest.parent().map(Path::to_path_buf).unwrap_or_default());
    let mut index = BookIndex::new(FsXmlSource::new(root), blocks)
        .with_base_url(base_url)
        .with_settings(settings.clone());

    let ids: Vec<(String, String)> = index
        .blocks()
        .iter()
        .map(|b| (b.document_id.clone(), b.display_name().to_string()))
        .collect();

    for (document_id, name) in ids {
        println!("{}", name.bold());
        match index.document(&document_id) {
            Ok(parsed) => {
                for section in &parsed.sections {
                    println!("  {}", section.display_label());
                }
            }
            Err(e) => println!("  {} {}", "unavailable:".red(), e),
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "TEI critical edition reader", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Parser settings JSON file. Defaults are used when not given.
    #[arg(long, global = true, value_name = "FILE", env = "TEI_READER_SETTINGS")]
    settings: Option<PathBuf>,

    /// silent, error, warn, info or debug. Overrides LOG_LEVEL.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a TEI document and print a summary or the full view model
    #[command(arg_required_else_help = true)]
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the parsed document as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Indent the JSON output
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Print the sections of a document, one per line: id, label, verse count
    #[command(arg_required_else_help = true)]
    Sections {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Parse every .xml file under a directory and report failures
    #[command(arg_required_else_help = true)]
    Check {
        #[arg(value_name = "DIRECTORY_PATH")]
        dir: PathBuf,
    },

    /// Print the table of contents of a book from its JSON book structure
    #[command(arg_required_else_help = true)]
    Toc {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Directory the document urls resolve against. Defaults to the manifest's directory.
        #[arg(long, value_name = "DIRECTORY_PATH")]
        root: Option<PathBuf>,

        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },
}

fn main() {
    // TEI_READER_SETTINGS, LOG_LEVEL and RUST_LOG may come from .env
    dotenv().ok();

    let cli = Cli::parse();

    if let Some(level) = &cli.log_level {
        if !logger::set_log_level_str(level) {
            eprintln!("Error: unknown log level '{}'", level);
            exit(1);
        }
    }
    logger::init_tracing();

    let settings = match &cli.settings {
        Some(path) => match ParserSettings::load_from_json(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit(1);
            }
        },
        None => ParserSettings::default(),
    };

    let command_result = match cli.command {
        Commands::Parse { file, json, pretty } => parse_command(&file, json, pretty, &settings),
        Commands::Sections { file } => sections_command(&file, &settings),
        Commands::Check { dir } => check_command(&dir, &settings),
        Commands::Toc { manifest, root, base_url } => toc_command(&manifest, root, &base_url, &settings),
    };

    if let Err(e) = command_result {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}
