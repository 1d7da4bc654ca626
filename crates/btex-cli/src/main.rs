use anyhow::Context;
use btex_core::{Diagnostic, Options, StructuralDocument};
use btex_syntax::Position;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "btex")]
#[command(about = "Structural checks for btex documents", long_about = None)]
struct Cli {
    /// JSON file with analysis options (camelCase keys)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report unmatched brackets, math delimiters and environments
    Check {
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,
        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dump the structural tokens of a file as JSON
    Tokens {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Only this line (1-based)
        #[arg(long)]
        line: Option<u32>,
    },
    /// Print whether a position is in text or math mode
    Mode {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        line: u32,
        column: u32,
    },
    /// Print the bracket pair around a position
    Highlight {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        line: u32,
        column: u32,
    },
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: &'a Path,
    diagnostics: Vec<Diagnostic>,
}

fn load(path: &Path, options: &Options) -> anyhow::Result<StructuralDocument> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(StructuralDocument::new(&text, options.clone()))
}

fn check(paths: &[PathBuf], json: bool, options: &Options) -> anyhow::Result<bool> {
    let mut reports = Vec::new();
    for path in paths {
        let document = load(path, options)?;
        let diagnostics = document.validate();
        log::debug!("{}: {} diagnostics", path.display(), diagnostics.len());
        reports.push(FileReport { path, diagnostics });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            for d in &report.diagnostics {
                println!(
                    "{}:{}:{}: {}",
                    report.path.display(),
                    d.range.start_line,
                    d.range.start_column,
                    d.message
                );
            }
        }
    }
    Ok(reports.iter().all(|r| r.diagnostics.is_empty()))
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let options = match &cli.config {
        Some(path) => Options::from_file(path)?,
        None => Options::default(),
    };

    match cli.command {
        Commands::Check { paths, json } => return check(&paths, json, &options),
        Commands::Tokens { path, line } => {
            let document = load(&path, &options)?;
            let mut map = document.tokens().to_map();
            if let Some(line) = line {
                map.retain(|l, _| *l == line);
            }
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        Commands::Mode { path, line, column } => {
            let document = load(&path, &options)?;
            println!("{}", document.detect_mode(Position::new(line, column)));
        }
        Commands::Highlight { path, line, column } => {
            let document = load(&path, &options)?;
            match document.highlight(Position::new(line, column)) {
                Some(pair) => println!("{}", serde_json::to_string_pretty(&pair)?),
                None => println!("null"),
            }
        }
    }
    Ok(true)
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
