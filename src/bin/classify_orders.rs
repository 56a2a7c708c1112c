//! Batch classifier for exported service orders.
//!
//! Reads a JSON array of order rows (file or stdin), classifies each row's
//! `defect_text` and writes the enriched array (stdout or file). With
//! `--reclassify` the input is treated as already-classified rows and only
//! rows still Unclassified are redone (all of them with `--force`).

use anyhow::{Context, Result};
use clap::Parser;
use defect_classifier::config::Settings;
use defect_classifier::orders::{self, ClassifiedOrder, OrderRow};
use defect_classifier::Classifier;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "classify_orders", about = "Classify defect texts of service-order rows")]
struct Args {
    /// Input JSON file (array of rows); stdin when omitted
    input: Option<PathBuf>,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Taxonomy TOML (defaults to $TAXONOMY_CONFIG_PATH, then the built-in table)
    #[arg(long, env = "TAXONOMY_CONFIG_PATH")]
    taxonomy: Option<PathBuf>,

    /// Input rows are already classified; redo only those still Unclassified
    #[arg(long)]
    reclassify: bool,

    /// With --reclassify, redo every row
    #[arg(long, requires = "reclassify")]
    force: bool,

    /// Print the batch report as JSON on stderr
    #[arg(long)]
    report: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let settings = Settings {
        taxonomy_path: args.taxonomy.clone(),
        ..Settings::from_env()
    };
    let classifier = Classifier::new(settings.taxonomy()?);

    let raw = match &args.input {
        Some(p) => {
            fs::read_to_string(p).with_context(|| format!("reading rows from {}", p.display()))?
        }
        None => {
            let mut s = String::new();
            io::stdin()
                .read_to_string(&mut s)
                .context("reading rows from stdin")?;
            s
        }
    };

    let batch = if args.reclassify {
        let rows: Vec<ClassifiedOrder> =
            serde_json::from_str(&raw).context("parsing classified order rows")?;
        orders::reclassify_orders(&classifier, rows, args.force)
    } else {
        let rows: Vec<OrderRow> = serde_json::from_str(&raw).context("parsing order rows")?;
        orders::classify_orders(&classifier, rows)
    };

    let out = serde_json::to_string_pretty(&batch.orders)?;
    match &args.output {
        Some(p) => {
            fs::write(p, out).with_context(|| format!("writing {}", p.display()))?;
            info!(path = %p.display(), rows = batch.orders.len(), "classified rows written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(out.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    if args.report {
        eprintln!("{}", serde_json::to_string_pretty(&batch.report)?);
    }

    Ok(())
}
