use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use secompair::{
    export_filename, import_csv_file, AppConfig, CsvFactsSource, FactsSource, LoadOutcome,
    Session, YearRange,
};

#[derive(Parser)]
#[command(name = "secompair", version, about = "Compare quarterly filing facts across companies")]
struct Cli {
    /// TOML config file (defaults to $SECOMPAIR_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    load: LoadArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct LoadArgs {
    /// Raw facts CSV (flattened company facts); falls back to source.facts_csv
    #[arg(long, global = true)]
    facts: Option<PathBuf>,

    /// Company to fetch from --facts, by display name (repeatable; default: all)
    #[arg(long = "company", global = true)]
    companies: Vec<String>,

    /// CSV exported by a previous run
    #[arg(long, global = true)]
    import: Option<PathBuf>,

    /// Seed for color assignment
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// List the entities available in --facts
    Entities,

    /// Show labels comparable across all loaded entities
    Labels,

    /// Per-entity means of X and Y over a year range, with X/Y ratio
    Compare {
        #[arg(long)]
        x: Option<String>,
        #[arg(long)]
        y: Option<String>,
        #[arg(long)]
        from: Option<i32>,
        #[arg(long)]
        to: Option<i32>,
    },

    /// Full history of one label for an entity, optionally against another
    Series {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        vs: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },

    /// Write the working dataset as CSV
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    secompair::init_tracing("secompair=info");

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let mut load = cli.load;
    if load.facts.is_none() {
        load.facts = config.source.facts_csv.clone();
    }

    match cli.command {
        Command::Entities => run_entities(&load),
        Command::Labels => run_labels(&load, cli.json),
        Command::Compare { x, y, from, to } => {
            let x = x.unwrap_or_else(|| config.comparison.default_x_label.clone());
            let y = y.unwrap_or_else(|| config.comparison.default_y_label.clone());
            run_compare(&load, &x, &y, from, to, cli.json)
        }
        Command::Series { entity, vs, label } => {
            let label = label.unwrap_or_else(|| config.comparison.default_x_label.clone());
            run_series(&load, &entity, vs.as_deref(), &label, cli.json)
        }
        Command::Export { out } => run_export(&load, &config, out),
    }
}

// Load progress goes to stderr; stdout carries only the command's result
fn load_session(args: &LoadArgs) -> Result<Session> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut import_rejected = 0;
    let imported = match &args.import {
        Some(path) => {
            eprintln!("📂 Importing {}...", path.display());
            let report = import_csv_file(path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            import_rejected = report.rejected.len();
            eprintln!("✓ Imported {} rows", report.facts.len());
            Some(report.facts)
        }
        None => None,
    };

    let mut session = Session::new();
    let outcome = match &args.facts {
        Some(path) => {
            let source = CsvFactsSource::new(path);
            let companies = if args.companies.is_empty() {
                source
                    .list_entities()?
                    .into_iter()
                    .map(|e| e.display_name)
                    .collect()
            } else {
                args.companies.clone()
            };
            eprintln!("🌐 Fetching {} companies from {}...", companies.len(), path.display());
            session.load_from_source(&source, &companies, imported, &mut rng)?
        }
        None => session.load(None, imported, &mut rng)?,
    };

    match outcome.with_import_rejections(import_rejected) {
        LoadOutcome::Replaced(summary) => {
            eprintln!(
                "✓ Working dataset: {} rows, {} entities",
                summary.rows, summary.entities
            );
            if let Some(stats) = summary.normalization {
                eprintln!(
                    "  normalization: {} kept, {} rejected, {} without frame, {} non-quarterly",
                    stats.kept, stats.rejected, stats.dropped_without_frame, stats.dropped_non_quarterly
                );
            }
            if summary.import_rejected > 0 {
                eprintln!("⚠️  import: {} rows rejected", summary.import_rejected);
            }
            if summary.merge.overlapping_rows > 0 {
                eprintln!(
                    "⚠️  {} imported rows repeat fetched periods (kept, not deduplicated)",
                    summary.merge.overlapping_rows
                );
            }
        }
        LoadOutcome::NothingToApply => {
            bail!("Nothing to load: pass --facts and/or --import");
        }
    }

    Ok(session)
}

fn run_entities(args: &LoadArgs) -> Result<()> {
    let Some(path) = &args.facts else {
        bail!("--facts is required to list entities");
    };

    let entities = CsvFactsSource::new(path).list_entities()?;
    println!("🏢 {} entities in {}", entities.len(), path.display());
    for entity in entities {
        println!("  {:<12} {}", entity.id, entity.display_name);
    }
    Ok(())
}

fn run_labels(args: &LoadArgs, json: bool) -> Result<()> {
    let session = load_session(args)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.derived())?);
        return Ok(());
    }

    if let Some(years) = session.year_bounds() {
        println!("\n📅 Years: {} - {}", years.low, years.high);
    }

    println!("\n🎨 Colors");
    for (entity, color) in session.colors().iter() {
        println!("  {:<40} {} ({})", entity, color.hex, color.name);
    }

    let labels = session.comparable_labels();
    println!("\n🔗 {} labels comparable across all entities", labels.len());
    for label in labels.iter() {
        println!("  {}", label);
    }
    Ok(())
}

fn run_compare(
    args: &LoadArgs,
    x: &str,
    y: &str,
    from: Option<i32>,
    to: Option<i32>,
    json: bool,
) -> Result<()> {
    let session = load_session(args)?;

    let years = YearRange::from_bounds(from, to, session.year_bounds());

    if !session.comparable_labels().contains(x) || !session.comparable_labels().contains(y) {
        eprintln!("⚠️  {} / {} is not reported by every entity", x, y);
    }

    let rows = session.compare(x, y, years)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("\n📊 {} / {}", x, y);
    println!("{:<40} {:>20} {:>20} {:>12}", "Entity", x, y, "Ratio");
    for row in rows {
        println!(
            "{:<40} {:>20.2} {:>20.2} {:>12}",
            row.entity, row.x_value, row.y_value, row.ratio
        );
    }
    Ok(())
}

fn run_series(args: &LoadArgs, entity: &str, vs: Option<&str>, label: &str, json: bool) -> Result<()> {
    let session = load_session(args)?;
    let slice = session.time_series(entity, vs, label)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&slice)?);
        return Ok(());
    }

    println!("\n📈 {}", slice.title);
    for point in &slice.points {
        println!("  {}  {:<40} {:>20.2}", point.end, point.entity, point.value);
    }
    Ok(())
}

fn run_export(args: &LoadArgs, config: &AppConfig, out: Option<PathBuf>) -> Result<()> {
    let session = load_session(args)?;
    let Some(dataset) = session.dataset() else {
        bail!("No working dataset to export");
    };

    let path = out.unwrap_or_else(|| {
        PathBuf::from(export_filename(
            &config.export.filename_prefix,
            &config.export.timestamp_format,
            &Local::now(),
        ))
    });

    dataset.export_csv(&path)?;
    println!("💾 Exported {} rows to {}", dataset.len(), path.display());
    Ok(())
}
