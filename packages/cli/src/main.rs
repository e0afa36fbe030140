#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the sidewalk measurement pipeline.

mod config;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::PipelineConfig;
use sidewalk_database::{DuckDbStore, MeasurementStore as _, Project};
use sidewalk_geocoder::Geocoder;
use sidewalk_measurement_models::{HazardSummary, PricingModel, Stage};
use sidewalk_pipeline::{ImportSummary, JobDispatcher, NoopDispatcher, Pipeline, QueueDispatcher};

#[derive(Parser)]
#[command(name = "sidewalk", about = "Sidewalk measurement import and reporting tool")]
struct Cli {
    /// TOML file layered over the built-in defaults
    #[arg(long, global = true, env = "SIDEWALK_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding the database (overrides `data_dir` in the config)
    #[arg(long, global = true, env = "SIDEWALK_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a project stage's measurements with a CSV export
    Import {
        /// Project id
        project: i64,
        /// `survey` or `production`
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        /// CSV file to import
        file: PathBuf,
    },
    /// Write a project stage's measurements as CSV
    Export {
        /// Project id
        project: i64,
        /// `survey` or `production`
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a project stage's measurements
    Clear {
        /// Project id
        project: i64,
        /// `survey` or `production`
        #[arg(value_parser = parse_stage)]
        stage: Stage,
    },
    /// List a project stage's measurements as JSON
    List {
        /// Project id
        project: i64,
        /// `survey` or `production`
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        /// Bucket by survey group or work date
        #[arg(long)]
        grouped: bool,
    },
    /// Print the production hazard summary, populating defaults from the
    /// survey on first use
    Hazards {
        /// Project id
        project: i64,
    },
    /// Replace the production hazard summary with a JSON file
    SetHazards {
        /// Project id
        project: i64,
        /// JSON object keyed by tier (`LS`, `S`, `MS`, `TOTALS`)
        file: PathBuf,
    },
    /// Print the estimated sidewalk miles
    Miles {
        /// Project id
        project: i64,
    },
    /// Print the date of the first survey measurement
    SurveyDate {
        /// Project id
        project: i64,
    },
    /// Technician production report over `[start, end]`
    Production {
        /// First day (YYYY-MM-DD)
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        end: NaiveDate,
        /// Comma-separated technicians to include (default: all)
        #[arg(long, value_delimiter = ',')]
        techs: Vec<String>,
        /// Print raw rows as JSON instead of the labeled table
        #[arg(long)]
        json: bool,
    },
    /// Create or update a project
    Project {
        /// Project id
        id: i64,
        /// Display name
        name: String,
        /// `inch_foot` or `square_foot`
        #[arg(long, default_value = "inch_foot", value_parser = parse_pricing_model)]
        pricing_model: PricingModel,
    },
    /// Reverse-geocode a project stage's measurements now
    Geocode {
        /// Project id
        project: i64,
        /// `survey` or `production`
        #[arg(value_parser = parse_stage)]
        stage: Stage,
    },
}

fn parse_stage(raw: &str) -> Result<Stage, String> {
    raw.parse()
        .map_err(|_| format!("unknown stage '{raw}' (expected survey or production)"))
}

fn parse_pricing_model(raw: &str) -> Result<PricingModel, String> {
    raw.parse().map_err(|_| {
        format!("unknown pricing model '{raw}' (expected inch_foot or square_foot)")
    })
}

fn open_pipeline<D: JobDispatcher>(
    config: &PipelineConfig,
    dispatcher: D,
) -> Result<Pipeline<DuckDbStore, D>, Box<dyn std::error::Error>> {
    let path = config.database_path();
    log::debug!("Opening database at {}", path.display());
    let store = DuckDbStore::open(&path)?;
    Ok(Pipeline::new(store, dispatcher).with_max_range_days(config.report.max_range_days))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn summary_lines(stage: Stage, summary: &ImportSummary) -> Vec<String> {
    let mut lines = vec![format!("Imported {} {stage} measurements", summary.replaced)];
    if let Some(miles) = summary.estimated_miles {
        lines.push(format!("Estimated sidewalk miles: {miles:.3}"));
    }
    lines.extend(summary.warnings.iter().map(|warning| format!("Warning: {warning}")));
    lines
}

async fn import(
    config: &PipelineConfig,
    project: i64,
    stage: Stage,
    file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(file)?;

    if !config.geocoding.enabled {
        let pipeline = open_pipeline(config, NoopDispatcher)?;
        let summary = pipeline.import_csv(&bytes, project, stage)?;
        for line in summary_lines(stage, &summary) {
            println!("{line}");
        }
        return Ok(());
    }

    let (dispatcher, mut jobs) = QueueDispatcher::channel();
    let pipeline = open_pipeline(config, dispatcher)?;
    let summary = pipeline.import_csv(&bytes, project, stage)?;
    for line in summary_lines(stage, &summary) {
        println!("{line}");
    }

    let geocoder = Geocoder::from_config(&config.geocoding)?;
    let ran = geocoder.drain(pipeline.store(), &mut jobs).await;
    log::info!("Ran {ran} geocoding job(s)");

    Ok(())
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::Import {
            project,
            stage,
            file,
        } => import(&config, project, stage, &file).await?,
        Commands::Export {
            project,
            stage,
            output,
        } => {
            let bytes = open_pipeline(&config, NoopDispatcher)?.export_csv(project, stage)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)?;
                    log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => {
                    use std::io::Write as _;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
        Commands::Clear { project, stage } => {
            let deleted = open_pipeline(&config, NoopDispatcher)?.clear(project, stage)?;
            println!("Deleted {deleted} {stage} measurements");
        }
        Commands::List {
            project,
            stage,
            grouped,
        } => {
            let pipeline = open_pipeline(&config, NoopDispatcher)?;
            if grouped {
                print_json(&pipeline.grouped_measurements(project, stage)?)?;
            } else {
                print_json(&pipeline.list_measurements(project, stage)?)?;
            }
        }
        Commands::Hazards { project } => {
            let hazards = open_pipeline(&config, NoopDispatcher)?.get_hazard_defaults(project)?;
            print_json(&hazards)?;
        }
        Commands::SetHazards { project, file } => {
            let hazards: HazardSummary = serde_json::from_slice(&std::fs::read(&file)?)?;
            open_pipeline(&config, NoopDispatcher)?.set_hazards(project, &hazards)?;
            println!("Updated hazards for project {project}");
        }
        Commands::Miles { project } => {
            match open_pipeline(&config, NoopDispatcher)?.get_estimated_miles(project)? {
                Some(miles) => println!("{miles:.3}"),
                None => println!("No estimate for project {project}"),
            }
        }
        Commands::SurveyDate { project } => {
            match open_pipeline(&config, NoopDispatcher)?.survey_date(project)? {
                Some(date) => println!("{}", date.format("%-m/%-d/%Y")),
                None => println!("No survey measurements for project {project}"),
            }
        }
        Commands::Production {
            start,
            end,
            techs,
            json,
        } => {
            let pipeline = open_pipeline(&config, NoopDispatcher)?;
            if json {
                print_json(&pipeline.get_tech_production(start, end, &techs)?)?;
            } else {
                let table = pipeline.get_tech_production_table(start, end, &techs)?;
                let Some(first) = table.first() else {
                    println!("No production between {start} and {end}");
                    return Ok(());
                };
                let header: Vec<String> = first.labels().map(|l| format!("{l:<12}")).collect();
                println!("{}", header.join(" "));
                println!("{}", "-".repeat(header.len() * 13));
                for row in &table {
                    let cells: Vec<String> = row
                        .0
                        .iter()
                        .map(|(_, value)| format!("{:<12}", cell(value)))
                        .collect();
                    println!("{}", cells.join(" "));
                }
            }
        }
        Commands::Project {
            id,
            name,
            pricing_model,
        } => {
            let pipeline = open_pipeline(&config, NoopDispatcher)?;
            pipeline.store().upsert_project(&Project {
                id,
                name,
                pricing_model,
            })?;
            println!("Saved project {id} ({pricing_model})");
        }
        Commands::Geocode { project, stage } => {
            let pipeline = open_pipeline(&config, NoopDispatcher)?;
            let geocoder = Geocoder::from_config(&config.geocoding)?;
            let summary = geocoder
                .geocode_project(pipeline.store(), project, stage)
                .await?;
            println!(
                "Resolved {}/{} addresses ({} rows updated)",
                summary.resolved, summary.requested, summary.updated
            );
        }
    }

    Ok(())
}
