use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod consistency;
mod db;
mod engine;
mod level;
mod matcher;
mod models;
mod report;
mod scale;
mod selector;

#[derive(Parser)]
#[command(name = "honor-engine")]
#[command(about = "Academic honor qualification engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load reference data for all four academic levels
    Seed,
    /// Import raw grades from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Calculate one student's honor qualification
    Calculate {
        #[arg(long)]
        student: String,
        #[arg(long)]
        school_year: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Calculate qualifications for every active student of a level
    CalculateLevel {
        #[arg(long)]
        level: String,
        #[arg(long)]
        school_year: String,
        /// Write retained honors as pending-approval records
        #[arg(long, default_value_t = false)]
        persist: bool,
    },
    /// Generate a markdown honor-roll report for a level
    Report {
        #[arg(long)]
        level: String,
        #[arg(long)]
        school_year: String,
        #[arg(long, default_value = "honor-roll.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} grades from {}.", csv.display());
        }
        Commands::Calculate {
            student,
            school_year,
            json,
        } => {
            let student = db::fetch_student(&pool, &student).await?;
            let level = db::fetch_level_by_id(&pool, student.academic_level_id).await?;
            let result = engine::calculate(&pool, &student, &level, &school_year).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&student, &result);
            }
        }
        Commands::CalculateLevel {
            level,
            school_year,
            persist,
        } => {
            let level = db::fetch_level(&pool, &level).await?;
            let results = engine::calculate_for_level(&pool, &level, &school_year).await?;

            if results.is_empty() {
                println!("No active students for this level.");
                return Ok(());
            }

            let mut persisted = 0usize;
            if persist {
                let snapshot = engine::LevelSnapshot::load(&pool, &level).await?;
                for (student, result) in &results {
                    persisted +=
                        engine::persist_result(&pool, &snapshot, student, &school_year, result)
                            .await?;
                }
            }

            for (student, result) in &results {
                print_result(student, result);
            }
            println!(
                "Calculated {} students ({} qualified).",
                results.len(),
                results.iter().filter(|(_, r)| r.qualified).count()
            );
            if persist {
                println!("Wrote {persisted} pending honor records.");
            }
        }
        Commands::Report {
            level,
            school_year,
            out,
        } => {
            let level = db::fetch_level(&pool, &level).await?;
            let results = engine::calculate_for_level(&pool, &level, &school_year).await?;
            let report = report::build_report(&level, &school_year, &results);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_result(student: &models::Student, result: &models::QualificationResult) {
    if result.qualified {
        let honors: Vec<&str> = result
            .qualifications
            .iter()
            .map(|q| q.honor_type.name.as_str())
            .collect();
        println!(
            "- {} ({}) average {:.2}: {}",
            student.name,
            student.student_number,
            result.average_grade.unwrap_or(0.0),
            honors.join(", ")
        );
    } else {
        println!(
            "- {} ({}) not qualified: {}",
            student.name,
            student.student_number,
            result.reason.as_deref().unwrap_or("no criterion satisfied")
        );
    }
}
