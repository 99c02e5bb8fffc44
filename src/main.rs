use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod bulletin;
mod coefficients;
mod db;
mod error;
mod models;
mod render;
mod report;
mod roster;

use coefficients::CoefficientTable;
use error::BulletinError;
use models::{BulletinPage, SchoolIdentity, Term};

#[derive(Parser)]
#[command(name = "scolatek-bulletins")]
#[command(about = "Term grade averages and report-card bulletins for ScolaTek schools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Restrict the selection to this school
    #[arg(long)]
    school: Option<String>,
    /// Every student of this class, ordered by name
    #[arg(long, conflicts_with = "students")]
    class: Option<String>,
    /// Registration id, repeatable; pages follow the order given
    #[arg(long = "student")]
    students: Vec<String>,
    /// Read grades from a CSV file instead of the database
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=2))]
    term: i32,
    /// First-term average to use for every selected student (term 2 only)
    #[arg(long)]
    prior_average: Option<f64>,
    /// JSON coefficient table overriding the standard weights
    #[arg(long)]
    coefficients: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import grades from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print overall averages for the selected students
    Summary {
        #[command(flatten)]
        selection: Selection,
    },
    /// Render one PDF bulletin page per student
    Bulletin {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "bulletins.pdf")]
        out: PathBuf,
    },
    /// Generate a markdown class report
    Report {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

struct Batch {
    school: SchoolIdentity,
    term: Term,
    pages: Vec<BulletinPage>,
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn coefficient_table(selection: &Selection) -> anyhow::Result<CoefficientTable> {
    match &selection.coefficients {
        Some(path) => {
            info!(path = %path.display(), "loading coefficient table");
            CoefficientTable::from_json_file(path)
        }
        None => Ok(CoefficientTable::standard()),
    }
}

fn batch_from_csv(
    csv_path: &std::path::Path,
    selection: &Selection,
    term: Term,
    table: &CoefficientTable,
) -> anyhow::Result<Batch> {
    let roster = roster::load_csv(csv_path)?;
    let selected = roster.select(
        selection.school.as_deref(),
        selection.class.as_deref(),
        &selection.students,
    )?;

    let mut pages = Vec::with_capacity(selected.entries.len());
    for entry in selected.entries {
        let prior = bulletin::resolve_prior_average(
            selection.prior_average,
            term,
            &entry.term1,
            table,
        );
        pages.push(bulletin::build_page(
            entry.student.clone(),
            entry.records(term),
            term,
            prior,
            table,
        )?);
    }

    Ok(Batch {
        school: selected.school,
        term,
        pages,
    })
}

async fn batch_from_db(
    selection: &Selection,
    term: Term,
    table: &CoefficientTable,
) -> anyhow::Result<Batch> {
    let pool = connect().await?;
    let students = db::fetch_students(
        &pool,
        selection.school.as_deref(),
        selection.class.as_deref(),
        &selection.students,
    )
    .await?;
    let school = roster::common_school(students.iter().map(|(school, _)| school.as_str()))?;

    let mut pages = Vec::with_capacity(students.len());
    for (_, student) in students {
        let records = db::fetch_grades(&pool, student.id, term).await?;
        if records.is_empty() {
            warn!(student = %student.registration_id, "no grades recorded for this term");
        }
        let term1 = match (term, selection.prior_average) {
            (Term::Second, None) => db::fetch_grades(&pool, student.id, Term::First).await?,
            _ => Vec::new(),
        };
        let prior = bulletin::resolve_prior_average(selection.prior_average, term, &term1, table);
        pages.push(bulletin::build_page(student, &records, term, prior, table)?);
    }

    Ok(Batch {
        school,
        term,
        pages,
    })
}

async fn load_batch(selection: &Selection) -> anyhow::Result<Batch> {
    let term = Term::try_from(selection.term)?;
    if selection.class.is_none() && selection.students.is_empty() && selection.csv.is_none() {
        return Err(BulletinError::MissingInput("--class, --student or --csv".to_string()).into());
    }
    let table = coefficient_table(selection)?;

    let batch = match &selection.csv {
        Some(path) => batch_from_csv(path, selection, term, &table)?,
        None => batch_from_db(selection, term, &table).await?,
    };
    info!(
        students = batch.pages.len(),
        term = term.number(),
        "computed bulletins"
    );
    Ok(batch)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            info!("schema ready");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            info!("seed data inserted");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            info!(inserted, path = %csv.display(), "imported grades");
        }
        Commands::Summary { selection } => {
            let batch = load_batch(&selection).await?;

            println!("{} ({}):", batch.school.name, batch.term.label());
            for page in &batch.pages {
                print!(
                    "- {} ({}, {}) overall {:.2} ({:.2} over {} coefficients)",
                    page.student.full_name,
                    page.student.registration_id,
                    page.student.class_name,
                    page.summary.overall_average,
                    page.summary.weighted_sum,
                    page.summary.total_coefficients
                );
                match page.summary.annual {
                    Some(annual) => println!(
                        ", annual {:.2} {}",
                        annual.annual_average,
                        annual.status.label()
                    ),
                    None => println!(),
                }
            }
        }
        Commands::Bulletin { selection, out } => {
            let batch = load_batch(&selection).await?;
            let title = format!("Bulletins {} - {}", batch.school.name, batch.term.label());

            let mut canvas = render::PdfCanvas::new(&title)?;
            render::render_bulletins(&mut canvas, &batch.school, &batch.pages, batch.term)?;
            let bytes = canvas.into_bytes()?;
            std::fs::write(&out, bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(pages = batch.pages.len(), path = %out.display(), "bulletins written");
        }
        Commands::Report { selection, out } => {
            let batch = load_batch(&selection).await?;
            let class_label = selection
                .class
                .clone()
                .unwrap_or_else(|| "selected students".to_string());
            let report = report::build_class_report(
                &batch.school,
                &class_label,
                batch.term,
                Utc::now().date_naive(),
                &batch.pages,
            );
            std::fs::write(&out, report)?;
            info!(path = %out.display(), "report written");
        }
    }

    Ok(())
}
