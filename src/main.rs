use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod aggregate;
mod db;
mod export;
mod models;
mod scope;
mod stats;
mod taxonomy;

use aggregate::Aggregator;
use models::{AccessScope, FilterSelection, RawFilters, ReportDataset, Viewer, ViewerRole};

#[derive(Parser)]
#[command(name = "competency-report-engine")]
#[command(about = "Reporting and analytics engine for competency self-assessments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Advisor,
    Student,
}

#[derive(Args)]
struct ViewerArgs {
    /// Viewer role used to derive the access scope
    #[arg(long, value_enum, default_value_t = RoleArg::Admin)]
    role: RoleArg,
    /// Advisor or student id of the viewer, where the role needs one
    #[arg(long)]
    viewer_id: Option<i64>,
    /// Restrict an advisor viewer to their own advisees
    #[arg(long, default_value_t = false)]
    own_advisees: bool,
    /// Viewer time zone as minutes east of UTC
    #[arg(long, default_value_t = 0)]
    utc_offset: i32,
}

impl ViewerArgs {
    fn to_viewer(&self) -> Viewer {
        Viewer {
            role: match self.role {
                RoleArg::Admin => ViewerRole::Admin,
                RoleArg::Advisor => ViewerRole::Advisor,
                RoleArg::Student => ViewerRole::Student,
            },
            id: self.viewer_id,
            own_advisees_only: self.own_advisees,
            utc_offset_minutes: self.utc_offset,
        }
    }
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    track: Option<String>,
    #[arg(long)]
    semester: Option<String>,
    #[arg(long)]
    survey: Option<String>,
    /// Category id or report domain slug
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    student: Option<String>,
    #[arg(long)]
    advisor: Option<String>,
    #[arg(long)]
    competency: Option<String>,
}

impl FilterArgs {
    fn to_raw(&self) -> RawFilters {
        RawFilters {
            track: self.track.clone(),
            semester: self.semester.clone(),
            survey: self.survey.clone(),
            category: self.category.clone(),
            student: self.student.clone(),
            advisor: self.advisor.clone(),
            competency: self.competency.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Show the viewer's available filter options
    FilterOptions {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Overall benchmark cards and monthly trend
    Benchmark {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Per-domain competency rollup
    Summary {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Per-competency detail across the fixed taxonomy
    Detail {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Per-track rollup
    Tracks {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Per-survey rollup
    Courses {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Write the full export bundle
    Export {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.json")]
        out: PathBuf,
        /// Also write the competency detail table as CSV
        #[arg(long)]
        detail_csv: Option<PathBuf>,
        /// Also write the track rollup as CSV
        #[arg(long)]
        tracks_csv: Option<PathBuf>,
    },
}

struct ReportContext {
    dataset: ReportDataset,
    filters: FilterSelection,
    viewer: Viewer,
}

async fn load(
    pool: &PgPool,
    viewer_args: &ViewerArgs,
    filter_args: &FilterArgs,
) -> anyhow::Result<ReportContext> {
    let viewer = viewer_args.to_viewer();
    let (students, advisors) = db::fetch_roster(pool).await?;
    let categories = db::fetch_categories(pool).await?;
    let access = AccessScope::resolve(&viewer, &students, &advisors);
    let filters = FilterSelection::resolve(&filter_args.to_raw(), &access, &categories);
    let dataset = db::fetch_dataset(pool, &access, students, advisors, categories).await?;
    Ok(ReportContext { dataset, filters, viewer })
}

fn print_json<T: Serialize>(payload: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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
        Commands::FilterOptions { viewer, filters } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            print_json(&agg.filter_options())?;
        }
        Commands::Benchmark { viewer, filters } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            print_json(&agg.benchmark())?;
        }
        Commands::Summary { viewer, filters } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            print_json(&agg.competency_summary())?;
        }
        Commands::Detail { viewer, filters } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            print_json(&agg.competency_detail())?;
        }
        Commands::Tracks { viewer, filters } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            print_json(&agg.track_summary())?;
        }
        Commands::Courses { viewer, filters } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            print_json(&agg.course_summary())?;
        }
        Commands::Export { viewer, filters, out, detail_csv, tracks_csv } => {
            let ctx = load(&pool, &viewer, &filters).await?;
            let agg = Aggregator::new(&ctx.dataset, &ctx.filters, Utc::now(), ctx.viewer.utc_offset_minutes);
            let payload = agg.export_payload();
            export::write_json(&payload, &out)?;
            println!("Report written to {}.", out.display());

            if let Some(path) = detail_csv {
                std::fs::write(&path, export::detail_csv(&payload.competency_detail)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Competency detail written to {}.", path.display());
            }
            if let Some(path) = tracks_csv {
                std::fs::write(&path, export::track_csv(&payload.track_summary)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Track rollup written to {}.", path.display());
            }
        }
    }

    Ok(())
}
