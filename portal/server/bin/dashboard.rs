use clap::Parser;
use portal_api::types::{AdminStats, StudentStats, Tables};
use portal_server::{
    app_config::init_console_subscriber,
    dashboard::{run, SourceConfig},
};
use serde::Serialize;
use tracing::debug;
use workstudy::projection::DEFAULT_HOURLY_RATE;

#[derive(Clone, Parser, Serialize)]
struct StudentConfig {
    #[clap(flatten)]
    source: SourceConfig,

    #[arg(long, env = "STUDENT_ID", default_value = "u-student")]
    student_id: String,

    #[arg(long, env = "HOURLY_RATE", default_value_t = DEFAULT_HOURLY_RATE)]
    hourly_rate: f64,
}

#[derive(Clone, Parser, Serialize)]
struct AdminConfig {
    #[clap(flatten)]
    source: SourceConfig,
}

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
enum Command {
    Student(StudentConfig),
    Admin(AdminConfig),
}

fn print<P: Serialize>(stats: &P) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_console_subscriber();
    match Command::parse() {
        Command::Student(cfg) => {
            debug!("{}", serde_json::to_string_pretty(&cfg)?);
            let StudentConfig {
                source,
                student_id,
                hourly_rate,
            } = cfg;
            let compute = move |tables: &Tables| {
                StudentStats::compute(tables, &student_id, hourly_rate)
            };
            run(
                &source,
                &StudentStats::TABLES,
                compute,
                print::<StudentStats>,
                ctrl_c(),
            )
            .await
        }
        Command::Admin(cfg) => {
            debug!("{}", serde_json::to_string_pretty(&cfg)?);
            run(
                &cfg.source,
                &AdminStats::TABLES,
                AdminStats::compute,
                print::<AdminStats>,
                ctrl_c(),
            )
            .await
        }
    }
}
