use anyhow::Context;
use argh::FromArgs;
use chrono::Utc;
use std::path::PathBuf;
use std::thread;
use weathercast::{next_top_of_hour, run_with_retries, Config, RunReport, Runner};

#[derive(FromArgs)]
/// Hourly weather fetch, forecast and archive pipeline
struct Args {
    /// path to the configuration file
    #[argh(option, short = 'c', default = "PathBuf::from(\"weathercast.toml\")")]
    config: PathBuf,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunArgs),
    Schedule(ScheduleArgs),
}

/// Execute exactly one run and exit
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunArgs {}

/// Run at the top of every hour, retrying failed runs
#[derive(FromArgs)]
#[argh(subcommand, name = "schedule")]
struct ScheduleArgs {}

fn main() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();
    if let Err(e) = run(args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;
    let mut runner = Runner::from_config(&config)?;

    match args.command {
        Command::Run(_) => {
            let report = runner.run(Utc::now())?;
            log_report(&report);
        }
        Command::Schedule(_) => loop {
            let next = next_top_of_hour(Utc::now());
            log::info!("Next run at {}", next);
            if let Ok(wait) = (next - Utc::now()).to_std() {
                thread::sleep(wait);
            }

            match run_with_retries(
                &mut runner,
                config.schedule.retries,
                config.schedule.retry_delay(),
                thread::sleep,
                Utc::now,
            ) {
                Ok(report) => log_report(&report),
                Err(e) => log::error!("Giving up on this hour: {}", e),
            }
        },
    }
    Ok(())
}

fn log_report(report: &RunReport) {
    log::info!("Observations: {}", report.observations_key);
    log::info!("Forecast: {}", report.forecast_key);
    log::info!("Chart: {}", report.chart_key);
}
