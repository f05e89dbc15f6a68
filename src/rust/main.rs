use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use mlpipe_dashboard::load::{render_load_report, run_load, LoadPlan, ThinkTime};
use mlpipe_dashboard::render::{
    render_dashboard, render_insights, render_prediction, render_retrain, render_status,
};
use mlpipe_dashboard::{ApiClient, Dashboard, DashboardConfig, Flow, InferenceApi, SelectedFile};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the inference service (overrides MLPIPE_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload an image and print the prediction
    Predict { image: PathBuf },
    /// Upload a ZIP of class subdirectories and retrain the model
    Retrain { archive: PathBuf },
    /// Print dataset insights
    Insights {
        /// Fetch every sample image and mark the ones that fail to load
        #[arg(long)]
        check_images: bool,
    },
    /// Check whether the service is reachable
    Status,
    /// Interactive dashboard session
    Dashboard,
    /// Generate load against the prediction and insights endpoints
    Load {
        /// Image uploaded by every prediction request
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value_t = 4)]
        users: usize,
        #[arg(long, default_value_t = 10)]
        iterations: usize,
        /// Shortest pause between two requests of the same user, in milliseconds
        #[arg(long, default_value_t = 1000)]
        think_min_ms: u64,
        /// Longest pause between two requests of the same user, in milliseconds
        #[arg(long, default_value_t = 3000)]
        think_max_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    mlpipe_dashboard::init_logger();
    let args = Args::parse();

    let config = DashboardConfig::load(args.api_url).context("Failed to resolve configuration")?;
    let client = ApiClient::new(&config)?;

    match args.command {
        Command::Predict { image } => predict(client, image).await,
        Command::Retrain { archive } => retrain(client, archive).await,
        Command::Insights { check_images } => insights(client, check_images).await,
        Command::Status => status(client).await,
        Command::Dashboard => interactive(client).await,
        Command::Load {
            image,
            users,
            iterations,
            think_min_ms,
            think_max_ms,
        } => {
            let think = ThinkTime::between(
                Duration::from_millis(think_min_ms),
                Duration::from_millis(think_max_ms),
            );
            load(client, image, users, iterations, think).await
        }
    }
}

async fn predict(client: ApiClient, image: PathBuf) -> Result<()> {
    let dashboard = Dashboard::new(client);
    dashboard
        .select_file(Flow::Predict, SelectedFile::from_path(&image).await?)
        .await;

    let start = Instant::now();
    match dashboard.submit_predict().await {
        Ok(result) => {
            info!("Prediction took {:.2?}", start.elapsed());
            println!("{}", render_prediction(&result));
            Ok(())
        }
        Err(e) => bail!(e.display_message(Flow::Predict)),
    }
}

async fn retrain(client: ApiClient, archive: PathBuf) -> Result<()> {
    let dashboard = Dashboard::new(client);
    dashboard
        .select_file(Flow::Retrain, SelectedFile::from_path(&archive).await?)
        .await;

    match dashboard.submit_retrain().await {
        Ok(result) => {
            println!("{}", render_retrain(&result));
            dashboard.settle().await;
            let snapshot = dashboard.snapshot().await;
            println!("\n{}", render_insights(&snapshot.base_url, &snapshot.insights, None));
            Ok(())
        }
        Err(e) => bail!(e.display_message(Flow::Retrain)),
    }
}

async fn insights(client: ApiClient, check_images: bool) -> Result<()> {
    let dashboard = Dashboard::open(client).await;
    dashboard.settle().await;

    let snapshot = dashboard.snapshot().await;
    let resolved = if check_images {
        Some(dashboard.resolve_sample_images().await)
    } else {
        None
    };
    println!(
        "{}",
        render_insights(&snapshot.base_url, &snapshot.insights, resolved.as_deref())
    );
    if let Some(error) = snapshot.insights.error {
        bail!(error);
    }
    Ok(())
}

async fn status(client: ApiClient) -> Result<()> {
    let result = client.status().await;
    println!("{}", render_status(client.base_url(), &result));
    result.map(|_| ()).map_err(Into::into)
}

async fn load(
    client: ApiClient,
    image: PathBuf,
    users: usize,
    iterations: usize,
    think_time: ThinkTime,
) -> Result<()> {
    if users == 0 || iterations == 0 {
        bail!("--users and --iterations must both be at least 1");
    }
    let plan = LoadPlan {
        users,
        iterations,
        think_time,
        image: SelectedFile::from_path(&image).await?,
    };
    let report = run_load(Arc::new(client), plan).await;
    println!("{}", render_load_report(&report));
    Ok(())
}

const HELP: &str = "\
Commands:
  select <predict|retrain> <path>   choose a file for a flow
  submit <predict|retrain>          submit the selected file
  predict <path>                    select and submit an image
  retrain <path>                    select and submit a ZIP archive
  insights                          reload dataset insights
  images                            check that sample images load
  show                              print the dashboard
  help                              print this help
  quit                              leave the session";

async fn interactive(client: ApiClient) -> Result<()> {
    let dashboard = Dashboard::open(client).await;
    println!("ML Pipeline Dashboard. Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            ["help"] => println!("{}", HELP),
            ["show"] => println!("{}", render_dashboard(&dashboard.snapshot().await)),
            ["insights"] => {
                let dashboard = dashboard.clone();
                tokio::spawn(async move {
                    let _ = dashboard.load_insights().await;
                    let snapshot = dashboard.snapshot().await;
                    println!("{}", render_insights(&snapshot.base_url, &snapshot.insights, None));
                });
            }
            ["images"] => {
                let resolved = dashboard.resolve_sample_images().await;
                let snapshot = dashboard.snapshot().await;
                println!("{}", render_insights(&snapshot.base_url, &snapshot.insights, Some(resolved.as_slice())));
            }
            ["select", flow, path] => match parse_flow(flow) {
                Some(flow) => {
                    select(&dashboard, flow, path).await;
                }
                None => println!("Unknown flow {:?}", flow),
            },
            ["submit", flow] => match parse_flow(flow) {
                Some(flow) => spawn_submit(&dashboard, flow),
                None => println!("Unknown flow {:?}", flow),
            },
            ["predict", path] => {
                if select(&dashboard, Flow::Predict, path).await {
                    spawn_submit(&dashboard, Flow::Predict);
                }
            }
            ["retrain", path] => {
                if select(&dashboard, Flow::Retrain, path).await {
                    spawn_submit(&dashboard, Flow::Retrain);
                }
            }
            _ => println!("Unrecognised command. Type `help` for commands."),
        }
    }

    dashboard.settle().await;
    Ok(())
}

fn parse_flow(word: &str) -> Option<Flow> {
    match word {
        "predict" => Some(Flow::Predict),
        "retrain" => Some(Flow::Retrain),
        _ => None,
    }
}

async fn select<A: InferenceApi>(dashboard: &Dashboard<A>, flow: Flow, path: &str) -> bool {
    match SelectedFile::from_path(path).await {
        Ok(file) => {
            println!("Selected file: {}", file.name());
            dashboard.select_file(flow, file).await;
            true
        }
        Err(e) => {
            println!("Could not read {}: {}", path, e);
            false
        }
    }
}

fn spawn_submit<A: InferenceApi>(dashboard: &Dashboard<A>, flow: Flow) {
    println!("{}", flow.in_flight_label());
    let dashboard = dashboard.clone();
    tokio::spawn(async move {
        match flow {
            Flow::Predict => match dashboard.submit_predict().await {
                Ok(result) => println!("{}", render_prediction(&result)),
                Err(e) => println!("Error: {}", e.display_message(flow)),
            },
            Flow::Retrain => match dashboard.submit_retrain().await {
                Ok(result) => println!("{}", render_retrain(&result)),
                Err(e) => println!("Error: {}", e.display_message(flow)),
            },
        }
    });
}
