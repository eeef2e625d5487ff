//! Command-line interface: one subcommand per pipeline stage.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::api::router::create_router;
use crate::bedrock::{BedrockClient, RiskLabeler};
use crate::config::AppConfig;
use crate::dataset::{self, load_records, write_enriched};
use crate::ml::{self, ForestParams, ModelArtifact, TrainOptions};
use crate::services::{enrich, EnrichOptions, Monitor};
use crate::AppState;

#[derive(Debug, Parser)]
#[command(name = "credit-risk", version, about = "Hybrid credit-risk detection: random forest + generative labeling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print an exploratory report of a CSV dataset.
    Profile {
        /// Dataset to profile. Defaults to the original dataset under DATA_DIR.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Label records with Bedrock and write the enriched CSV.
    Enrich(EnrichArgs),
    /// Train and evaluate the random forest, then save the model artifact.
    Train(TrainArgs),
    /// Serve the prediction API.
    Serve {
        /// Model artifact to load. Defaults to MODELS_DIR/MODEL_NAME.json.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Parser, Clone)]
pub struct EnrichArgs {
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Only process the first N records.
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 5)]
    pub batch_size: usize,

    /// Pause after each record, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub pace_ms: u64,
}

#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// Training data. Defaults to the enriched dataset when it exists.
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    pub trees: usize,

    #[arg(long, default_value_t = 10)]
    pub max_depth: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Add the generative confidence as a model feature.
    #[arg(long)]
    pub with_llm_confidence: bool,
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Profile { data } => run_profile(&config, data),
        Command::Enrich(args) => run_enrich(&config, args).await,
        Command::Train(args) => run_train(&config, args),
        Command::Serve { model, port } => run_serve(config, model, port).await,
    }
}

fn run_profile(config: &AppConfig, data: Option<PathBuf>) -> anyhow::Result<()> {
    let path = data.unwrap_or_else(|| config.original_data_file());
    let profile = dataset::profile(&path)?;
    println!("{}", dataset::profile::render_report(&profile));
    Ok(())
}

async fn run_enrich(config: &AppConfig, args: EnrichArgs) -> anyhow::Result<()> {
    let data = args.data.unwrap_or_else(|| config.original_data_file());
    let out = args.out.unwrap_or_else(|| config.enriched_data_file());

    let client = BedrockClient::new(&config.bedrock)
        .context("Bedrock client is required for enrichment")?;
    let dataset = load_records(&data)?;

    let options = EnrichOptions {
        batch_size: args.batch_size,
        pace: Duration::from_millis(args.pace_ms),
        limit: args.limit,
    };
    let rows = enrich(&dataset.records, &client, &options).await;
    write_enriched(&out, &dataset.headers, &rows)?;

    println!("Enriched {} records -> {}", rows.len(), out.display());
    Ok(())
}

fn run_train(config: &AppConfig, args: TrainArgs) -> anyhow::Result<()> {
    let data = args.data.unwrap_or_else(|| {
        let enriched = config.enriched_data_file();
        if enriched.exists() {
            enriched
        } else {
            config.original_data_file()
        }
    });
    let out = args.out.unwrap_or_else(|| config.model_path());

    let dataset = load_records(&data)?;
    let options = TrainOptions {
        forest: ForestParams {
            n_estimators: args.trees,
            max_depth: Some(args.max_depth),
            seed: args.seed,
            ..ForestParams::default()
        },
        test_size: args.test_size,
        include_llm_confidence: args.with_llm_confidence,
        model_name: config.model_name.clone(),
    };

    let artifact = ml::train(&dataset, &options)?;
    artifact.save(&out)?;

    println!("Target: {:?}", artifact.target_source);
    println!(
        "Rows: {} train / {} test",
        artifact.train_rows, artifact.test_rows
    );
    println!("Accuracy: {:.4}\n", artifact.evaluation.accuracy);
    println!("{}", artifact.evaluation.render());
    println!("Feature importances:");
    for (name, importance) in artifact.ranked_importances() {
        println!("  {name:<20} {importance:.4}");
    }
    println!("\nModel saved to {}", out.display());
    Ok(())
}

async fn run_serve(
    mut config: AppConfig,
    model_path: Option<PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }
    let model_path = model_path.unwrap_or_else(|| config.model_path());

    let monitor = Arc::new(
        Monitor::new(&config.logs_dir, config.alerts.clone())
            .with_context(|| format!("creating log dir {}", config.logs_dir.display()))?,
    );
    let metrics_handle = crate::metrics::init_metrics()?;

    let model = match ModelArtifact::load(&model_path) {
        Ok(m) => Some(Arc::new(m)),
        Err(e) => {
            monitor.log_error("MODEL_LOADING", &e.to_string(), None);
            tracing::warn!("Serving without a model; /predict will return 503");
            None
        }
    };

    let labeler: Option<Arc<dyn RiskLabeler>> = match BedrockClient::new(&config.bedrock) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Bedrock client unavailable; /predict will return 503");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        config,
        model,
        labeler,
        monitor,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}
