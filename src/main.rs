// Entrypoint for the prediction demo.
// - Keeps `main` small: load config, resolve the deployment once, and hand
//   it to the UI loop by reference.
// - Returns `anyhow::Result` so startup failures print and exit non-zero.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use predict_demo_cli::api::ApiClient;
use predict_demo_cli::config::Config;
use predict_demo_cli::ui::{self, FilePicker, ViewOptions};

/// Interactive predictions against a deployed model, from a CSV upload or
/// typed feature values.
#[derive(Parser, Debug)]
#[command(name = "predict-demo", version, about, long_about = None)]
struct Cli {
    /// Secrets file with DR_API_TOKEN, DR_API_URL and DEPLOYMENT_ID
    #[arg(long, value_name = "PATH")]
    secrets: Option<PathBuf>,

    /// Feature name for manual entry (repeatable); defaults to the deployment's features
    #[arg(long = "feature", value_name = "NAME")]
    features: Vec<String>,

    /// Rows shown in the upload preview
    #[arg(long, default_value_t = 5)]
    preview_rows: usize,

    /// Choose the CSV with a native file dialog (needs the `native-dialog` feature)
    #[arg(long)]
    pick_file: bool,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr and stay quiet unless RUST_LOG asks for more.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("predict_demo_cli=warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.secrets.as_deref()).context("failed to load configuration")?;
    let client = ApiClient::new(&config).context("failed to build API client")?;
    let deployment = client
        .get_deployment(&config.deployment_id)
        .with_context(|| format!("failed to resolve deployment {}", config.deployment_id))?;

    let feature_names = ui::manual_feature_names(&cli.features, || deployment.features());
    info!(features = ?feature_names, "manual entry features");

    let picker = if cli.pick_file && ui::native_dialog_available() {
        FilePicker::Native
    } else {
        if cli.pick_file {
            warn!("built without the `native-dialog` feature, prompting for a path instead");
        }
        FilePicker::Prompt
    };
    let options = ViewOptions {
        preview_rows: cli.preview_rows,
        show_progress: true,
    };

    ui::main_menu(&deployment, feature_names, options, picker)?;
    Ok(())
}
