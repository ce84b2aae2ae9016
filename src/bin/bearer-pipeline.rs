use anyhow::{Context, Result};
use bearer_pipeline::credential::token::Credential;
use bearer_pipeline::observability::metrics::get_metrics;
use bearer_pipeline::pipeline::builder::build_pipeline;
use bearer_pipeline::utils::config_loader;
use bearer_pipeline::utils::logging::{self, LogLevel};
use clap::Parser;
use http::Method;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "bearer-pipeline.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// seed the credential store before sending
    #[arg(long, env = "BEARER_TOKEN")]
    token: Option<String>,
    /// JSON request body
    #[arg(long)]
    body: Option<String>,
    /// print prometheus metrics after the request
    #[arg(long)]
    print_metrics: bool,
    method: Method,
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Build store, coordinator and pipeline
    // -------------------------------

    let pipeline = build_pipeline(&service_config)?;
    if let Some(token) = args.token {
        pipeline.coordinator().store().set(Credential::parse(token));
    }

    let body = args
        .body
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--body must be valid JSON")?;

    // -------------------------------
    // 3. Send the request
    // -------------------------------

    info!(method = %args.method, url = %args.url, "sending request");
    let result = pipeline.request(args.method, &args.url, body).await;

    if args.print_metrics || service_config.settings.metrics.is_enabled {
        eprintln!("{}", get_metrics().render());
    }

    match result {
        Ok(response) => {
            let status = response.status();
            let text = response.text().await?;
            println!("{}", status);
            println!("{}", text);
            Ok(())
        }
        Err(err) => {
            error!("request failed: {}", err);
            if let bearer_pipeline::PipelineError::Status { body, .. } = &err {
                println!("{}", body);
            }
            Err(err.into())
        }
    }
}
