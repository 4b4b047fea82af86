// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # UPACP Merchant Node
//!
//! Entry point for the `upacp-node` binary. Parses CLI arguments, initializes
//! logging, loads the merchant's credentials, and runs one of:
//!
//! - `serve`  : notify endpoint with `/health` and `/metrics`
//! - `settle` : download and parse one day's settlement files
//! - `sign`   : sign ad-hoc fields, for debugging integrations
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use upacp_protocol::encoding::{canonical_string, form_body, FieldMap};
use upacp_protocol::{GatewayClient, Signer};

use cli::{Commands, UpacpNodeCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = UpacpNodeCli::parse();
    let format = LogFormat::from_str_lossy(&cli.log_format);

    match cli.command {
        Commands::Serve(args) => serve(args, format).await,
        Commands::Settle(args) => settle(args, format).await,
        Commands::Sign(args) => sign(args, format),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the config file and the signer it points at.
fn load(path: &std::path::Path) -> Result<(NodeConfig, Arc<Signer>)> {
    let config = NodeConfig::load(path)?;
    let signer = Signer::from_config(&config.credentials).with_context(|| {
        format!(
            "failed to load credentials ({}, {})",
            config.credentials.pfx_path.display(),
            config.credentials.x509_path.display()
        )
    })?;
    tracing::info!(
        merchant_id = %config.merchant.merchant_id,
        cert_id = %signer.cert_id(),
        digest = %signer.digest_method(),
        "credentials loaded"
    );
    Ok((config, Arc::new(signer)))
}

/// Serves the notify endpoint until SIGINT/SIGTERM.
async fn serve(args: cli::ServeArgs, format: LogFormat) -> Result<()> {
    logging::init_logging(logging::SERVE_FILTER, format);

    let (config, signer) = load(&args.config.config)?;
    let port = args.port.unwrap_or(config.server.port);
    let notify_path = args.notify_path.unwrap_or(config.server.notify_path);
    anyhow::ensure!(
        notify_path.starts_with('/'),
        "notify path must start with '/', got {:?}",
        notify_path
    );

    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            upacp_protocol::config::PROTOCOL_VERSION,
        ),
        signer,
        metrics: node_metrics,
    };
    let router = api::create_router(app_state, &notify_path);

    let addr = format!("{}:{}", args.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind notify listener on {}", addr))?;
    tracing::info!(notify_path = %notify_path, "notify server listening on {}", addr);

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("notify server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("upacp-node stopped");
    Ok(())
}

/// Fetches one day's settlement files and prints each record as a JSON line.
async fn settle(args: cli::SettleArgs, format: LogFormat) -> Result<()> {
    logging::init_logging(logging::SETTLE_FILTER, format);

    let (config, signer) = load(&args.config.config)?;
    let endpoints = config
        .gateway
        .context("the [gateway] section is required for settle")?;
    let mut settlement = config.settlement;
    if let Some(work_dir) = args.work_dir {
        settlement.work_dir = work_dir;
    }

    let client = GatewayClient::new(signer, config.merchant, endpoints, settlement)?;
    let batch = client
        .fetch_settlement(&args.date)
        .await
        .with_context(|| format!("settlement download for {} failed", args.date))?;

    for record in &batch.records {
        println!("{}", serde_json::to_string(record)?);
    }
    for skipped in &batch.skipped {
        eprintln!(
            "skipped {}:{} ({} bytes)",
            skipped.file, skipped.line, skipped.length
        );
    }
    eprintln!(
        "{} records, {} lines skipped",
        batch.records.len(),
        batch.skipped.len()
    );
    Ok(())
}

/// Signs `key=value` pairs and prints the form body (or canonical string).
fn sign(args: cli::SignArgs, format: LogFormat) -> Result<()> {
    logging::init_logging(logging::SIGN_FILTER, format);

    let (_, signer) = load(&args.config.config)?;
    let mut fields = parse_pairs(&args.fields)?;
    signer.sign(&mut fields).context("signing failed")?;

    if args.canonical {
        let mut unsigned = fields.clone();
        unsigned.remove(upacp_protocol::config::FIELD_SIGNATURE);
        println!("{}", canonical_string(&unsigned));
    } else {
        println!("{}", form_body(&fields));
    }
    Ok(())
}

fn parse_pairs(pairs: &[String]) -> Result<FieldMap> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("expected key=value, got {:?}", pair))
        })
        .collect::<Result<Vec<_>>>()
        .map(FieldMap::from_iter)
}

/// Prints version information to stdout.
fn print_version() {
    println!("upacp-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", upacp_protocol::config::PROTOCOL_VERSION);
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
