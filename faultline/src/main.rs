#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod shop;

use args::Args;
use clap::Parser;
use faultline_config::Config;
use faultline_core::{RemoteError, Status};
use faultline_server::Request;
use shop::Shop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load_or_default(&args.config)?;
    if args.debug {
        config.service.debug_mode = true;
    }

    // Initialize telemetry
    faultline_telemetry::init(&config.telemetry)?;

    tracing::info!(
        config_path = %args.config.display(),
        service = %config.service.name,
        scenario = ?args.scenario,
        "starting faultline"
    );

    let shop = Shop::new(&config.service, args.scenario);
    let order = shop::order_for(args.scenario);
    match shop.place_order(Request::new(shop::order_context(), order)).await {
        Ok(response) => {
            tracing::info!(total = response.total, message = %response.message, "order placed");
        }
        Err(status) => {
            let remote = RemoteError::from_tonic(&status);
            shop::log_remote("order failed", &remote, &Status::from(status));
        }
    }

    tracing::info!("faultline stopped");
    Ok(())
}
