pub mod adapters;
pub mod cli;
pub mod config;
pub mod directory;
pub mod fulfillment;
pub mod infra;
pub mod marketplace;

pub mod features {
    pub mod stars_order;
}

pub use cli::Args as cli_args;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    adapters::{HttpDirectory, HttpMarketplace},
    config::Settings,
    directory::spawn_lookup_worker,
    features::stars_order::{
        Services, dispatcher::Dispatcher, handlers::refund::FailureRecovery,
        validator::IdentifierValidator,
    },
    fulfillment::{ApiCredentials, FulfillmentClient, TokenManager, spawn_refresher},
    infra::{shutdown::shutdown_signal, task::TaskHandle},
    marketplace::Marketplace,
};

pub async fn run_courier(settings: &Settings) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .build()
        .context("build HTTP client")?;

    let market: Arc<dyn Marketplace> = Arc::new(HttpMarketplace::new(
        http.clone(),
        &settings.marketplace_url,
        &settings.marketplace_token,
    ));

    let seller = market
        .whoami()
        .await
        .context("authorize marketplace session")?;
    info!(seller_id = seller.id, username = %seller.username, "Authorized on the marketplace");
    info!(
        auto_refund = settings.auto_refund,
        auto_deactivate = settings.auto_deactivate,
        category_id = settings.category_id,
        deactivate_category_id = settings.deactivate_category(),
        "Settings"
    );

    let tokens = Arc::new(TokenManager::new(
        http.clone(),
        &settings.api_base,
        ApiCredentials {
            username: settings.api_user.clone(),
            password: settings.api_pass.clone(),
        },
    ));
    if let Err(err) = tokens.ensure_token().await {
        warn!("Initial fulfillment API token fetch failed, will retry on demand: {err}");
    }
    let refresher = spawn_refresher(Arc::clone(&tokens), settings.token_refresh_interval());

    let lookup = spawn_lookup_worker(HttpDirectory::new(
        http.clone(),
        &settings.directory_url,
        settings.directory_token.clone(),
    ));

    let services = Services {
        market: Arc::clone(&market),
        validator: IdentifierValidator::new(lookup, settings.lookup_timeout()),
        fulfillment: FulfillmentClient::new(http, &settings.api_base, tokens),
        recovery: FailureRecovery {
            auto_refund: settings.auto_refund,
            auto_deactivate: settings.auto_deactivate,
            deactivate_category_id: settings.deactivate_category(),
            deactivate_delay: settings.deactivate_delay(),
        },
        category_id: settings.category_id,
    };
    let dispatcher = Dispatcher::new(
        services,
        seller.id,
        settings.cooldown(),
        settings.poll_interval(),
        settings.backoff.clone(),
    );

    info!("Stars courier started, waiting for events");
    let handle = TaskHandle::spawn(move |stop_rx| dispatcher.run(stop_rx));
    let stop_handle = handle.clone();
    let mut stopped = std::pin::pin!(handle.stopped());

    let signalled = tokio::select! {
        _ = shutdown_signal() => true,
        _ = &mut stopped => false,
    };
    if signalled {
        info!("Shutting down…");
        stop_handle.stop();
        stopped.await;
    } else {
        warn!("Event dispatcher exited on its own");
    }

    refresher.stop();
    refresher.stopped().await;

    Ok(())
}
