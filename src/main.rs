use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use subscription_billing::billing::{
    self, ApprovingGateway, BillingManager, LogNotifier, NotificationService, PgBillingStore,
    WebhookNotifier,
};
use subscription_billing::BillingConfig;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let config = BillingConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let store = Arc::new(PgBillingStore::new(pool));
    let notifier: Arc<dyn NotificationService> = match &config.webhook {
        Some(webhook) => Arc::new(WebhookNotifier::new(
            webhook.url.clone(),
            webhook.secret.clone(),
        )?),
        None => Arc::new(LogNotifier),
    };

    let manager = Arc::new(BillingManager::new(
        store,
        Arc::new(ApprovingGateway),
        notifier,
        config.manager_settings(),
    ));

    info!(
        currency = config.currency.code(),
        locale = config.currency.locale(),
        interval_secs = config.scan_interval.as_secs(),
        run_once = config.run_once,
        "subscription billing starting"
    );

    if config.run_once {
        billing::run_billing_tick(&manager, Utc::now()).await?;
        return Ok(());
    }

    let scheduler = billing::spawn_billing_scheduler(manager, config.scan_interval);
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, stopping billing scheduler");
    scheduler.abort();
    Ok(())
}
