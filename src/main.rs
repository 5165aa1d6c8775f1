mod config;
mod scrape;
mod server;
mod storage;

use config::Config;
use scrape::ScrapeService;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;

    // the read service stays up whether or not extraction succeeds
    let server_cfg = cfg.clone();
    let server_task = tokio::spawn(async move { server::serve(server_cfg).await });

    let service = ScrapeService::new(cfg);
    if let Err(error) = service.run().await {
        error!(error = %format!("{error:#}"), "scrape run failed");
    }

    server_task.await??;
    Ok(())
}
