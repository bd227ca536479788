use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use dinnerclub::api;
use dinnerclub::backup::BackupClient;
use dinnerclub::club::Club;
use dinnerclub::config::Config;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("invalid configuration")?;

    // Load the snapshot; a malformed one stops startup instead of being overwritten
    let mut club = Club::open(&config)
        .await
        .with_context(|| format!("failed to open snapshot {}", config.snapshot_path.display()))?;
    if let Some(backup) = &config.backup {
        info!(repo = %backup.repo, branch = %backup.branch, "remote backup enabled");
        club = club.with_backup(BackupClient::new(backup.clone())?);
    }
    let club = web::Data::new(Mutex::new(club));

    info!("listening on http://{}", config.addr);
    HttpServer::new(move || {
        App::new()
            .app_data(club.clone())
            .configure(api::configure)
            .service(web::resource("/").route(web::get().to(index)))
    })
    .bind(&config.addr)?
    .run()
    .await?;
    Ok(())
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Welcome to dinnerclub!")
}
