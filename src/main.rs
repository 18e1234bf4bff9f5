use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use turnero::{
    clock::BusinessClock,
    config::Settings,
    db::{self, Store},
    notify::{LogNotifier, MailRelayNotifier, Notifier},
    routes,
    state::AppState,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        log::error!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let settings = Settings::from_env()?;

    let pool = db::connect(&settings.database_url).await?;
    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool).await?;

    let notifier: Arc<dyn Notifier> = match &settings.mail_relay_url {
        Some(url) => {
            log::info!("Sending booking emails through {url}");
            Arc::new(MailRelayNotifier::new(url.clone())?)
        }
        None => {
            log::warn!("MAIL_RELAY_URL not set. Booking emails will only be logged.");
            Arc::new(LogNotifier)
        }
    };

    let state = AppState::new(
        Store::new(pool, settings.store_timeout),
        Arc::new(BusinessClock::new(settings.timezone)),
        notifier,
    );

    let address = format!("0.0.0.0:{}", settings.port);
    log::info!(
        "Starting Turnero on http://{address} (business timezone {})",
        settings.timezone
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::public::configure)
            .configure(routes::admin::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
