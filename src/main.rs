use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::sync::Arc;

use taskhive_identity::auth::{AuthMiddleware, AuthService};
use taskhive_identity::config::Config;
use taskhive_identity::mail::LogMailer;
use taskhive_identity::routes;
use taskhive_identity::store::{MemoryStore, MemoryUserStore, PgUserStore, UserStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .expect("Failed to connect to database");
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            log::warn!("DATABASE_URL not set, using in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Sessions, staged registrations and one-time codes live in the
    // process-local keyed store; swap in a shared backend behind the
    // EphemeralStore trait when running more than one instance.
    let ephemeral = Arc::new(MemoryStore::new());
    let mailer = Arc::new(LogMailer);

    let service = AuthService::new(users, ephemeral, mailer, &config);
    let issuer = service.token_issuer().clone();

    log::info!("Starting TaskHive identity service at {}", config.server_url());
    let bind_addr = (config.server_host.clone(), config.server_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware::new(issuer.clone()))
                    .configure(routes::config),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
