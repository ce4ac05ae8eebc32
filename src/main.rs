use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use potshare::auth::{AuthService, TokenSigner};
use potshare::config::Config;
use potshare::expenses::ExpenseService;
use potshare::{api, open_store};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let store = open_store(&config).await.map_err(std::io::Error::other)?;

    let tokens = TokenSigner::new(config.token_secret.clone(), config.token_ttl);
    let auth = web::Data::new(AuthService::new(store.clone(), tokens, config.bcrypt_cost));
    let expenses = web::Data::new(ExpenseService::new(store));
    let origin = config.frontend_origin.clone();

    info!(addr = %config.bind_addr, frontend = %origin, "starting PotShare");
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&origin)
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(3600);
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(auth.clone())
            .app_data(expenses.clone())
            .configure(api::configure)
    })
    .bind(config.bind_addr)?
    .run()
    .await
}
