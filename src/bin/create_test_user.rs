//! Seeds the ledger with a known account for trying the frontend locally.

use potshare::auth::{AuthService, TokenSigner};
use potshare::config::Config;
use potshare::error::LedgerError;
use potshare::open_store;
use tracing_subscriber::EnvFilter;

const USERNAME: &str = "testuser";
const EMAIL: &str = "testuser@example.com";
const PASSWORD: &str = "password123";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let store = open_store(&config).await?;
    let tokens = TokenSigner::new(config.token_secret.clone(), config.token_ttl);
    let auth = AuthService::new(store, tokens, config.bcrypt_cost);

    match auth.register(USERNAME, EMAIL, PASSWORD).await {
        Ok(created) => {
            println!("Test user created");
            println!("  Username: {}", created.user.username);
            println!("  Email:    {EMAIL}");
            println!("  Password: {PASSWORD}");
            Ok(())
        }
        Err(LedgerError::Conflict(reason)) => {
            println!("Test user already exists ({reason})");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
