//! Settings read from the environment at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::Duration;
use thiserror::Error;

const DEFAULT_DATABASE: &str = "PotShare";
const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5000);
const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const MIN_SECRET_LEN: usize = 32;

/// Cost bounds accepted by bcrypt.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("You need to add the {0} to the env")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo { uri: String, database: String },
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreBackend,
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub bind_addr: SocketAddr,
    pub frontend_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match lookup("POTSHARE_STORE").as_deref().unwrap_or("mongo") {
            "mongo" => StoreBackend::Mongo {
                uri: lookup("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
                database: lookup("POTSHARE_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "POTSHARE_STORE",
                    reason: format!("expected `mongo` or `memory`, got `{other}`"),
                })
            }
        };

        let token_secret = lookup("TOKEN_SECRET").ok_or(ConfigError::Missing("TOKEN_SECRET"))?;
        if token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "TOKEN_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let ttl_hours = parse_or(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_HOURS",
                reason: "must be positive".into(),
            });
        }

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                reason: format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
            });
        }

        Ok(Config {
            store,
            token_secret: token_secret.into_bytes(),
            token_ttl: Duration::hours(ttl_hours),
            bcrypt_cost,
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?,
            frontend_origin: lookup("FRONTEND_ORIGIN")
                .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGIN.to_string()),
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}
