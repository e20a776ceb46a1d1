use std::env;

use crate::lifecycle::StateModel;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub state_model: StateModel,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3001);
        let state_model = match env::var("BOOKING_STATE_MODEL") {
            Ok(raw) => StateModel::parse(&raw).ok_or_else(|| {
                anyhow::anyhow!("BOOKING_STATE_MODEL must be 'five_state' or 'four_state'")
            })?,
            Err(_) => StateModel::FiveState,
        };
        Ok(Self {
            database_url,
            host,
            port,
            state_model,
        })
    }
}
