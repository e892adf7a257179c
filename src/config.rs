use std::{env, path::PathBuf};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// TrueType font used for shopping list bodies; must cover Cyrillic.
    pub font_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let font_path = env::var("FONT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("assets/fonts/body.ttf"));
        Ok(Self {
            port,
            database_url,
            host,
            font_path,
        })
    }
}
