use std::env;

const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Root directory of the file store (resumes, avatars)
    pub storage_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
    /// Assistant is disabled when no key is configured
    pub ai_api_key: Option<String>,
    pub ai_api_url: String,
    pub ai_model: String,
    pub ai_cache_ttl_secs: u64,
    /// Allowed CORS origins (empty = permissive in dev mode, none otherwise)
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TEAMBOARD_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let max_upload_bytes: usize = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5 * 1024 * 1024);

        let ai_cache_ttl_secs: u64 = env::var("AI_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "teamboard.db".to_string()),
            storage_path: env::var("STORAGE_PATH").unwrap_or_else(|_| "storage".to_string()),
            base_url,
            dev_mode,
            max_upload_bytes,
            ai_api_key: env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
            ai_api_url: env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_AI_API_URL.to_string()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
            ai_cache_ttl_secs,
            cors_origins,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
