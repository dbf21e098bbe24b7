use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub log_level: String,
    pub data_backend: String,
    pub surreal_endpoint: String,
    pub surreal_ns: String,
    pub surreal_db: String,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub redis_url: String,
    pub view_dedup_backend: String,
    pub view_dedup_prefix: String,
    pub view_window_secs: u64,
    pub reconcile_interval_ms: u64,
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("surreal_endpoint", "ws://127.0.0.1:8000")?
            .set_default("surreal_ns", "forum")?
            .set_default("surreal_db", "interactions")?
            .set_default("surreal_user", "root")?
            .set_default("surreal_pass", "root")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("view_dedup_backend", "memory")?
            .set_default("view_dedup_prefix", "forum:views")?
            .set_default("view_window_secs", 300)?
            .set_default("reconcile_interval_ms", 60_000)?
            .set_default("metrics_port", 9100)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn uses_surreal(&self) -> bool {
        self.data_backend.eq_ignore_ascii_case("surreal")
    }

    pub fn uses_redis_view_dedup(&self) -> bool {
        self.view_dedup_backend.eq_ignore_ascii_case("redis")
    }

    pub fn view_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.view_window_secs.max(1))
    }
}
