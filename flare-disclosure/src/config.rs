use std::env;
use std::time::Duration;

use anyhow::Result;
use flare_im_core::config::FlareAppConfig;

#[derive(Clone, Debug)]
pub struct DisclosureConfig {
    pub service_name: String,
    /// 消息存储 PostgreSQL 地址，未配置时使用内存存储
    pub postgres_url: Option<String>,
    /// 好友关系表所在的 PostgreSQL，未配置时沿用 postgres_url
    pub contacts_postgres_url: Option<String>,
    // PostgreSQL 连接池配置
    pub postgres_max_connections: u32,
    pub postgres_min_connections: u32,
    pub postgres_acquire_timeout_seconds: u64,
    // 揭示调度器配置
    pub scheduler_interval: Duration,
    pub scheduler_batch_size: usize,
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            service_name: "flare-disclosure".to_string(),
            postgres_url: None,
            contacts_postgres_url: None,
            postgres_max_connections: 10,
            postgres_min_connections: 1,
            postgres_acquire_timeout_seconds: 30,
            scheduler_interval: Duration::from_millis(60_000),
            scheduler_batch_size: 500,
        }
    }
}

impl DisclosureConfig {
    /// 从应用配置加载，环境变量优先
    pub fn from_app_config(app: &FlareAppConfig) -> Result<Self> {
        let defaults = Self::default();
        let service_config = app.disclosure_service();

        let service_name = service_config
            .runtime
            .service_name
            .clone()
            .unwrap_or(defaults.service_name);

        // 解析 PostgreSQL 配置引用
        let postgres_profile = service_config
            .postgres
            .as_ref()
            .and_then(|name| app.postgres_profile(name));

        let postgres_url = env::var("DISCLOSURE_POSTGRES_URL")
            .ok()
            .or_else(|| postgres_profile.map(|profile| profile.url.clone()));

        let contacts_postgres_url = env::var("DISCLOSURE_CONTACTS_POSTGRES_URL")
            .ok()
            .or_else(|| {
                service_config
                    .contacts_postgres
                    .as_ref()
                    .and_then(|name| app.postgres_profile(name))
                    .map(|profile| profile.url.clone())
            })
            .or_else(|| postgres_url.clone());

        let postgres_max_connections = env::var("DISCLOSURE_POSTGRES_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .or_else(|| postgres_profile.and_then(|profile| profile.max_connections))
            .unwrap_or(defaults.postgres_max_connections);

        let postgres_min_connections = env::var("DISCLOSURE_POSTGRES_MIN_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .or_else(|| postgres_profile.and_then(|profile| profile.min_connections))
            .unwrap_or(defaults.postgres_min_connections);

        let postgres_acquire_timeout_seconds = env::var("DISCLOSURE_POSTGRES_ACQUIRE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.postgres_acquire_timeout_seconds);

        let scheduler_interval_ms = env::var("DISCLOSURE_SCHEDULER_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(service_config.scheduler_interval_ms)
            .filter(|ms| *ms > 0)
            .unwrap_or(60_000);

        let scheduler_batch_size = env::var("DISCLOSURE_SCHEDULER_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or(service_config.scheduler_batch_size)
            .filter(|size| *size > 0)
            .unwrap_or(defaults.scheduler_batch_size);

        Ok(Self {
            service_name,
            postgres_url,
            contacts_postgres_url,
            postgres_max_connections,
            postgres_min_connections,
            postgres_acquire_timeout_seconds,
            scheduler_interval: Duration::from_millis(scheduler_interval_ms),
            scheduler_batch_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flare_im_core::config::{DisclosureServiceConfig, PostgresInstanceConfig};

    #[test]
    fn test_defaults_without_service_section() {
        let app = FlareAppConfig::default();
        let config = DisclosureConfig::from_app_config(&app).unwrap();
        if env::var("DISCLOSURE_SCHEDULER_BATCH_SIZE").is_err() {
            assert_eq!(config.scheduler_batch_size, 500);
        }
        assert_eq!(config.service_name, "flare-disclosure");
        if env::var("DISCLOSURE_SCHEDULER_INTERVAL_MS").is_err() {
            assert_eq!(config.scheduler_interval, Duration::from_secs(60));
        }
    }

    #[test]
    fn test_profiles_are_resolved_by_name() {
        let mut app = FlareAppConfig::default();
        app.postgres.insert(
            "core".to_string(),
            PostgresInstanceConfig {
                url: "postgres://core/db".to_string(),
                max_connections: Some(32),
                min_connections: None,
            },
        );
        app.services.disclosure = Some(DisclosureServiceConfig {
            postgres: Some("core".to_string()),
            scheduler_batch_size: Some(50),
            ..Default::default()
        });

        let config = DisclosureConfig::from_app_config(&app).unwrap();
        if env::var("DISCLOSURE_POSTGRES_URL").is_err() {
            assert_eq!(config.postgres_url.as_deref(), Some("postgres://core/db"));
        }
        if env::var("DISCLOSURE_CONTACTS_POSTGRES_URL").is_err() {
            assert_eq!(
                config.contacts_postgres_url.as_deref(),
                Some("postgres://core/db")
            );
        }
        if env::var("DISCLOSURE_POSTGRES_MAX_CONNECTIONS").is_err() {
            assert_eq!(config.postgres_max_connections, 32);
        }
        if env::var("DISCLOSURE_SCHEDULER_BATCH_SIZE").is_err() {
            assert_eq!(config.scheduler_batch_size, 50);
        }
    }
}
