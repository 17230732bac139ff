//! 配置管理器 - 负责处理不同环境下的配置覆盖
//!
//! 该模块提供了配置管理功能，包括：
//! - 获取当前运行环境
//! - 加载环境特定配置
//! - 合并配置值

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

use super::{DisclosureServiceConfig, FlareAppConfig, PostgresInstanceConfig};

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取当前环境名称
    ///
    /// 从环境变量 FLARE_ENV 获取当前环境名称，
    /// 如果未设置则默认为 "development"
    pub fn get_environment() -> String {
        env::var("FLARE_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    ///
    /// 加载 config/environments/{environment}.toml 文件中的配置，
    /// 并将其合并到基础配置中
    pub fn load_environment_config(base_config: &mut FlareAppConfig) -> Result<()> {
        let env = Self::get_environment();
        let env_config_path = format!("config/environments/{}.toml", env);
        Self::apply_overlay_file(base_config, Path::new(&env_config_path))
    }

    /// 将指定覆盖文件合并到基础配置中（文件不存在时忽略）
    pub fn apply_overlay_file(base_config: &mut FlareAppConfig, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取环境配置文件: {}", path.display()))?;
        let overlay: Value = toml::from_str(&content)
            .with_context(|| format!("无效的环境配置格式: {}", path.display()))?;

        Self::merge_config_values(base_config, &overlay);
        Ok(())
    }

    /// 合并配置值
    ///
    /// 逐个字段覆盖，只处理覆盖文件中出现的字段
    fn merge_config_values(config: &mut FlareAppConfig, overlay: &Value) {
        if let Some(tables) = overlay.get("postgres").and_then(|v| v.as_table()) {
            for (name, value) in tables {
                // 只有当配置包含 url 时才处理
                if let Some(url) = value.get("url").and_then(|v| v.as_str()) {
                    let entry = config
                        .postgres
                        .entry(name.clone())
                        .or_insert_with(PostgresInstanceConfig::default);
                    entry.url = url.to_string();
                    if let Some(max) = value.get("max_connections").and_then(|v| v.as_integer()) {
                        entry.max_connections = u32::try_from(max).ok();
                    }
                    if let Some(min) = value.get("min_connections").and_then(|v| v.as_integer()) {
                        entry.min_connections = u32::try_from(min).ok();
                    }
                }
            }
        }

        if let Some(logging) = overlay.get("logging") {
            if let Some(level) = logging.get("level").and_then(|v| v.as_str()) {
                config.logging.level = level.to_string();
            }
        }

        if let Some(disclosure) = overlay.get("services").and_then(|v| v.get("disclosure")) {
            let service = config
                .services
                .disclosure
                .get_or_insert_with(DisclosureServiceConfig::default);
            if let Some(postgres) = disclosure.get("postgres").and_then(|v| v.as_str()) {
                service.postgres = Some(postgres.to_string());
            }
            if let Some(contacts) = disclosure.get("contacts_postgres").and_then(|v| v.as_str()) {
                service.contacts_postgres = Some(contacts.to_string());
            }
            if let Some(interval) = disclosure
                .get("scheduler_interval_ms")
                .and_then(|v| v.as_integer())
            {
                service.scheduler_interval_ms = u64::try_from(interval).ok();
            }
            if let Some(batch) = disclosure
                .get("scheduler_batch_size")
                .and_then(|v| v.as_integer())
            {
                service.scheduler_batch_size = usize::try_from(batch).ok();
            }
        }
    }
}
