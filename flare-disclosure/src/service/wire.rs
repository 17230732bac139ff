//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建存储、好友关系、领域服务、处理器与调度器

use std::sync::Arc;

use anyhow::{Context, Result};
use flare_im_core::config::FlareAppConfig;
use flare_im_core::metrics::{DisclosureMetrics, RevealSchedulerMetrics};
use tracing::{info, warn};

use crate::application::handlers::{DisclosureCommandHandler, DisclosureQueryHandler};
use crate::config::DisclosureConfig;
use crate::domain::repository::{Clock, ConnectionOracle, MessageStore};
use crate::domain::service::AnonymousMessageDomainService;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::external::{InMemoryConnectionOracle, PostgresConnectionOracle};
use crate::infrastructure::persistence::{InMemoryMessageStore, PostgresMessageStore};
use crate::interface::scheduler::{RevealScheduler, RevealSchedulerConfig};

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub config: Arc<DisclosureConfig>,
    pub command_handler: Arc<DisclosureCommandHandler>,
    pub query_handler: Arc<DisclosureQueryHandler>,
    pub scheduler: Arc<RevealScheduler>,
}

/// 构建应用上下文
pub async fn initialize(app_config: &FlareAppConfig) -> Result<ApplicationContext> {
    // 1. 加载服务配置
    let config = Arc::new(
        DisclosureConfig::from_app_config(app_config)
            .context("Failed to load disclosure service configuration")?,
    );

    // 2. 创建消息存储（未配置 PostgreSQL 时使用内存存储）
    let store: Arc<dyn MessageStore> = match PostgresMessageStore::new(&config).await? {
        Some(store) => {
            info!("Using PostgreSQL message store");
            Arc::new(store)
        }
        None => {
            warn!("PostgreSQL not configured, using in-memory message store");
            Arc::new(InMemoryMessageStore::new())
        }
    };

    // 3. 创建好友关系查询
    let oracle: Arc<dyn ConnectionOracle> = match PostgresConnectionOracle::new(&config).await? {
        Some(oracle) => Arc::new(oracle),
        None => {
            warn!("Contacts database not configured, using in-memory connection oracle");
            Arc::new(InMemoryConnectionOracle::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(build_context(config, store, oracle, clock))
}

/// 使用给定的适配器组装上下文
pub fn build_context(
    config: Arc<DisclosureConfig>,
    store: Arc<dyn MessageStore>,
    oracle: Arc<dyn ConnectionOracle>,
    clock: Arc<dyn Clock>,
) -> ApplicationContext {
    let metrics = Arc::new(DisclosureMetrics::new());

    // 4. 创建领域服务
    let domain_service = Arc::new(AnonymousMessageDomainService::new(
        store.clone(),
        oracle,
        clock.clone(),
    ));

    // 5. 创建命令/查询处理器
    let command_handler = Arc::new(DisclosureCommandHandler::new(
        domain_service.clone(),
        metrics.clone(),
    ));
    let query_handler = Arc::new(DisclosureQueryHandler::new(domain_service, metrics));

    // 6. 创建揭示调度器
    let scheduler = Arc::new(RevealScheduler::new(
        store,
        clock,
        RevealSchedulerConfig::from(config.as_ref()),
        Arc::new(RevealSchedulerMetrics::new()),
    ));

    ApplicationContext {
        config,
        command_handler,
        query_handler,
        scheduler,
    }
}
