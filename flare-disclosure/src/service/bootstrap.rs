//! # 匿名消息服务启动器
//!
//! 负责依赖注入、启动揭示调度器以及优雅关闭

use anyhow::{Context, Result};
use flare_im_core::config::FlareAppConfig;
use tokio::sync::watch;
use tracing::{error, info};

use super::wire;

/// 应用启动器
pub struct ApplicationBootstrap;

impl ApplicationBootstrap {
    /// 运行应用的主入口点
    pub async fn run(app_config: &FlareAppConfig) -> Result<()> {
        // 使用 Wire 风格的依赖注入构建应用上下文
        let context = wire::initialize(app_config).await?;

        info!(
            service = %context.config.service_name,
            interval_ms = context.config.scheduler_interval.as_millis() as u64,
            batch_size = context.config.scheduler_batch_size,
            "ApplicationBootstrap created successfully"
        );

        Self::run_with_context(context).await
    }

    /// 运行服务（带应用上下文）
    pub async fn run_with_context(context: wire::ApplicationContext) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler_handle = context.scheduler.clone().start(shutdown_rx);

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                info!("shutdown signal received (Ctrl+C)");
            }
            joined = &mut scheduler_handle => {
                error!("Reveal scheduler exited unexpectedly");
                joined.context("Reveal scheduler task panicked")?;
                return Ok(());
            }
        }

        // 通知调度器停止并等待当前调度完成
        let _ = shutdown_tx.send(true);
        if let Err(err) = scheduler_handle.await {
            error!(error = %err, "Reveal scheduler task failed during shutdown");
        }

        let health = context.scheduler.health().await;
        info!(
            ticks_run = health.ticks_run,
            reveals_committed = health.reveals_committed,
            "Disclosure service stopped"
        );
        Ok(())
    }
}
