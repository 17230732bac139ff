//! 身份揭示调度器
//!
//! 周期性扫描已到期的匿名消息并提交揭示。每次提交都是一次带
//! `sender_revealed_at IS NULL` 条件的原子更新，多个实例并发运行
//! 也只会有一个成功；失败的结果只是揭示推迟到下一次调度。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use flare_im_core::metrics::RevealSchedulerMetrics;
use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DisclosureConfig;
use crate::domain::model::{MessagePatch, Precondition};
use crate::domain::repository::{Clock, MessageStore};
use crate::domain::service::{DisclosureStateMachine, RevealOutcome};

/// 调度器配置
#[derive(Debug, Clone)]
pub struct RevealSchedulerConfig {
    pub interval: Duration,
    pub batch_size: usize,
}

impl Default for RevealSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 500,
        }
    }
}

impl From<&DisclosureConfig> for RevealSchedulerConfig {
    fn from(config: &DisclosureConfig) -> Self {
        Self {
            interval: config.scheduler_interval,
            batch_size: config.scheduler_batch_size,
        }
    }
}

/// 单次调度结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// 查询到的到期消息数
    pub matched: usize,
    /// 本次提交成功的揭示数
    pub committed: usize,
    /// 已被揭示（其他实例或上一次调度）而跳过的数量
    pub skipped_already_revealed: usize,
    /// 是否因存储错误放弃了本次调度的剩余部分
    pub abandoned: bool,
}

/// 调度器健康状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerHealth {
    pub ticks_run: u64,
    pub ticks_abandoned: u64,
    pub reveals_committed: u64,
    pub reveals_skipped: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_report: Option<TickReport>,
}

pub struct RevealScheduler {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    config: RevealSchedulerConfig,
    metrics: Arc<RevealSchedulerMetrics>,
    health: Arc<RwLock<SchedulerHealth>>,
}

impl RevealScheduler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        config: RevealSchedulerConfig,
        metrics: Arc<RevealSchedulerMetrics>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            metrics,
            health: Arc::new(RwLock::new(SchedulerHealth::default())),
        }
    }

    pub fn config(&self) -> &RevealSchedulerConfig {
        &self.config
    }

    pub async fn health(&self) -> SchedulerHealth {
        self.health.read().await.clone()
    }

    /// 执行一次调度
    #[instrument(skip(self), fields(batch_size = self.config.batch_size))]
    pub async fn run_tick(&self) -> TickReport {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = TickReport::default();

        match self.store.query_due(now, self.config.batch_size).await {
            Ok(due) => {
                report.matched = due.len();
                self.metrics.due_batch_size.observe(due.len() as f64);

                for message in due {
                    // 先做纯状态检查，再交给存储层做原子提交
                    let mut candidate = message.clone();
                    match DisclosureStateMachine::commit_reveal(&mut candidate, now) {
                        Ok(RevealOutcome::AlreadyRevealed) => {
                            report.skipped_already_revealed += 1;
                            continue;
                        }
                        Ok(RevealOutcome::Committed) => {}
                        Err(err) => {
                            warn!(message_id = %message.id, error = %err, "Due message failed reveal check");
                            continue;
                        }
                    }

                    let result = self
                        .store
                        .conditional_update(
                            &message.id,
                            &Precondition::RevealDue { now },
                            &MessagePatch::CommitReveal { revealed_at: now },
                        )
                        .await;
                    match result {
                        Ok(true) => {
                            report.committed += 1;
                            debug!(message_id = %message.id, "Sender reveal committed");
                        }
                        Ok(false) => report.skipped_already_revealed += 1,
                        Err(err) => {
                            error!(message_id = %message.id, error = %err, "Reveal commit failed, abandoning tick");
                            report.abandoned = true;
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Failed to query due messages, abandoning tick");
                report.abandoned = true;
            }
        }

        self.record(&report, now, started.elapsed()).await;
        report
    }

    async fn record(&self, report: &TickReport, now: DateTime<Utc>, elapsed: Duration) {
        self.metrics.ticks_total.inc();
        self.metrics.tick_duration_seconds.observe(elapsed.as_secs_f64());
        self.metrics
            .reveals_committed_total
            .inc_by(report.committed as u64);
        self.metrics
            .reveals_skipped_total
            .inc_by(report.skipped_already_revealed as u64);
        if report.abandoned {
            self.metrics.ticks_abandoned_total.inc();
        }

        let mut health = self.health.write().await;
        health.ticks_run += 1;
        if report.abandoned {
            health.ticks_abandoned += 1;
        }
        health.reveals_committed += report.committed as u64;
        health.reveals_skipped += report.skipped_already_revealed as u64;
        health.last_tick_at = Some(now);
        health.last_report = Some(report.clone());

        if report.matched > 0 || report.abandoned {
            info!(
                matched = report.matched,
                committed = report.committed,
                skipped = report.skipped_already_revealed,
                abandoned = report.abandoned,
                elapsed_ms = elapsed.as_millis() as u64,
                "Reveal tick completed"
            );
        }
    }

    /// 启动后台调度循环，收到关闭信号后退出
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_ms = self.config.interval.as_millis() as u64,
                batch_size = self.config.batch_size,
                "Reveal scheduler started"
            );
            let mut interval_timer = tokio::time::interval(self.config.interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        self.run_tick().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Reveal scheduler stopped");
        })
    }
}
