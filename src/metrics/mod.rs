//! # Prometheus 指标收集模块
//!
//! 为各个服务模块提供统一的 Prometheus 指标收集能力。

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 匿名消息服务指标
pub struct DisclosureMetrics {
    /// 创建消息总数（按是否匿名区分）
    pub messages_created_total: IntCounterVec,
    /// 打开消息总数（按是否匿名区分）
    pub messages_opened_total: IntCounterVec,
    /// 被拒绝的请求总数（按错误码区分）
    pub requests_rejected_total: IntCounterVec,
}

impl DisclosureMetrics {
    pub fn new() -> Self {
        let messages_created_total = IntCounterVec::new(
            Opts::new(
                "disclosure_messages_created_total",
                "Total number of messages created",
            ),
            &["anonymous"],
        )
        .expect("Failed to create disclosure_messages_created_total metric");

        let messages_opened_total = IntCounterVec::new(
            Opts::new(
                "disclosure_messages_opened_total",
                "Total number of messages opened by recipients",
            ),
            &["anonymous"],
        )
        .expect("Failed to create disclosure_messages_opened_total metric");

        let requests_rejected_total = IntCounterVec::new(
            Opts::new(
                "disclosure_requests_rejected_total",
                "Total number of rejected disclosure requests",
            ),
            &["code"],
        )
        .expect("Failed to create disclosure_requests_rejected_total metric");

        // 注册指标，忽略重复注册错误（测试和基准测试中可能会重复创建）
        let _ = REGISTRY.register(Box::new(messages_created_total.clone()));
        let _ = REGISTRY.register(Box::new(messages_opened_total.clone()));
        let _ = REGISTRY.register(Box::new(requests_rejected_total.clone()));

        Self {
            messages_created_total,
            messages_opened_total,
            requests_rejected_total,
        }
    }
}

impl Default for DisclosureMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 身份揭示调度器指标
pub struct RevealSchedulerMetrics {
    /// 调度执行次数
    pub ticks_total: IntCounter,
    /// 被放弃的调度次数（存储不可用等）
    pub ticks_abandoned_total: IntCounter,
    /// 成功提交的揭示数
    pub reveals_committed_total: IntCounter,
    /// 已被其他实例揭示而跳过的数量
    pub reveals_skipped_total: IntCounter,
    /// 单次调度耗时（秒）
    pub tick_duration_seconds: Histogram,
    /// 单次调度匹配到的到期消息数
    pub due_batch_size: Histogram,
}

impl RevealSchedulerMetrics {
    pub fn new() -> Self {
        let ticks_total = IntCounter::new(
            "reveal_scheduler_ticks_total",
            "Total number of reveal scheduler ticks",
        )
        .expect("Failed to create reveal_scheduler_ticks_total metric");

        let ticks_abandoned_total = IntCounter::new(
            "reveal_scheduler_ticks_abandoned_total",
            "Total number of reveal scheduler ticks abandoned on store errors",
        )
        .expect("Failed to create reveal_scheduler_ticks_abandoned_total metric");

        let reveals_committed_total = IntCounter::new(
            "reveal_scheduler_reveals_committed_total",
            "Total number of sender reveals committed",
        )
        .expect("Failed to create reveal_scheduler_reveals_committed_total metric");

        let reveals_skipped_total = IntCounter::new(
            "reveal_scheduler_reveals_skipped_total",
            "Total number of reveals skipped because they were already committed",
        )
        .expect("Failed to create reveal_scheduler_reveals_skipped_total metric");

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "reveal_scheduler_tick_duration_seconds",
                "Reveal scheduler tick duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )
        .expect("Failed to create reveal_scheduler_tick_duration_seconds metric");

        let due_batch_size = Histogram::with_opts(
            HistogramOpts::new(
                "reveal_scheduler_due_batch_size",
                "Number of due messages matched per tick",
            )
            .buckets(vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0]),
        )
        .expect("Failed to create reveal_scheduler_due_batch_size metric");

        let _ = REGISTRY.register(Box::new(ticks_total.clone()));
        let _ = REGISTRY.register(Box::new(ticks_abandoned_total.clone()));
        let _ = REGISTRY.register(Box::new(reveals_committed_total.clone()));
        let _ = REGISTRY.register(Box::new(reveals_skipped_total.clone()));
        let _ = REGISTRY.register(Box::new(tick_duration_seconds.clone()));
        let _ = REGISTRY.register(Box::new(due_batch_size.clone()));

        Self {
            ticks_total,
            ticks_abandoned_total,
            reveals_committed_total,
            reveals_skipped_total,
            tick_duration_seconds,
            due_batch_size,
        }
    }
}

impl Default for RevealSchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 获取 Prometheus 指标导出格式
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
