//! 身份揭示调度器基准测试
//!
//! 测试调度器指标记录的开销

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use flare_im_core::metrics::RevealSchedulerMetrics;
use std::sync::Arc;
use std::time::Instant;

fn bench_reveal_scheduler_tick_metrics(c: &mut Criterion) {
    let metrics = Arc::new(RevealSchedulerMetrics::new());

    c.bench_function("reveal_scheduler_record_tick", |b| {
        b.iter(|| {
            let start = Instant::now();
            metrics.ticks_total.inc();
            metrics.due_batch_size.observe(black_box(100.0));
            metrics.reveals_committed_total.inc_by(black_box(100));
            let duration = start.elapsed();
            metrics.tick_duration_seconds.observe(duration.as_secs_f64());
            black_box(duration)
        })
    });
}

fn bench_metrics_export(c: &mut Criterion) {
    let metrics = Arc::new(RevealSchedulerMetrics::new());
    metrics.ticks_total.inc();

    c.bench_function("reveal_scheduler_gather_metrics", |b| {
        b.iter(|| black_box(flare_im_core::metrics::gather_metrics()))
    });
}

criterion_group!(
    benches,
    bench_reveal_scheduler_tick_metrics,
    bench_metrics_export
);
criterion_main!(benches);
