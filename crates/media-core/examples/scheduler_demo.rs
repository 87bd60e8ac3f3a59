//! Run a small media graph on the scheduler for one second and print
//! the punctuality metrics.
//!
//! Run with: cargo run --example scheduler_demo

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mediagw_media_core::{MediaTask, Result, Scheduler, SchedulerConfig, TaskQueue};
use mediagw_rtp_core::ClockSample;

struct StageTask {
    name: &'static str,
    runs: Arc<AtomicU64>,
}

impl MediaTask for StageTask {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&mut self, _now: ClockSample) -> Result<()> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("mediagw_media_core=debug")
        .init();

    let mut sched = Scheduler::new(SchedulerConfig::default()).unwrap();
    let runs = Arc::new(AtomicU64::new(0));

    for (queue, name) in [
        (TaskQueue::Input, "rtp-reader"),
        (TaskQueue::MixerInput, "mixer-feed"),
        (TaskQueue::MixerOutput, "mixer-drain"),
        (TaskQueue::Output, "rtp-writer"),
    ] {
        sched
            .register(
                queue,
                StageTask {
                    name,
                    runs: Arc::clone(&runs),
                },
            )
            .unwrap();
    }

    sched.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    sched.stop().await;

    let metrics = sched.metrics();
    println!("ticks:           {}", metrics.ticks());
    println!("task executions: {}", runs.load(Ordering::Relaxed));
    println!("missed ticks:    {}", metrics.missed_ticks());
    println!("miss rate:       {:.4}", metrics.miss_rate());
    println!("worst tick:      {:?}", metrics.worst_case_execution_time());
}
