use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use worker_pool::{task_fn, PoolConfig, SharedLock, WorkerPool};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example ---");

  // Word counts shared by every task, guarded by the pool's shared lock.
  let pool = WorkerPool::with_config(
    PoolConfig::new(2).name("basic_pool"),
    HashMap::<String, usize>::new(),
  )
  .expect("valid pool configuration");
  let report = pool.run().expect("workers started");

  let lines = [
    "the quick brown fox",
    "jumps over the lazy dog",
    "the dog sleeps",
    "a fox runs",
    "the end",
  ];

  for (i, line) in lines.iter().enumerate() {
    let line = line.to_string();
    let task_id = pool
      .submit(task_fn(move |worker_id, counts: SharedLock<HashMap<String, usize>>| async move {
        info!("Worker {} counting line {}", worker_id, i);
        tokio::time::sleep(Duration::from_millis(100 + (i as u64 % 3) * 50)).await;
        let mut counts = counts.lock().await;
        for word in line.split_whitespace() {
          *counts.entry(word.to_string()).or_insert(0) += 1;
        }
        Ok(())
      }))
      .await
      .expect("pool is open");
    info!("Submitted line {} as task {}", i, task_id);
  }

  info!("All tasks submitted. Closing pool and waiting for workers...");
  pool.close().await.expect("pool closed once");

  let counts = pool.shared();
  let counts = counts.lock().await;
  info!("Occurrences of 'the': {}", counts.get("the").copied().unwrap_or(0));
  info!("Distinct words: {}", counts.len());
  info!("Failures: {}", report.failure_count().expect("pool drained"));
  info!("--- Basic Usage Example End ---");
}
