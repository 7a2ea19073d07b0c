use tracing::{info, warn};
use worker_pool::{task_fn, SharedLock, WorkerPool};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Error Collection Example ---");

  let pool = WorkerPool::<Vec<u32>>::new(3).expect("valid worker count");
  let report = pool.run().expect("workers started");

  for n in [4u32, 9, 0, 16, 7, 25, 0] {
    pool
      .submit(task_fn(move |_, roots: SharedLock<Vec<u32>>| async move {
        if n == 0 {
          return Err("refusing to process zero".into());
        }
        let root = (n as f64).sqrt();
        if root.fract() != 0.0 {
          return Err(format!("{} is not a perfect square", n).into());
        }
        roots.lock().await.push(root as u32);
        Ok(())
      }))
      .await
      .expect("pool is open");
  }

  // Failures are only readable once close() has returned.
  if let Err(e) = report.failure_count() {
    info!("Reading failures early is rejected: {}", e);
  }

  pool.close().await.expect("pool closed once");

  for failure in report.take_failures().expect("pool drained") {
    warn!(
      "Task {} on worker {} failed: {}",
      failure.task_id, failure.worker_id, failure.error
    );
  }
  let mut roots = pool.shared().lock().await.clone();
  roots.sort_unstable();
  info!("Perfect square roots: {:?}", roots);
  info!("--- Error Collection Example End ---");
}
