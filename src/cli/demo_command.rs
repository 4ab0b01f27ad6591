use crate::cli::Args;
use smartlock::utils::parse_duration;
use smartlock::{LockArbiter, LockConfig, LockError, LockStore, MemoryStore, Result};
use std::sync::Arc;
use tokio::time::{self, Instant};

pub async fn execute_demo(args: Args) -> Result<()> {
    if args.tasks == 0 {
        return Err(LockError::Other("--tasks must be at least 1".to_string()));
    }

    let max_wait = parse_duration(&args.max_wait)?;
    let hold = parse_duration(&args.hold)?;
    let lease = parse_duration(&args.lease)?;

    let store = open_store(args.redis_url.as_deref()).await?;
    let config = LockConfig::new()
        .with_default_lease(lease)
        .with_default_max_wait(max_wait)
        .with_key_prefix(args.prefix.clone());
    let arbiter = LockArbiter::new(store, config);

    let started = Instant::now();
    let quiet = args.quiet;
    if !quiet {
        println!(
            "{} tasks contending for {}",
            args.tasks,
            arbiter.config().store_key(&args.key)
        );
    }
    let mut tasks = Vec::with_capacity(args.tasks);

    // Submit every request up front so task order is queue order.
    for task in 1..=args.tasks {
        let pending = arbiter.lock(args.key.clone());
        tasks.push(tokio::spawn(async move {
            let lock = pending.await?;
            if !quiet {
                println!(
                    "granted #{} to task {} after {}ms",
                    lock.id(),
                    task,
                    started.elapsed().as_millis()
                );
            }
            time::sleep(hold).await;
            lock.release().await
        }));
    }

    let mut first_error = None;
    for (i, task) in tasks.into_iter().enumerate() {
        let outcome = task
            .await
            .unwrap_or_else(|e| Err(LockError::Other(format!("task panicked: {}", e))));

        if let Err(e) = outcome {
            eprintln!("task {} failed: {}", i + 1, e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn open_store(redis_url: Option<&str>) -> Result<Arc<dyn LockStore>> {
    match redis_url {
        #[cfg(feature = "redis")]
        Some(url) => Ok(Arc::new(smartlock::RedisStore::connect(url).await?)),
        #[cfg(not(feature = "redis"))]
        Some(_) => Err(LockError::Other(
            "smartlock was built without the `redis` feature".to_string(),
        )),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}
