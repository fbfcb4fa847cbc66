use serde::Deserialize;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use weft_core::impls::ThreadPoolExecutor;
use weft_core::{BoxError, CompletionService, PoolConfig, TaskError};

/// デモの設定（`weft-cli [config.json]`）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    pool: PoolConfig,
    tasks: Vec<DemoTask>,
}

#[derive(Debug, Clone, Deserialize)]
struct DemoTask {
    delay_ms: u64,
    #[serde(default)]
    fail: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        // submit 順は 0, 1, 2 だが、完了順は 1, 2, 0 になるはず
        let tasks = [30, 10, 20]
            .into_iter()
            .map(|delay_ms| DemoTask {
                delay_ms,
                fail: false,
            })
            .collect();
        Self {
            pool: PoolConfig::default().with_workers(3),
            tasks,
        }
    }
}

fn load_config() -> Result<DemoConfig, BoxError> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(DemoConfig::default());
    };
    let raw = std::fs::read_to_string(&path)?;
    let config: DemoConfig = serde_json::from_str(&raw)?;
    config.pool.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) Executor と CompletionService を用意
    let config = load_config()?;
    tracing::info!(
        tasks = config.tasks.len(),
        workers = config.pool.workers,
        "running completion-order demo"
    );
    let pool = std::sync::Arc::new(ThreadPoolExecutor::new(config.pool.clone())?);
    let service = CompletionService::<usize, String>::new(std::sync::Arc::clone(&pool));

    // (B) タスク投入（submit は待たずに handle を返す）
    for (index, task) in config.tasks.iter().cloned().enumerate() {
        let handle = service.submit(move || {
            std::thread::sleep(Duration::from_millis(task.delay_ms));
            if task.fail {
                return Err(format!("task {index} was configured to fail"));
            }
            Ok(index)
        })?;
        println!("submitted: index={index} id={} delay_ms={}", handle.id(), task.delay_ms);
    }

    // (C) 完了順に受け取る
    for _ in 0..config.tasks.len() {
        let handle = service.take_async().await;
        match handle.get() {
            Ok(index) => println!("completed: index={index} id={}", handle.id()),
            Err(TaskError::Failed(cause)) => println!("failed: id={} cause={cause}", handle.id()),
            Err(other) => println!("finished abnormally: id={} error={other}", handle.id()),
        }
    }

    // (D) 集計を出して片付ける
    println!("stats: {}", serde_json::to_string(&service.stats())?);
    pool.shutdown();
    pool.join();
    Ok(())
}
