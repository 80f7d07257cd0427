//! End-to-end tests driving the engine with real processes

use hooksmith_engine::{CommandSpec, EngineConfig, ExecutionEngine, ExecutionMode};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn quick(program: &str) -> CommandSpec {
    CommandSpec::new(program).timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn echo_round_trip() {
    let engine = ExecutionEngine::new(EngineConfig::default()).unwrap();

    let result = engine.execute(quick("echo").arg("hello")).await;
    assert!(result.succeeded);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello\n");

    engine.shutdown().await;
}

#[tokio::test]
async fn batch_runs_every_command_and_pairs_results() {
    let engine = ExecutionEngine::new(EngineConfig::default()).unwrap();

    let batch: Vec<_> = (0..4)
        .map(|i| quick("echo").arg(format!("line{i}")))
        .collect();
    let ids: Vec<_> = batch.iter().map(|c| c.id).collect();

    let results = engine.execute_batch(batch, ExecutionMode::Adaptive).await;
    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(result.succeeded);
        let position = ids
            .iter()
            .position(|id| *id == result.command.id)
            .expect("result pairs to a submitted command");
        assert_eq!(result.stdout, format!("line{position}\n"));
    }

    engine.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_does_not_poison_the_batch() {
    let engine = ExecutionEngine::new(EngineConfig::default()).unwrap();

    let batch = vec![
        quick("sh").args(["-c", "exit 7"]),
        quick("echo").arg("still-ran"),
    ];
    let results = engine
        .execute_batch(batch, ExecutionMode::Sequential)
        .await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].succeeded);
    assert_eq!(results[0].exit_code, 7);
    assert!(results[1].succeeded);
    assert_eq!(results[1].stdout, "still-ran\n");

    engine.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn timeout_is_enforced_and_leaves_nothing_behind() {
    let engine = ExecutionEngine::new(EngineConfig::default()).unwrap();

    let spec = quick("sleep").arg("10").timeout(Duration::from_millis(500));
    let start = Instant::now();
    let result = engine.execute(spec).await;
    let elapsed = start.elapsed();

    assert!(!result.succeeded);
    assert_eq!(result.exit_code, -1);
    assert!(result.error_detail.unwrap().contains("timed out"));
    // 0.5s timeout + 0.5s grace, with slack for slow machines
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");

    engine.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn cacheable_command_is_served_from_cache() {
    let engine = ExecutionEngine::new(EngineConfig::default()).unwrap();

    // Prints its own PID, so a re-execution would produce new output
    let first = engine
        .execute(quick("sh").args(["-c", "echo $$"]).cacheable(None))
        .await;
    assert!(first.succeeded);

    let second = engine
        .execute(quick("sh").args(["-c", "echo $$"]).cacheable(None))
        .await;
    assert!(second.succeeded);
    assert_eq!(second.stdout, first.stdout);

    let stats = engine.stats();
    let cache = stats.cache.expect("cache enabled by default");
    assert_eq!(cache.hot_hits, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn stats_accumulate_across_commands() {
    let engine = ExecutionEngine::new(EngineConfig::default()).unwrap();

    for _ in 0..3 {
        let result = engine.execute(quick("true")).await;
        assert!(result.succeeded);
    }

    let stats = engine.stats();
    assert_eq!(stats.scheduler.completed, 3);
    assert_eq!(stats.scheduler.failed, 0);
    assert_eq!(stats.load.active, 0);
    assert!(stats.scheduler.success_rate > 0.99);

    // The snapshot serializes for diagnostics endpoints
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["scheduler"]["completed"], 3);

    engine.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn shutdown_terminates_in_flight_commands() {
    let engine = Arc::new(ExecutionEngine::new(EngineConfig::default()).unwrap());

    let in_flight = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(
                    CommandSpec::new("sleep")
                        .arg("30")
                        .timeout(Duration::from_secs(60)),
                )
                .await
        })
    };

    // Give the process time to actually start
    tokio::time::sleep(Duration::from_millis(200)).await;

    let start = Instant::now();
    engine.shutdown().await;

    let result = in_flight.await.unwrap();
    let elapsed = start.elapsed();

    // The command observes its own death as a failed completion,
    // well before its timeout would have fired
    assert!(!result.succeeded);
    assert_eq!(result.exit_code, -1);
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn checkpoints_survive_engine_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = EngineConfig {
        checkpoint_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let engine = ExecutionEngine::new(config.clone()).unwrap();
    engine
        .checkpoints()
        .unwrap()
        .save("migration", &vec!["step-1".to_string(), "step-2".to_string()])
        .unwrap();
    engine.shutdown().await;

    let engine = ExecutionEngine::new(config).unwrap();
    let resumed: Vec<String> = engine
        .checkpoints()
        .unwrap()
        .load("migration")
        .unwrap()
        .expect("checkpoint persisted across engines");
    assert_eq!(resumed, vec!["step-1", "step-2"]);
    engine.shutdown().await;
}
