//! 阶段执行器测试
//!
//! 使用模拟平台验证串行 / 并行阶段的执行语义。

use anyhow::anyhow;
use async_trait::async_trait;
use atp_executor::*;
use atp_platform::{PlatformHandle, PlatformType, SimulatedPlatform};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

struct Fixture {
    platform: Arc<SimulatedPlatform>,
    ctx: ExecutionContext,
    _dir: TempDir,
}

async fn fixture(platform: SimulatedPlatform) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let platform = Arc::new(platform);
    let handle: Arc<dyn PlatformHandle> = platform.clone();
    let artifacts = Arc::new(ArtifactPaths::new(dir.path(), "portal"));
    artifacts.prepare().await.unwrap();

    let ctx = ExecutionContext {
        platform: handle.clone(),
        result: Arc::new(Mutex::new(TestResult::new("portal", PlatformType::Web))),
        recording: Arc::new(RecordingManager::new(handle, artifacts.clone())),
        artifacts,
        handlers: Arc::new(HandlerRegistry::with_builtins().await),
    };

    Fixture {
        platform,
        ctx,
        _dir: dir,
    }
}

fn clicks(selectors: &[&str]) -> Vec<Action> {
    selectors.iter().map(|s| Action::click(s)).collect()
}

#[tokio::test]
async fn test_parallel_stage_all_succeed() {
    let f = fixture(SimulatedPlatform::new(PlatformType::Web)).await;
    let stage = ActionStage::parallel(clicks(&["#a", "#b", "#c", "#d", "#e"]));

    let result = StageExecutor::with_exact_workers(4)
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await;

    assert!(result.is_ok());
    assert_eq!(f.platform.count("click").await, 5);
}

#[tokio::test]
async fn test_parallel_stage_failure_does_not_cancel_siblings() {
    let platform = SimulatedPlatform::new(PlatformType::Web).fail_on("click", Some("#b"));
    let f = fixture(platform).await;
    let stage = ActionStage::parallel(clicks(&["#a", "#b", "#c"]));

    let err = StageExecutor::with_exact_workers(4)
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("click failed:"), "{}", err);
    assert!(err.to_string().contains("#b"));
    // 所有动作都被调用过
    assert_eq!(f.platform.count("click").await, 3);
}

#[tokio::test]
async fn test_parallel_first_error_is_lowest_sequence() {
    let platform = SimulatedPlatform::new(PlatformType::Web)
        .fail_on("click", Some("#c"))
        .fail_on("click", Some("#b"));
    let f = fixture(platform).await;
    let stage = ActionStage::parallel(vec![
        Action::click("#a").with_name("first"),
        Action::click("#b").with_name("second"),
        Action::click("#c").with_name("third"),
    ]);

    let err = StageExecutor::with_exact_workers(1)
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("second failed:"), "{}", err);
}

#[tokio::test]
async fn test_sequential_stage_fails_fast() {
    let platform = SimulatedPlatform::new(PlatformType::Web).fail_on("navigate", None);
    let f = fixture(platform).await;
    let stage = ActionStage {
        actions: vec![Action::navigate("https://example.com"), Action::click("#next")],
        parallel: false,
    };

    let err = StageExecutor::default()
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("navigate failed:"));
    assert_eq!(f.platform.count("navigate").await, 1);
    assert_eq!(f.platform.count("click").await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_is_bounded() {
    let platform =
        SimulatedPlatform::new(PlatformType::Web).with_latency(Duration::from_millis(100));
    let f = fixture(platform).await;
    let stage = ActionStage::parallel(clicks(&["#1", "#2", "#3", "#4", "#5", "#6", "#7"]));

    StageExecutor::with_exact_workers(2)
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(f.platform.count("click").await, 7);
    assert!(f.platform.max_in_flight() <= 2);
    assert!(f.platform.max_in_flight() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_parallel_wait() {
    let platform =
        SimulatedPlatform::new(PlatformType::Web).with_latency(Duration::from_secs(30));
    let f = fixture(platform).await;
    let stage = ActionStage::parallel(clicks(&["#a", "#b"]));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = StageExecutor::with_exact_workers(2)
        .run(&stage, &f.ctx, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Cancelled));

    // 已派发的 worker 不会被撤回
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.platform.count("click").await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_skips_queued_workers() {
    let platform =
        SimulatedPlatform::new(PlatformType::Web).with_latency(Duration::from_secs(30));
    let f = fixture(platform).await;
    let stage = ActionStage::parallel(vec![
        Action::click("#a"),
        Action::click("#b"),
        Action::record(0),
    ]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let watched = f.platform.clone();
    tokio::spawn(async move {
        while watched.max_in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.cancel();
    });

    let err = StageExecutor::with_exact_workers(1)
        .run(&stage, &f.ctx, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Cancelled));

    // 正在执行的 worker 跑完，排队中的 worker 不再执行
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(f.platform.count("click").await, 1);
    assert_eq!(f.platform.count("start_recording").await, 0);
    assert!(f.ctx.result.lock().await.videos.is_empty());
}

#[tokio::test]
async fn test_screenshots_appended_to_result() {
    let f = fixture(SimulatedPlatform::new(PlatformType::Web)).await;
    let stage = ActionStage::parallel(vec![
        Action::screenshot(),
        Action::from_kind(ActionKind::Screenshot {
            file: Some("login.png".to_string()),
        }),
    ]);

    StageExecutor::with_exact_workers(2)
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await
        .unwrap();

    let result = f.ctx.result.lock().await;
    assert_eq!(result.screenshots.len(), 2);
    assert!(result
        .screenshots
        .iter()
        .all(|p| p.starts_with(f.ctx.artifacts.screenshot_dir())));
    assert!(result.screenshots.iter().any(|p| p.ends_with("login.png")));
}

#[tokio::test]
async fn test_failed_screenshot_not_recorded() {
    let platform = SimulatedPlatform::new(PlatformType::Web).fail_on("screenshot", None);
    let f = fixture(platform).await;
    let stage = ActionStage::sequential(Action::screenshot());

    let err = StageExecutor::default()
        .run(&stage, &f.ctx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("screenshot failed:"));
    assert!(f.ctx.result.lock().await.screenshots.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_record_rejected() {
    let f = fixture(SimulatedPlatform::new(PlatformType::Web)).await;
    let executor = StageExecutor::default();
    let cancel = CancellationToken::new();

    executor
        .run(&ActionStage::sequential(Action::record(10)), &f.ctx, &cancel)
        .await
        .unwrap();
    let err = executor
        .run(&ActionStage::sequential(Action::record(5)), &f.ctx, &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "record failed: recording already active");
    assert_eq!(f.platform.count("start_recording").await, 1);
    assert_eq!(f.ctx.result.lock().await.videos.len(), 1);

    f.ctx.recording.shutdown().await;
    assert_eq!(f.platform.count("stop_recording").await, 1);
}

struct CountingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl ActionHandler for CountingHandler {
    async fn handle(&self, action: &Action, _platform: &dyn PlatformHandle) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match action.params.get("fail") {
            Some(_) => Err(anyhow!("拖拽目标不存在")),
            None => Ok(()),
        }
    }
}

#[tokio::test]
async fn test_extension_dispatch() {
    let f = fixture(SimulatedPlatform::new(PlatformType::Web)).await;
    let handler = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    f.ctx
        .handlers
        .register("drag_drop", handler.clone())
        .await
        .unwrap();

    let ok = ActionStage::sequential(Action::extension("drag_drop"));
    StageExecutor::default()
        .run(&ok, &f.ctx, &CancellationToken::new())
        .await
        .unwrap();

    let failing = ActionStage::sequential(
        Action::extension("drag_drop").with_param("fail", serde_json::json!(true)),
    );
    let err = StageExecutor::default()
        .run(&failing, &f.ctx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "drag_drop failed: 拖拽目标不存在");
    assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
}
