//! 阶段执行器
//!
//! 串行阶段按顺序执行，首个失败即返回；可并行阶段把每个动作派发到
//! 有界 worker 池，等待全部完成后按派发顺序扫描，返回序号最小的失败。
//! 已开始执行的 worker 不会被撤回；取消会中断等待，并让仍在排队的 worker 放弃执行。

use atp_platform::PlatformHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Action, ActionKind, ActionStage, ArtifactPaths, ExecutorError, HandlerRegistry,
    RecordingManager, Result, TestResult,
};

/// 默认 worker 上限
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// 实际 worker 上限: min(配置值, 可用并行度)，至少为 1
pub fn effective_worker_cap(configured: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    configured.max(1).min(available)
}

/// 一次应用运行中各 worker 共享的上下文
#[derive(Clone)]
pub struct ExecutionContext {
    /// 平台句柄
    pub platform: Arc<dyn PlatformHandle>,

    /// 测试结果
    pub result: Arc<Mutex<TestResult>>,

    /// 录屏管理器
    pub recording: Arc<RecordingManager>,

    /// 产物路径
    pub artifacts: Arc<ArtifactPaths>,

    /// 扩展处理器
    pub handlers: Arc<HandlerRegistry>,
}

/// 阶段执行器
#[derive(Debug, Clone)]
pub struct StageExecutor {
    max_workers: usize,
}

impl StageExecutor {
    /// `max_workers` 会被限制在可用并行度以内
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: effective_worker_cap(max_workers),
        }
    }

    /// 不受可用并行度限制的固定上限
    pub fn with_exact_workers(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 执行一个阶段
    pub async fn run(
        &self,
        stage: &ActionStage,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if stage.runs_in_parallel() {
            self.run_parallel(stage, ctx, cancel).await
        } else {
            self.run_sequential(stage, ctx).await
        }
    }

    async fn run_sequential(&self, stage: &ActionStage, ctx: &ExecutionContext) -> Result<()> {
        for action in &stage.actions {
            execute_action(action, ctx).await?;
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        stage: &ActionStage,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(
            "并行执行 {} 个动作 (worker 上限 {})",
            stage.len(),
            self.max_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut workers = Vec::with_capacity(stage.len());

        for (seq, action) in stage.actions.iter().cloned().enumerate() {
            let label = action.label();
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(ExecutorError::Cancelled),
                };
                debug!("worker #{} 开始: {}", seq, action.label());
                execute_action(&action, &ctx).await
            });
            workers.push((label, handle));
        }

        let join_all = async move {
            let mut first_error = None;

            for (seq, (label, handle)) in workers.into_iter().enumerate() {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(ExecutorError::ActionFailed {
                        action: label,
                        cause: format!("worker 异常退出: {}", e),
                    }),
                };

                if let Err(e) = outcome {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        debug!("worker #{} 的错误被忽略: {}", seq, e);
                    }
                }
            }

            first_error
        };

        tokio::select! {
            first_error = join_all => match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            },
            _ = cancel.cancelled() => {
                // 尚未拿到许可的 worker 直接返回，已开始的继续运行
                semaphore.close();
                warn!("阶段等待被取消，已开始的 worker 继续运行");
                Err(ExecutorError::Cancelled)
            }
        }
    }
}

impl Default for StageExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

/// 执行单个动作，失败时用动作名称包装错误
pub async fn execute_action(action: &Action, ctx: &ExecutionContext) -> Result<()> {
    debug!("执行动作: {}", action.label());

    dispatch(action, ctx).await.map_err(|e| match e {
        ExecutorError::ActionFailed { .. } => e,
        other => ExecutorError::action_failed(action, other),
    })
}

async fn dispatch(action: &Action, ctx: &ExecutionContext) -> Result<()> {
    match &action.kind {
        ActionKind::Navigate { url } => ctx.platform.navigate(url).await?,
        ActionKind::Click { selector } => ctx.platform.click(selector).await?,
        ActionKind::Fill { selector, value } => ctx.platform.fill(selector, value).await?,
        ActionKind::Submit { selector } => ctx.platform.submit(selector).await?,
        ActionKind::Wait { seconds } => {
            ctx.platform.wait(Duration::from_secs(*seconds)).await?
        }
        ActionKind::Screenshot { file } => {
            let path = ctx.artifacts.screenshot_path(file.as_deref());
            ctx.platform.screenshot(&path).await?;
            ctx.result.lock().await.add_screenshot(path);
        }
        ActionKind::Record { duration } => {
            let duration = (*duration > 0).then(|| Duration::from_secs(*duration));
            let path = ctx.recording.start(duration).await?;
            ctx.result.lock().await.add_video(path);
        }
        ActionKind::Extension { handler, .. } => {
            let handler = ctx.handlers.get(handler).await?;
            handler
                .handle(action, ctx.platform.as_ref())
                .await
                .map_err(|e| ExecutorError::HandlerError(format!("{:#}", e)))?;
        }
    }
    Ok(())
}
