//! 应用运行编排器
//!
//! 一个编排器持有一个应用的平台句柄，按分类器给出的顺序逐阶段执行，
//! 最后定稿测试结果。状态流转:
//!
//! ```text
//! Created → PlatformCreated → PlatformInitialized → Running(i) → Finalizing → Done
//! ```
//!
//! 平台创建或初始化失败直接进入 Done(失败)。平台句柄无论成功与否都会被释放。

use atp_platform::{PlatformConfig, PlatformFactory, PlatformHandle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    Action, ActionClassifier, ArtifactPaths, ExecutionContext, ExecutorError, HandlerRegistry,
    RecordingManager, StageExecutor, TestResult, DEFAULT_MAX_WORKERS,
};

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Created,
    PlatformCreated,
    PlatformInitialized,
    Running(usize),
    Finalizing,
    Done { success: bool },
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Created => write!(f, "Created"),
            RunPhase::PlatformCreated => write!(f, "PlatformCreated"),
            RunPhase::PlatformInitialized => write!(f, "PlatformInitialized"),
            RunPhase::Running(stage) => write!(f, "Running({})", stage),
            RunPhase::Finalizing => write!(f, "Finalizing"),
            RunPhase::Done { success: true } => write!(f, "Done(Success)"),
            RunPhase::Done { success: false } => write!(f, "Done(Failure)"),
        }
    }
}

/// 应用运行器
pub struct AppRunner {
    /// 平台工厂
    factory: Arc<dyn PlatformFactory>,

    /// 扩展处理器
    handlers: Arc<HandlerRegistry>,

    classifier: ActionClassifier,
    executor: StageExecutor,

    /// 产物根目录
    output_dir: PathBuf,

    /// 取消令牌 (只在阶段之间检查)
    cancel: CancellationToken,
}

impl AppRunner {
    /// 创建新的应用运行器
    pub fn new(factory: Arc<dyn PlatformFactory>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            factory,
            handlers,
            classifier: ActionClassifier::new(),
            executor: StageExecutor::new(DEFAULT_MAX_WORKERS),
            output_dir: PathBuf::from("./output"),
            cancel: CancellationToken::new(),
        }
    }

    /// 设置分类器
    pub fn with_classifier(mut self, classifier: ActionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// 设置阶段执行器
    pub fn with_executor(mut self, executor: StageExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// 设置产物根目录
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// 设置取消令牌
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 运行一个应用，总是返回一份已定稿的测试结果
    pub async fn run(&self, app: &PlatformConfig, actions: &[Action]) -> TestResult {
        let mut result = TestResult::new(&app.name, app.platform_type);
        info!("开始运行应用: {} ({})", app.name, app.platform_type);
        self.enter(app, RunPhase::Created);

        let artifacts = Arc::new(ArtifactPaths::new(&self.output_dir, &app.name));
        if let Err(e) = artifacts.prepare().await {
            error!("创建产物目录失败 {}: {}", artifacts.app_dir().display(), e);
            return self.done(app, result, Some(ExecutorError::IoError(e)));
        }

        let platform = match self.factory.create(app.platform_type).await {
            Ok(platform) => platform,
            Err(e) => {
                error!("创建平台失败: {}", e);
                let err = ExecutorError::PlatformCreationFailed(e.to_string());
                return self.done(app, result, Some(err));
            }
        };
        self.enter(app, RunPhase::PlatformCreated);

        if let Err(e) = platform.initialize(app).await {
            error!("初始化平台失败: {}", e);
            self.release(app, platform.as_ref()).await;
            let err = ExecutorError::PlatformInitFailed(e.to_string());
            return self.done(app, result, Some(err));
        }
        self.enter(app, RunPhase::PlatformInitialized);

        let stages = self.classifier.classify(actions);
        let recording = Arc::new(RecordingManager::new(platform.clone(), artifacts.clone()));
        let shared = Arc::new(Mutex::new(result));
        let ctx = ExecutionContext {
            platform: platform.clone(),
            result: Arc::clone(&shared),
            recording: Arc::clone(&recording),
            artifacts,
            handlers: Arc::clone(&self.handlers),
        };

        let mut first_error = None;
        for (index, stage) in stages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("运行已取消，跳过剩余 {} 个阶段", stages.len() - index);
                first_error = Some(ExecutorError::Cancelled);
                break;
            }

            self.enter(app, RunPhase::Running(index));
            info!(
                "执行阶段 {}/{} ({} 个动作, {})",
                index + 1,
                stages.len(),
                stage.len(),
                if stage.runs_in_parallel() { "并行" } else { "串行" }
            );

            if let Err(e) = self.executor.run(stage, &ctx, &self.cancel).await {
                error!("阶段 {} 失败: {}", index + 1, e);
                first_error = Some(e);
                break;
            }
        }

        self.enter(app, RunPhase::Finalizing);
        recording.shutdown().await;
        let metrics = platform.metrics().await;
        self.release(app, platform.as_ref()).await;

        result = shared.lock().await.clone();
        result.merge_metrics(metrics);
        self.done(app, result, first_error)
    }

    /// 释放平台句柄，失败只记录日志
    async fn release(&self, app: &PlatformConfig, platform: &dyn PlatformHandle) {
        if let Err(e) = platform.close().await {
            warn!("释放平台 {} 失败: {}", app.name, e);
        }
    }

    fn done(
        &self,
        app: &PlatformConfig,
        mut result: TestResult,
        error: Option<ExecutorError>,
    ) -> TestResult {
        result.finish(error.map(|e| e.to_string()));
        self.enter(app, RunPhase::Done { success: result.success });

        if result.success {
            info!("应用 {} 运行成功，耗时 {:.3}s", app.name, result.duration);
        } else {
            warn!(
                "应用 {} 运行失败: {}",
                app.name,
                result.error.as_deref().unwrap_or_default()
            );
        }

        result
    }

    fn enter(&self, app: &PlatformConfig, phase: RunPhase) {
        debug!("[{}] → {}", app.name, phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_phase_display() {
        assert_eq!(RunPhase::Running(2).to_string(), "Running(2)");
        assert_eq!(RunPhase::Done { success: true }.to_string(), "Done(Success)");
        assert_eq!(RunPhase::Done { success: false }.to_string(), "Done(Failure)");
    }
}
