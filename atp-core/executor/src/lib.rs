//! ATP 执行器
//!
//! UI 自动化测试调度与执行引擎：把有序的动作列表划分为串行 / 可并行阶段，
//! 在平台句柄上逐阶段执行，并为每个被测应用产出一份测试结果。

pub mod action;
pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod handler;
pub mod orchestrator;
pub mod recording;
pub mod result;
pub mod stage;
pub mod suite;

pub use action::{Action, ActionKind};
pub use artifacts::ArtifactPaths;
pub use classifier::{classify, ActionClassifier, ActionStage, DEFAULT_WAIT_THRESHOLD_SECS};
pub use config::EngineConfig;
pub use handler::{ActionHandler, HandlerRegistry, LogHandler};
pub use orchestrator::{AppRunner, RunPhase};
pub use recording::{RecordingManager, RecordingSession};
pub use result::TestResult;
pub use stage::{effective_worker_cap, ExecutionContext, StageExecutor, DEFAULT_MAX_WORKERS};
pub use suite::{SuiteConfig, SuiteReport, SuiteRunner};

use atp_platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("平台创建失败: {0}")]
    PlatformCreationFailed(String),

    #[error("平台初始化失败: {0}")]
    PlatformInitFailed(String),

    /// 动作执行失败，消息格式为 `<action> failed: <cause>`
    #[error("{action} failed: {cause}")]
    ActionFailed { action: String, cause: String },

    #[error("recording already active")]
    RecordingAlreadyActive,

    #[error("录屏管理器已关闭")]
    RecordingClosed,

    #[error("未注册的动作处理器: {0}")]
    HandlerNotFound(String),

    #[error("{0}")]
    HandlerError(String),

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(String),
}

impl ExecutorError {
    /// 用失败动作的名称包装错误
    pub fn action_failed(action: &Action, cause: impl std::fmt::Display) -> Self {
        ExecutorError::ActionFailed {
            action: action.label(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
