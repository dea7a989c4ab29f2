//! ATP 平台层
//!
//! 提供统一的自动化后端抽象接口 (Web / Desktop / Mobile)。
//! 执行引擎只消费这里定义的接口，具体后端由外部实现并注册到 [`PlatformRegistry`]。

pub mod config;
pub mod registry;
pub mod simulated;
pub mod traits;

pub use config::PlatformConfig;
pub use registry::PlatformRegistry;
pub use simulated::{PlatformCall, SimulatedBuilder, SimulatedPlatform};
pub use traits::{Metrics, PlatformBuilder, PlatformFactory, PlatformHandle, PlatformType};

use thiserror::Error;

/// 平台层错误
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("平台 {0} 已注册")]
    AlreadyRegistered(String),

    #[error("平台初始化失败: {0}")]
    InitializationFailed(String),

    #[error("元素未找到: {0}")]
    ElementNotFound(String),

    #[error("操作失败: {0}")]
    OperationFailed(String),

    #[error("录屏失败: {0}")]
    RecordingFailed(String),

    #[error("超时")]
    Timeout,

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
