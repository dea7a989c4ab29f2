//! 平台抽象接口

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{PlatformConfig, PlatformError, Result};

/// 平台指标 (值对执行引擎不透明)
pub type Metrics = BTreeMap<String, serde_json::Value>;

/// 应用平台类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// 浏览器中的 Web 应用
    Web,

    /// 桌面应用
    Desktop,

    /// 移动端应用
    Mobile,
}

impl PlatformType {
    /// 所有已知平台类型
    pub const ALL: [PlatformType; 3] = [PlatformType::Web, PlatformType::Desktop, PlatformType::Mobile];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Web => "web",
            PlatformType::Desktop => "desktop",
            PlatformType::Mobile => "mobile",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(PlatformType::Web),
            "desktop" => Ok(PlatformType::Desktop),
            "mobile" => Ok(PlatformType::Mobile),
            other => Err(PlatformError::UnsupportedType(other.to_string())),
        }
    }
}

/// 平台句柄 trait
///
/// 一个句柄对应一次应用运行。并行阶段中多个 worker 共享同一个句柄，
/// 因此所有方法都只取 `&self`，实现方需要自行处理内部同步。
#[async_trait]
pub trait PlatformHandle: Send + Sync {
    /// 一次性初始化 (启动浏览器 / 应用 / 连接设备)
    async fn initialize(&self, config: &PlatformConfig) -> Result<()>;

    /// 导航到 URL 或页面
    async fn navigate(&self, url: &str) -> Result<()>;

    /// 点击元素
    async fn click(&self, selector: &str) -> Result<()>;

    /// 填写输入框
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// 提交表单
    async fn submit(&self, selector: &str) -> Result<()>;

    /// 等待
    async fn wait(&self, duration: Duration) -> Result<()>;

    /// 截图到指定路径
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// 开始录屏
    async fn start_recording(&self, path: &Path) -> Result<()>;

    /// 停止录屏 (空闲时调用必须安全)
    async fn stop_recording(&self) -> Result<()>;

    /// 获取运行指标，仅在收尾阶段调用一次
    async fn metrics(&self) -> Metrics;

    /// 释放底层资源，每次运行恰好调用一次
    async fn close(&self) -> Result<()>;

    /// 获取平台类型
    fn platform_type(&self) -> PlatformType;
}

/// 平台构建器 trait
///
/// 用于创建平台句柄实例
pub trait PlatformBuilder: Send + Sync {
    /// 构建平台句柄
    fn build(&self) -> Arc<dyn PlatformHandle>;

    /// 获取平台类型
    fn platform_type(&self) -> PlatformType;
}

/// 平台工厂 trait
#[async_trait]
pub trait PlatformFactory: Send + Sync {
    /// 根据平台类型创建句柄，不支持的类型返回 [`PlatformError::UnsupportedType`]
    async fn create(&self, platform_type: PlatformType) -> Result<Arc<dyn PlatformHandle>>;
}
