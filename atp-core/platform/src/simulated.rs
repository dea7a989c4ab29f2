//! 模拟平台后端
//!
//! 不连接任何真实的浏览器 / 桌面 / 设备，只记录调用日志。
//! 用于 `atp run` 的演练模式以及执行引擎的测试。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{Metrics, PlatformBuilder, PlatformConfig, PlatformError, PlatformHandle, PlatformType, Result};

/// 一次平台调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Initialize(String),
    Navigate(String),
    Click(String),
    Fill(String, String),
    Submit(String),
    Wait(Duration),
    Screenshot(PathBuf),
    StartRecording(PathBuf),
    StopRecording,
    Metrics,
    Close,
}

impl PlatformCall {
    /// 调用的操作名称
    pub fn operation(&self) -> &'static str {
        match self {
            PlatformCall::Initialize(_) => "initialize",
            PlatformCall::Navigate(_) => "navigate",
            PlatformCall::Click(_) => "click",
            PlatformCall::Fill(_, _) => "fill",
            PlatformCall::Submit(_) => "submit",
            PlatformCall::Wait(_) => "wait",
            PlatformCall::Screenshot(_) => "screenshot",
            PlatformCall::StartRecording(_) => "start_recording",
            PlatformCall::StopRecording => "stop_recording",
            PlatformCall::Metrics => "metrics",
            PlatformCall::Close => "close",
        }
    }

    fn target(&self) -> Option<String> {
        match self {
            PlatformCall::Initialize(name) => Some(name.clone()),
            PlatformCall::Navigate(url) => Some(url.clone()),
            PlatformCall::Click(selector)
            | PlatformCall::Fill(selector, _)
            | PlatformCall::Submit(selector) => Some(selector.clone()),
            PlatformCall::Screenshot(path) | PlatformCall::StartRecording(path) => {
                Some(path.display().to_string())
            }
            _ => None,
        }
    }
}

/// 预设失败规则
#[derive(Debug, Clone)]
struct FailureRule {
    operation: String,
    target: Option<String>,
}

impl FailureRule {
    fn matches(&self, call: &PlatformCall) -> bool {
        if self.operation != call.operation() {
            return false;
        }
        match &self.target {
            Some(expected) => call.target().as_deref() == Some(expected.as_str()),
            None => true,
        }
    }
}

/// 模拟平台
pub struct SimulatedPlatform {
    platform_type: PlatformType,

    /// 调用日志 (按调用顺序)
    calls: Mutex<Vec<PlatformCall>>,

    /// 预设失败规则
    failures: Vec<FailureRule>,

    /// 预设指标
    metrics: Metrics,

    /// 每个 UI 操作的模拟耗时
    latency: Duration,

    /// 是否真实写出截图 / 录屏占位文件
    write_artifacts: bool,

    recording: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SimulatedPlatform {
    /// 创建新的模拟平台
    pub fn new(platform_type: PlatformType) -> Self {
        Self {
            platform_type,
            calls: Mutex::new(Vec::new()),
            failures: Vec::new(),
            metrics: Metrics::new(),
            latency: Duration::ZERO,
            write_artifacts: false,
            recording: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// 让指定操作失败，`target` 为 None 时匹配该操作的所有调用
    pub fn fail_on(mut self, operation: &str, target: Option<&str>) -> Self {
        self.failures.push(FailureRule {
            operation: operation.to_string(),
            target: target.map(str::to_string),
        });
        self
    }

    /// 设置返回的指标
    pub fn with_metric(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    /// 设置每个 UI 操作的模拟耗时
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 截图和录屏时写出占位文件
    pub fn with_artifacts(mut self, write: bool) -> Self {
        self.write_artifacts = write;
        self
    }

    /// 获取调用日志快照
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().await.clone()
    }

    /// 统计某个操作的调用次数
    pub async fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// 观测到的最大并发 UI 操作数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 当前是否在录屏
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// 记录调用并检查预设失败
    async fn record(&self, call: PlatformCall) -> Result<()> {
        debug!("[simulated:{}] {:?}", self.platform_type, call);

        let failed = self.failures.iter().any(|rule| rule.matches(&call));
        let operation = call.operation();
        let target = call.target();
        self.calls.lock().await.push(call);

        if failed {
            let detail = match target {
                Some(target) => format!("{} {}", operation, target),
                None => operation.to_string(),
            };
            return Err(PlatformError::OperationFailed(format!("模拟失败: {}", detail)));
        }

        Ok(())
    }

    /// 模拟一次耗时的 UI 操作
    async fn perform(&self, call: PlatformCall) -> Result<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.record(call).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn write_placeholder(&self, path: &Path) -> Result<()> {
        if !self.write_artifacts {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, b"").await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformHandle for SimulatedPlatform {
    async fn initialize(&self, config: &PlatformConfig) -> Result<()> {
        info!("[simulated:{}] 初始化应用: {}", self.platform_type, config.name);
        self.record(PlatformCall::Initialize(config.name.clone()))
            .await
            .map_err(|e| PlatformError::InitializationFailed(e.to_string()))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.perform(PlatformCall::Navigate(url.to_string())).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.perform(PlatformCall::Click(selector.to_string())).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.perform(PlatformCall::Fill(selector.to_string(), value.to_string()))
            .await
    }

    async fn submit(&self, selector: &str) -> Result<()> {
        self.perform(PlatformCall::Submit(selector.to_string())).await
    }

    async fn wait(&self, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        self.record(PlatformCall::Wait(duration)).await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.perform(PlatformCall::Screenshot(path.to_path_buf()))
            .await?;
        self.write_placeholder(path).await
    }

    async fn start_recording(&self, path: &Path) -> Result<()> {
        self.record(PlatformCall::StartRecording(path.to_path_buf()))
            .await
            .map_err(|e| PlatformError::RecordingFailed(e.to_string()))?;
        self.write_placeholder(path).await?;
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_recording(&self) -> Result<()> {
        self.recording.store(false, Ordering::SeqCst);
        self.record(PlatformCall::StopRecording)
            .await
            .map_err(|e| PlatformError::RecordingFailed(e.to_string()))
    }

    async fn metrics(&self) -> Metrics {
        let _ = self.record(PlatformCall::Metrics).await;
        let mut metrics = self.metrics.clone();
        let calls = self.calls.lock().await.len();
        metrics.insert("simulated_calls".to_string(), serde_json::json!(calls));
        metrics
    }

    async fn close(&self) -> Result<()> {
        info!("[simulated:{}] 关闭", self.platform_type);
        self.recording.store(false, Ordering::SeqCst);
        self.record(PlatformCall::Close).await
    }

    fn platform_type(&self) -> PlatformType {
        self.platform_type
    }
}

/// 模拟平台构建器
pub struct SimulatedBuilder {
    platform_type: PlatformType,

    /// 共享实例 (测试中用于事后检查调用日志)
    shared: Option<Arc<SimulatedPlatform>>,

    write_artifacts: bool,
}

impl SimulatedBuilder {
    /// 每次构建一个新的模拟平台
    pub fn new(platform_type: PlatformType) -> Self {
        Self {
            platform_type,
            shared: None,
            write_artifacts: false,
        }
    }

    /// 每次构建都返回同一个实例
    pub fn shared(platform: Arc<SimulatedPlatform>) -> Self {
        Self {
            platform_type: platform.platform_type,
            shared: Some(platform),
            write_artifacts: false,
        }
    }

    /// 新建的实例写出占位产物文件
    pub fn with_artifacts(mut self, write: bool) -> Self {
        self.write_artifacts = write;
        self
    }
}

impl PlatformBuilder for SimulatedBuilder {
    fn build(&self) -> Arc<dyn PlatformHandle> {
        match &self.shared {
            Some(platform) => platform.clone(),
            None => Arc::new(
                SimulatedPlatform::new(self.platform_type).with_artifacts(self.write_artifacts),
            ),
        }
    }

    fn platform_type(&self) -> PlatformType {
        self.platform_type
    }
}
