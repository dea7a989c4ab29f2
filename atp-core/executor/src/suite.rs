//! 测试套件
//!
//! 一个套件列出若干被测应用和一份共享的动作列表，每个应用依次运行同一份动作。

use atp_platform::{PlatformConfig, PlatformFactory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifacts::slugify;
use crate::{
    Action, ActionClassifier, AppRunner, ArtifactPaths, EngineConfig, ExecutorError,
    HandlerRegistry, Result, StageExecutor, TestResult,
};

/// 套件定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// 套件名称
    pub name: String,

    /// 套件描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 产物根目录，覆盖引擎配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// 被测应用 (按顺序运行)
    pub apps: Vec<PlatformConfig>,

    /// 共享动作列表
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl SuiteConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            output_dir: None,
            apps: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// 添加应用
    pub fn with_app(mut self, app: PlatformConfig) -> Self {
        self.apps.push(app);
        self
    }

    /// 追加动作
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// 设置产物根目录
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// 按扩展名加载 (.json 为 JSON，其余按 YAML 解析)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    /// 从 YAML 文件加载套件
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// 从 YAML 字符串加载套件
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ExecutorError::ConfigError(e.to_string()))
    }

    /// 从 JSON 文件加载套件
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串加载套件
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExecutorError::ConfigError(e.to_string()))
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }

    /// 运行前检查: 至少一个应用、应用名唯一、扩展处理器均已注册
    pub async fn validate(&self, handlers: &HandlerRegistry) -> Result<()> {
        if self.apps.is_empty() {
            return Err(ExecutorError::ConfigError(format!(
                "套件 {} 未配置任何应用",
                self.name
            )));
        }

        // 产物目录按 slug 命名，slug 相同的两个应用会互相覆盖
        let mut seen = HashMap::new();
        for app in &self.apps {
            if app.name.trim().is_empty() {
                return Err(ExecutorError::ConfigError("应用名称不能为空".to_string()));
            }
            if let Some(previous) = seen.insert(slugify(&app.name), app.name.as_str()) {
                return Err(ExecutorError::ConfigError(format!(
                    "应用名称重复: {} 与 {} 使用同一产物目录",
                    previous, app.name
                )));
            }
        }

        handlers.validate(&self.actions).await
    }
}

/// 套件报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// 套件名称
    pub suite_name: String,

    /// 应用总数
    pub total: usize,

    /// 成功数
    pub passed: usize,

    /// 失败数
    pub failed: usize,

    /// 总耗时（秒）
    pub duration: f64,

    /// 各应用的测试结果 (与配置顺序一致)
    pub results: Vec<TestResult>,
}

impl SuiteReport {
    pub fn new(suite_name: &str, results: Vec<TestResult>, duration: f64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            suite_name: suite_name.to_string(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration,
            results,
        }
    }

    /// 是否全部通过
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    /// 写出 `<dir>/report.json`，返回文件路径
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("report.json");
        let json = self
            .to_json()
            .map_err(|e| ExecutorError::SerdeError(e.to_string()))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// 从 JSON 文件读取
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }
}

/// 套件运行器
///
/// 应用严格逐个运行；单个应用失败不会中止整个套件。
pub struct SuiteRunner {
    factory: Arc<dyn PlatformFactory>,
    handlers: Arc<HandlerRegistry>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl SuiteRunner {
    pub fn new(factory: Arc<dyn PlatformFactory>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            factory,
            handlers,
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// 设置引擎配置
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置取消令牌
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 套件实际使用的产物根目录
    pub fn output_dir_for(&self, suite: &SuiteConfig) -> PathBuf {
        suite
            .output_dir
            .clone()
            .unwrap_or_else(|| self.config.output_dir.clone())
    }

    /// 运行套件
    ///
    /// 只有配置错误会返回 `Err`，此时没有任何应用被运行。
    pub async fn run(&self, suite: &SuiteConfig) -> Result<SuiteReport> {
        suite.validate(&self.handlers).await?;

        let output_dir = self.output_dir_for(suite);
        info!(
            "开始运行套件: {} ({} 个应用, {} 个动作)",
            suite.name,
            suite.apps.len(),
            suite.actions.len()
        );
        let start = Instant::now();

        let runner = AppRunner::new(Arc::clone(&self.factory), Arc::clone(&self.handlers))
            .with_classifier(
                ActionClassifier::new().with_wait_threshold(self.config.wait_threshold_secs),
            )
            .with_executor(StageExecutor::new(self.config.max_workers))
            .with_output_dir(&output_dir)
            .with_cancel_token(self.cancel.clone());

        let mut results = Vec::with_capacity(suite.apps.len());
        for (index, app) in suite.apps.iter().enumerate() {
            let result = if self.cancel.is_cancelled() {
                warn!("套件已取消，跳过应用: {}", app.name);
                let mut skipped = TestResult::new(&app.name, app.platform_type);
                skipped.finish(Some(ExecutorError::Cancelled.to_string()));
                skipped
            } else {
                info!("[{}/{}] 运行应用: {}", index + 1, suite.apps.len(), app.name);
                runner.run(app, &suite.actions).await
            };

            if self.config.save_results {
                let path = ArtifactPaths::new(&output_dir, &app.name).result_path();
                if let Err(e) = result.save(&path) {
                    warn!("保存测试结果失败 {}: {}", path.display(), e);
                }
            }

            results.push(result);
        }

        let report = SuiteReport::new(&suite.name, results, start.elapsed().as_secs_f64());
        info!(
            "套件 {} 完成: 通过 {}/{}",
            report.suite_name, report.passed, report.total
        );

        Ok(report)
    }
}
