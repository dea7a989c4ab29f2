//! 测试结果模型
//!
//! 每个被测应用恰好一份。运行期间由编排器原地修改，结束时定稿一次。

use atp_platform::{Metrics, PlatformType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{ExecutorError, Result};

/// 测试结果
///
/// 序列化字段顺序固定: name, type, start_time, end_time, duration,
/// metrics, screenshots, videos, success, error。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// 应用名称
    #[serde(rename = "name")]
    pub app_name: String,

    /// 应用平台类型
    #[serde(rename = "type")]
    pub app_type: PlatformType,

    /// 开始时间
    pub start_time: DateTime<Utc>,

    /// 结束时间
    pub end_time: DateTime<Utc>,

    /// 总耗时（秒）
    pub duration: f64,

    /// 平台指标
    #[serde(default)]
    pub metrics: Metrics,

    /// 截图路径 (按产生顺序)
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,

    /// 录屏路径 (按产生顺序)
    #[serde(default)]
    pub videos: Vec<PathBuf>,

    /// 是否成功
    pub success: bool,

    /// 首个失败的错误信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    finished: bool,
}

impl TestResult {
    /// 创建空结果，开始时间为当前时间
    pub fn new(app_name: &str, app_type: PlatformType) -> Self {
        let now = Utc::now();
        Self {
            app_name: app_name.to_string(),
            app_type,
            start_time: now,
            end_time: now,
            duration: 0.0,
            metrics: Metrics::new(),
            screenshots: Vec::new(),
            videos: Vec::new(),
            success: false,
            error: None,
            finished: false,
        }
    }

    pub fn add_screenshot(&mut self, path: PathBuf) {
        self.screenshots.push(path);
    }

    pub fn add_video(&mut self, path: PathBuf) {
        self.videos.push(path);
    }

    /// 合并指标，同名键以新值为准
    pub fn merge_metrics(&mut self, metrics: Metrics) {
        self.metrics.extend(metrics);
    }

    /// 定稿: 记录结束时间、耗时和成功标志，只有第一次调用生效
    pub fn finish(&mut self, error: Option<String>) {
        if self.finished {
            warn!("测试结果 {} 已定稿，忽略重复定稿", self.app_name);
            return;
        }

        self.end_time = Utc::now();
        self.duration = (self.end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.success = error.is_none();
        self.error = error;
        self.finished = true;
    }

    /// 是否已定稿
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    /// 从 JSON 解析 (解析结果视为已定稿)
    pub fn from_json(json: &str) -> Result<Self> {
        let mut result: TestResult =
            serde_json::from_str(json).map_err(|e| ExecutorError::SerdeError(e.to_string()))?;
        result.finished = true;
        Ok(result)
    }

    /// 保存为 JSON 文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self
            .to_json()
            .map_err(|e| ExecutorError::SerdeError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn populated() -> TestResult {
        let mut result = TestResult::new("portal", PlatformType::Web);
        result.add_screenshot(PathBuf::from("out/portal/screenshots/1.png"));
        result.add_screenshot(PathBuf::from("out/portal/screenshots/2.png"));
        result.add_video(PathBuf::from("out/portal/videos/1.mp4"));
        let mut metrics = Metrics::new();
        metrics.insert("load_ms".to_string(), json!(120));
        metrics.insert("fps".to_string(), json!(59.5));
        metrics.insert("browser".to_string(), json!("chromium"));
        metrics.insert("cached".to_string(), json!(true));
        result.merge_metrics(metrics);
        result.finish(Some("click failed: 元素未找到: #a".to_string()));
        result
    }

    #[test]
    fn test_new_result_is_unfinished() {
        let result = TestResult::new("app", PlatformType::Desktop);
        assert!(!result.is_finished());
        assert!(!result.success);
        assert!(result.screenshots.is_empty());
    }

    #[test]
    fn test_finish_only_once() {
        let mut result = TestResult::new("app", PlatformType::Web);
        result.finish(None);
        assert!(result.success);
        let end = result.end_time;

        result.finish(Some("late failure".to_string()));
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.end_time, end);
    }

    #[test]
    fn test_field_order() {
        let json = populated().to_json().unwrap();
        let keys = [
            "\"name\"",
            "\"type\"",
            "\"start_time\"",
            "\"end_time\"",
            "\"duration\"",
            "\"metrics\"",
            "\"screenshots\"",
            "\"videos\"",
            "\"success\"",
            "\"error\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_error_omitted_on_success() {
        let mut result = TestResult::new("app", PlatformType::Mobile);
        result.finish(None);
        let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert!(value.get("error").is_none());
        assert!(value["duration"].is_number());
    }

    #[test]
    fn test_json_roundtrip() {
        let original = populated();
        let parsed = TestResult::from_json(&original.to_json().unwrap()).unwrap();

        assert_eq!(parsed.app_name, original.app_name);
        assert_eq!(parsed.app_type, original.app_type);
        assert_eq!(parsed.success, original.success);
        assert_eq!(parsed.error, original.error);
        assert_eq!(parsed.start_time, original.start_time);
        assert_eq!(parsed.end_time, original.end_time);
        assert_eq!(parsed.duration, original.duration);
        assert_eq!(parsed.screenshots, original.screenshots);
        assert_eq!(parsed.videos, original.videos);
        assert!(parsed.is_finished());

        // 数值指标按值比较
        assert_eq!(parsed.metrics["load_ms"].as_f64(), Some(120.0));
        assert_eq!(parsed.metrics["fps"].as_f64(), Some(59.5));
        assert_eq!(parsed.metrics["browser"], "chromium");
        assert_eq!(parsed.metrics["cached"], true);
    }

    #[test]
    fn test_yaml_export() {
        let yaml = populated().to_yaml().unwrap();
        assert!(yaml.contains("name: portal"));
        assert!(yaml.contains("type: web"));
    }
}
