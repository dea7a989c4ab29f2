//! 应用平台配置

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::PlatformType;

/// 单个被测应用的配置，初始化平台句柄时传入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// 应用名称 (同时用作产物子目录名)
    pub name: String,

    /// 平台类型
    #[serde(rename = "type")]
    pub platform_type: PlatformType,

    /// 目标: Web 为起始 URL，Desktop 为可执行文件路径，Mobile 为包名
    #[serde(default)]
    pub target: Option<String>,

    /// 是否无界面运行 (默认: true)
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// 后端特定选项
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

fn default_headless() -> bool {
    true
}

impl PlatformConfig {
    pub fn new(name: &str, platform_type: PlatformType) -> Self {
        Self {
            name: name.to_string(),
            platform_type,
            target: None,
            headless: default_headless(),
            options: BTreeMap::new(),
        }
    }

    /// 设置目标
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    /// 设置后端选项
    pub fn with_option(mut self, key: &str, value: serde_json::Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }
}
