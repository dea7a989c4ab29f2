//! 引擎配置管理
//!
//! 支持从多个源加载引擎配置:
//! - 环境变量 (优先级最高)
//! - 配置文件 (TOML/YAML/JSON)
//! - 默认值 (优先级最低)
//!
//! 配置文件搜索路径 (按优先级):
//! 1. `ATP_CONFIG` 环境变量指定的路径
//! 2. `./atp.toml`, `./atp.yaml` (当前目录)
//! 3. `~/.config/atp/config.toml` (用户配置目录)
//! 4. `/etc/atp/config.toml` (系统配置目录)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{effective_worker_cap, DEFAULT_MAX_WORKERS, DEFAULT_WAIT_THRESHOLD_SECS};

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 并行阶段的 worker 上限
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// 超过该秒数的 wait 动作强制串行
    #[serde(default = "default_wait_threshold")]
    pub wait_threshold_secs: u64,

    /// 产物根目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 是否为每个应用写出 result.json
    #[serde(default = "default_save_results")]
    pub save_results: bool,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}
fn default_wait_threshold() -> u64 {
    DEFAULT_WAIT_THRESHOLD_SECS
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_save_results() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            wait_threshold_secs: default_wait_threshold(),
            output_dir: default_output_dir(),
            log_level: default_log_level(),
            save_results: default_save_results(),
        }
    }
}

impl EngineConfig {
    /// 加载配置 (自动查找配置文件并应用环境变量)
    pub fn load() -> Result<Self> {
        // 1. 从默认值开始
        let mut config = Self::default();

        // 2. 尝试加载配置文件
        if let Some(path) = Self::find_config_file() {
            tracing::debug!("加载配置文件: {:?}", path);
            config = Self::load_from_file(&path)?;
        } else {
            tracing::debug!("未找到配置文件，使用默认配置");
        }

        // 3. 从环境变量覆盖
        config.apply_env_vars()?;
        config.validate()?;

        Ok(config)
    }

    /// 从指定文件加载，并应用环境变量
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置 (按扩展名选择解析器)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {:?}", path))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {:?}", path))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {:?}", path))?,
            _ => anyhow::bail!("Unsupported config file format: {:?}", path),
        };

        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        // 1. 环境变量指定的路径
        if let Ok(path) = env::var("ATP_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        // 2. 当前目录
        let mut candidates = vec![PathBuf::from("./atp.toml"), PathBuf::from("./atp.yaml")];

        // 3. 用户配置目录
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config/atp/config.toml"));
        }

        // 4. 系统配置目录 (Linux)
        #[cfg(target_os = "linux")]
        candidates.push(PathBuf::from("/etc/atp/config.toml"));

        candidates.into_iter().find(|p| p.exists())
    }

    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// 用键值查找函数覆盖配置项，键名与环境变量一致
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(workers) = lookup("ATP_MAX_WORKERS") {
            self.max_workers = workers
                .trim()
                .parse()
                .context("Invalid ATP_MAX_WORKERS value")?;
        }
        if let Some(threshold) = lookup("ATP_WAIT_THRESHOLD") {
            self.wait_threshold_secs = threshold
                .trim()
                .parse()
                .context("Invalid ATP_WAIT_THRESHOLD value")?;
        }
        if let Some(dir) = lookup("ATP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("ATP_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(save) = lookup("ATP_SAVE_RESULTS") {
            self.save_results = match save.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => anyhow::bail!("Invalid ATP_SAVE_RESULTS value: {}", other),
            };
        }

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }
        if self.output_dir.as_os_str().is_empty() {
            anyhow::bail!("output_dir cannot be empty");
        }
        Ok(())
    }

    /// 实际生效的 worker 上限
    pub fn effective_workers(&self) -> usize {
        effective_worker_cap(self.max_workers)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::to_string_pretty(self).context("Failed to serialize to TOML")?,
            Some("yaml") | Some("yml") => {
                serde_yaml::to_string(self).context("Failed to serialize to YAML")?
            }
            Some("json") => {
                serde_json::to_string_pretty(self).context("Failed to serialize to JSON")?
            }
            _ => anyhow::bail!("Unsupported config file format: {:?}", path),
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.wait_threshold_secs, 2);
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.log_level, "info");
        assert!(config.save_results);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("max_workers = 8\n").unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.wait_threshold_secs, 2);
        assert!(config.save_results);
    }

    #[test]
    fn test_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("ATP_MAX_WORKERS", "2"),
                ("ATP_WAIT_THRESHOLD", "5"),
                ("ATP_OUTPUT_DIR", "/tmp/atp-out"),
                ("ATP_SAVE_RESULTS", "false"),
            ]))
            .unwrap();

        assert_eq!(config.max_workers, 2);
        assert_eq!(config.wait_threshold_secs, 5);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/atp-out"));
        assert!(!config.save_results);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_override_is_error() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("ATP_MAX_WORKERS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ATP_MAX_WORKERS"));

        let err = config
            .apply_overrides(lookup_from(&[("ATP_SAVE_RESULTS", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("ATP_SAVE_RESULTS"));
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.output_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers_bounded() {
        let mut config = EngineConfig::default();
        config.max_workers = 10_000;
        assert!(config.effective_workers() >= 1);
        assert!(config.effective_workers() <= 10_000);
    }

    #[test]
    fn test_save_and_load_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.max_workers = 3;
        config.log_level = "debug".to_string();

        for name in ["atp.toml", "atp.yaml", "atp.json"] {
            let path = dir.path().join(name);
            config.save_to_file(&path).unwrap();
            let loaded = EngineConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, config, "{}", name);
        }

        let bad = dir.path().join("atp.ini");
        assert!(config.save_to_file(&bad).is_err());
    }
}
