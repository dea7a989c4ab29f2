//! CLI 公共工具函数

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use atp_executor::{HandlerRegistry, SuiteConfig};
use atp_platform::{PlatformRegistry, PlatformType, SimulatedBuilder};

/// 创建转圈进度提示
pub fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// 加载套件文件，仅支持 .yaml/.yml/.json
pub fn load_suite(path: &Path) -> Result<SuiteConfig> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") | Some("json") => {}
        _ => anyhow::bail!("不支持的套件文件格式，仅支持 .yaml/.yml 或 .json"),
    }

    let spinner = spinner(format!("加载套件: {}", path.display()))?;
    let suite = SuiteConfig::load(path)
        .with_context(|| format!("加载套件文件失败: {}", path.display()))?;
    spinner.finish_with_message(format!(
        "{} 套件加载成功: {}",
        "✓".green().bold(),
        suite.name.cyan()
    ));

    Ok(suite)
}

/// 平台注册表: 每种平台类型都注册模拟后端
pub async fn build_platforms() -> Result<Arc<PlatformRegistry>> {
    let registry = PlatformRegistry::new();
    for platform_type in PlatformType::ALL {
        registry
            .register(Box::new(
                SimulatedBuilder::new(platform_type).with_artifacts(true),
            ))
            .await
            .with_context(|| format!("注册平台后端失败: {}", platform_type))?;
    }
    Ok(Arc::new(registry))
}

/// 扩展处理器注册表 (内置处理器)
pub async fn build_handlers() -> Arc<HandlerRegistry> {
    Arc::new(HandlerRegistry::with_builtins().await)
}
