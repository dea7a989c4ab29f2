//! Config 命令处理

use anyhow::{Context, Result};
use colored::Colorize;

use atp_executor::EngineConfig;

pub fn handle(action: crate::ConfigAction, config: &EngineConfig) -> Result<()> {
    match action {
        crate::ConfigAction::Show => {
            let content = toml::to_string_pretty(config).context("序列化配置失败")?;
            println!("{}", content);
            println!(
                "{} {}",
                "实际并行上限:".bright_black(),
                config.effective_workers()
            );
            Ok(())
        }
        crate::ConfigAction::Init { path } => {
            if path.exists() {
                anyhow::bail!("配置文件已存在: {}", path.display());
            }
            EngineConfig::default().save_to_file(&path)?;
            println!(
                "{} 已写出默认配置: {}",
                "✓".green().bold(),
                path.display().to_string().cyan()
            );
            Ok(())
        }
    }
}
