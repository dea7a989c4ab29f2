//! Plan / Validate 命令处理

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use atp_executor::{ActionClassifier, EngineConfig};

use super::common::{build_handlers, load_suite};

/// 显示套件的阶段划分
pub async fn plan(config: &EngineConfig, suite_path: &Path) -> Result<()> {
    let suite = load_suite(suite_path)?;
    let classifier = ActionClassifier::new().with_wait_threshold(config.wait_threshold_secs);
    let stages = classifier.classify(&suite.actions);

    println!();
    println!(
        "{} 个动作划分为 {} 个阶段 (wait 阈值 {}s):",
        suite.actions.len().to_string().yellow(),
        stages.len().to_string().yellow(),
        classifier.wait_threshold()
    );
    println!();

    for (index, stage) in stages.iter().enumerate() {
        let mode = if stage.runs_in_parallel() {
            "并行".green()
        } else {
            "串行".blue()
        };
        println!("阶段 {} [{}]", (index + 1).to_string().bold(), mode);
        for action in &stage.actions {
            println!("  - {}", describe(action));
        }
    }

    Ok(())
}

/// 校验套件定义
pub async fn validate(suite_path: &Path) -> Result<()> {
    let suite = load_suite(suite_path)?;
    let handlers = build_handlers().await;

    suite
        .validate(&handlers)
        .await
        .with_context(|| format!("套件 {} 校验失败", suite.name))?;

    println!(
        "{} 套件有效: {} 个应用, {} 个动作",
        "✓".green().bold(),
        suite.apps.len(),
        suite.actions.len()
    );
    Ok(())
}

fn describe(action: &atp_executor::Action) -> String {
    let label = action.label();
    let kind = action.kind.as_str();
    if label == kind {
        label.cyan().to_string()
    } else {
        format!("{} ({})", label.cyan(), kind)
    }
}
