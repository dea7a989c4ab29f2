//! Run 命令处理

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use atp_executor::{EngineConfig, SuiteRunner};

use super::common::{build_handlers, build_platforms, load_suite, spinner};
use super::output::{print_failures, print_table};

pub async fn handle(
    mut config: EngineConfig,
    suite_path: &Path,
    output: Option<PathBuf>,
    max_workers: Option<usize>,
) -> Result<()> {
    let mut suite = load_suite(suite_path)?;

    // 命令行参数覆盖配置
    if let Some(output) = output {
        suite.output_dir = Some(output);
    }
    if let Some(max_workers) = max_workers {
        config.max_workers = max_workers;
    }
    config.validate()?;

    // 显示套件信息
    println!();
    if let Some(desc) = &suite.description {
        println!("描述: {}", desc.bright_black());
    }
    println!("应用数: {}", suite.apps.len().to_string().yellow());
    println!("动作数: {}", suite.actions.len().to_string().yellow());
    println!(
        "并行上限: {}",
        config.effective_workers().to_string().yellow()
    );
    println!();

    // Ctrl-C 在阶段之间取消套件
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，当前阶段结束后停止");
            trigger.cancel();
        }
    });

    let runner = SuiteRunner::new(build_platforms().await?, build_handlers().await)
        .with_config(config)
        .with_cancel_token(cancel);
    let output_dir = runner.output_dir_for(&suite);

    let spinner = spinner(format!("运行套件: {}", suite.name))?;
    let report = runner
        .run(&suite)
        .await
        .with_context(|| format!("套件 {} 无法运行", suite.name))?;
    spinner.finish_and_clear();

    // 显示执行报告
    println!("\n{}", "=".repeat(60));
    println!("{}", "执行报告".bold());
    println!("{}", "=".repeat(60));
    println!();

    println!("套件名称: {}", report.suite_name.cyan().bold());
    println!("执行时间: {:.3} s", report.duration);
    println!();
    println!("应用统计:");
    println!("  总数: {}", report.total.to_string().bright_blue());
    println!("  成功: {}", report.passed.to_string().green());
    println!("  失败: {}", report.failed.to_string().red());
    println!();

    print_table(&report.results);
    print_failures(&report.results);

    let report_path = report.save(&output_dir)?;
    println!();
    println!("报告已保存: {}", report_path.display().to_string().cyan());

    if report.all_passed() {
        println!("\n{} 全部通过", "✓".green().bold());
        Ok(())
    } else {
        anyhow::bail!("{}/{} 个应用失败", report.failed, report.total)
    }
}
