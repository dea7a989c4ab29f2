//! Report 命令处理

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use atp_executor::{SuiteReport, TestResult};

use super::output::{print_failures, print_json, print_table, print_yaml};

pub async fn handle(action: crate::ReportAction) -> Result<()> {
    match action {
        crate::ReportAction::Show { file, format } => show_report(&file, &format),
    }
}

/// 报告文件内容: 套件报告或单个应用结果
enum ReportFile {
    Suite(SuiteReport),
    Single(TestResult),
}

fn read_report(path: &Path) -> Result<ReportFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取报告文件失败: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("报告文件不是有效的 JSON: {}", path.display()))?;

    if value.get("suite_name").is_some() {
        let report = serde_json::from_value(value).context("解析套件报告失败")?;
        Ok(ReportFile::Suite(report))
    } else {
        let result = TestResult::from_json(&content).context("解析测试结果失败")?;
        Ok(ReportFile::Single(result))
    }
}

fn show_report(path: &Path, format: &str) -> Result<()> {
    let report = read_report(path)?;

    match (format, &report) {
        ("json", ReportFile::Suite(r)) => print_json(r),
        ("json", ReportFile::Single(r)) => print_json(r),
        ("yaml", ReportFile::Suite(r)) => print_yaml(r),
        ("yaml", ReportFile::Single(r)) => print_yaml(r),
        ("table", ReportFile::Suite(r)) => {
            println!("套件名称: {}", r.suite_name.cyan().bold());
            println!("执行时间: {:.3} s", r.duration);
            println!(
                "结果: {} 通过, {} 失败, 共 {}",
                r.passed.to_string().green(),
                r.failed.to_string().red(),
                r.total
            );
            println!();
            print_table(&r.results);
            print_failures(&r.results);
            Ok(())
        }
        ("table", ReportFile::Single(r)) => {
            show_single(r);
            Ok(())
        }
        (other, _) => anyhow::bail!("不支持的输出格式: {} (可选 table/json/yaml)", other),
    }
}

fn show_single(result: &TestResult) {
    let status = if result.success {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };

    println!("应用: {} ({})", result.app_name.cyan().bold(), result.app_type);
    println!("结果: {}", status);
    println!(
        "时间: {} → {}",
        result.start_time.format("%Y-%m-%d %H:%M:%S%.3f"),
        result.end_time.format("%Y-%m-%d %H:%M:%S%.3f")
    );
    println!("耗时: {:.3} s", result.duration);
    if let Some(error) = &result.error {
        println!("错误: {}", error.red());
    }

    if !result.metrics.is_empty() {
        println!();
        println!("指标:");
        for (key, value) in &result.metrics {
            println!("  {}: {}", key, value);
        }
    }

    for (title, paths) in [("截图", &result.screenshots), ("录屏", &result.videos)] {
        if paths.is_empty() {
            continue;
        }
        println!();
        println!("{}:", title);
        for path in paths {
            println!("  {}", path.display().to_string().bright_black());
        }
    }
}
