//! CLI 通用输出格式化模块
//!
//! 提供 table/json/yaml 三种输出格式的通用实现

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use atp_executor::TestResult;

/// 可输出为表格行的数据 trait
pub trait TableRow {
    /// 返回表格列标题
    fn headers() -> Vec<&'static str>;

    /// 返回该项的表格行数据
    fn row(&self) -> Vec<String>;
}

impl TableRow for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["应用", "类型", "结果", "耗时(s)", "截图", "录屏"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.app_name.clone(),
            self.app_type.to_string(),
            if self.success { "PASS" } else { "FAIL" }.to_string(),
            format!("{:.3}", self.duration),
            self.screenshots.len().to_string(),
            self.videos.len().to_string(),
        ]
    }
}

/// 表格格式输出
pub fn print_table<T: TableRow>(items: &[T]) {
    let headers = T::headers();

    // 打印表头
    let header_line: String = headers
        .iter()
        .map(|h| format!("{:<16}", h))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", header_line.bold());
    println!("{}", "-".repeat(header_line.chars().count()));

    // 打印数据行
    for item in items {
        let row_line: String = item
            .row()
            .iter()
            .map(|c| format!("{:<16}", c))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", row_line);
    }
}

/// JSON 格式输出
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// YAML 格式输出
pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// 打印失败应用的错误信息
pub fn print_failures(results: &[TestResult]) {
    let failures: Vec<_> = results.iter().filter(|r| !r.success).collect();
    if failures.is_empty() {
        return;
    }

    println!();
    println!("{}", "失败详情:".red().bold());
    for result in failures {
        println!(
            "  {} {}: {}",
            "✗".red(),
            result.app_name.cyan(),
            result.error.as_deref().unwrap_or("未知错误")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_platform::PlatformType;

    #[test]
    fn test_result_row_matches_headers() {
        let mut result = TestResult::new("portal", PlatformType::Web);
        result.add_screenshot("a.png".into());
        result.finish(None);

        let row = result.row();
        assert_eq!(row.len(), TestResult::headers().len());
        assert_eq!(row[0], "portal");
        assert_eq!(row[1], "web");
        assert_eq!(row[2], "PASS");
        assert_eq!(row[4], "1");
    }
}
