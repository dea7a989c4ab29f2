//! ATP CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atp_executor::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(name = "atp")]
#[command(about = "ATP - UI 自动化测试调度与执行引擎", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别 (默认取配置文件中的 log_level)
    #[arg(short, long)]
    log_level: Option<String>,

    /// 引擎配置文件 (TOML/YAML/JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行测试套件
    Run {
        /// 套件文件路径 (.yaml/.yml/.json)
        suite: PathBuf,

        /// 产物根目录 (覆盖配置)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 并行 worker 上限 (覆盖配置)
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// 显示套件的阶段划分
    Plan {
        /// 套件文件路径
        suite: PathBuf,
    },

    /// 校验套件定义
    Validate {
        /// 套件文件路径
        suite: PathBuf,
    },

    /// 测试报告管理
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },

    /// 引擎配置管理
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ReportAction {
    /// 显示报告 (report.json 或 result.json)
    Show {
        /// 报告文件路径
        file: PathBuf,

        /// 输出格式 (table/json/yaml)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 显示生效的配置
    Show,

    /// 写出默认配置文件
    Init {
        /// 目标路径
        #[arg(default_value = "./atp.toml")]
        path: PathBuf,
    },
}

/// 加载引擎配置: 命令行指定的文件优先，否则按默认搜索路径查找
fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from_path(path),
        None => EngineConfig::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    // 初始化日志: RUST_LOG 优先，其次命令行，最后配置文件
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ATP CLI 启动");

    // 处理命令
    match cli.command {
        Commands::Run {
            suite,
            output,
            max_workers,
        } => commands::run::handle(config, &suite, output, max_workers).await?,
        Commands::Plan { suite } => commands::plan::plan(&config, &suite).await?,
        Commands::Validate { suite } => commands::plan::validate(&suite).await?,
        Commands::Report { action } => commands::report::handle(action).await?,
        Commands::Config { action } => commands::config::handle(action, &config)?,
    }

    Ok(())
}
