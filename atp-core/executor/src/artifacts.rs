//! 产物路径管理
//!
//! 每个应用的产物落在 `<output_dir>/<应用名>/` 下:
//! `screenshots/` 存放截图，`videos/` 存放录屏，`result.json` 为测试结果。

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单个应用的产物路径
#[derive(Debug)]
pub struct ArtifactPaths {
    app_dir: PathBuf,
    slug: String,
    counter: AtomicUsize,
}

impl ArtifactPaths {
    pub fn new(output_dir: &Path, app_name: &str) -> Self {
        let slug = slugify(app_name);
        Self {
            app_dir: output_dir.join(&slug),
            slug,
            counter: AtomicUsize::new(0),
        }
    }

    /// 应用产物目录
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.app_dir.join("screenshots")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.app_dir.join("videos")
    }

    /// 测试结果文件路径
    pub fn result_path(&self) -> PathBuf {
        self.app_dir.join("result.json")
    }

    /// 创建产物目录
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.screenshot_dir()).await?;
        tokio::fs::create_dir_all(self.video_dir()).await?;
        Ok(())
    }

    /// 下一个截图路径，`file` 为相对路径时放在截图目录下
    pub fn screenshot_path(&self, file: Option<&str>) -> PathBuf {
        match file {
            Some(file) if Path::new(file).is_absolute() => PathBuf::from(file),
            Some(file) => self.screenshot_dir().join(file),
            None => self
                .screenshot_dir()
                .join(format!("{}.png", self.next_stem())),
        }
    }

    /// 下一个录屏路径
    pub fn video_path(&self) -> PathBuf {
        self.video_dir().join(format!("{}.mp4", self.next_stem()))
    }

    // 并行 worker 同一秒内生成的文件名靠序号区分
    fn next_stem(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!(
            "{}_{:03}_{}",
            self.slug,
            seq,
            Utc::now().format("%Y%m%d_%H%M%S")
        )
    }
}

/// 把应用名转换为可用作目录名的形式
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if slug.is_empty() {
        "app".to_string()
    } else {
        slug
    }
}
