//! 扩展动作处理器注册表
//!
//! 内置动作之外的动作 (视觉点击、AI 生成、云同步等) 按处理器名称转发。
//! 引擎只负责: 按名称调用、传播返回的错误、不重试。

use async_trait::async_trait;
use atp_platform::PlatformHandle;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{Action, ActionKind, ExecutorError, Result};

/// 扩展动作处理器
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// 执行动作
    async fn handle(&self, action: &Action, platform: &dyn PlatformHandle) -> anyhow::Result<()>;

    /// 处理器说明
    fn description(&self) -> &str {
        ""
    }
}

/// 处理器注册表
pub struct HandlerRegistry {
    /// 处理器映射
    handlers: Arc<RwLock<HashMap<String, Arc<dyn ActionHandler>>>>,
}

impl HandlerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 创建包含内置处理器的注册表
    pub async fn with_builtins() -> Self {
        let registry = Self::new();
        // 空注册表中注册不会冲突
        let _ = registry.register("log", Arc::new(LogHandler)).await;
        registry
    }

    /// 注册处理器
    pub async fn register(&self, name: &str, handler: Arc<dyn ActionHandler>) -> Result<()> {
        info!("注册动作处理器: {}", name);

        let mut handlers = self.handlers.write().await;

        if handlers.contains_key(name) {
            return Err(ExecutorError::ConfigError(format!(
                "动作处理器 {} 已注册",
                name
            )));
        }

        handlers.insert(name.to_string(), handler);

        Ok(())
    }

    /// 注销处理器
    pub async fn unregister(&self, name: &str) -> Result<()> {
        info!("注销动作处理器: {}", name);

        let mut handlers = self.handlers.write().await;

        handlers
            .remove(name)
            .ok_or_else(|| ExecutorError::HandlerNotFound(name.to_string()))?;

        Ok(())
    }

    /// 获取处理器
    pub async fn get(&self, name: &str) -> Result<Arc<dyn ActionHandler>> {
        debug!("获取动作处理器: {}", name);

        let handlers = self.handlers.read().await;

        handlers
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutorError::HandlerNotFound(name.to_string()))
    }

    /// 列出所有已注册的处理器 (按名称排序)
    pub async fn list(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut names: Vec<String> = handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// 检查处理器是否已注册
    pub async fn is_registered(&self, name: &str) -> bool {
        let handlers = self.handlers.read().await;
        handlers.contains_key(name)
    }

    /// 启动前校验: 所有扩展动作引用的处理器都必须已注册
    pub async fn validate(&self, actions: &[Action]) -> Result<()> {
        let handlers = self.handlers.read().await;

        let missing: BTreeSet<&str> = actions
            .iter()
            .filter_map(Action::handler_name)
            .filter(|name| !handlers.contains_key(*name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExecutorError::ConfigError(format!(
                "未注册的动作处理器: {}",
                missing.into_iter().collect::<Vec<_>>().join(", ")
            )))
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 内置 `log` 处理器: 把动作的 value 写入日志
pub struct LogHandler;

#[async_trait]
impl ActionHandler for LogHandler {
    async fn handle(&self, action: &Action, platform: &dyn PlatformHandle) -> anyhow::Result<()> {
        let message = match &action.kind {
            ActionKind::Extension { value, target, .. } => value
                .as_deref()
                .or(target.as_deref())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };
        info!("[{}] {}", platform.platform_type(), message);
        Ok(())
    }

    fn description(&self) -> &str {
        "把动作的 value 写入日志"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_platform::{PlatformType, SimulatedPlatform};

    struct FailingHandler;

    #[async_trait]
    impl ActionHandler for FailingHandler {
        async fn handle(&self, _action: &Action, _platform: &dyn PlatformHandle) -> anyhow::Result<()> {
            anyhow::bail!("模型不可用")
        }
    }

    #[tokio::test]
    async fn test_registry_builtins() {
        let registry = HandlerRegistry::with_builtins().await;
        assert_eq!(registry.list().await, vec!["log".to_string()]);
        assert!(registry.is_registered("log").await);
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let registry = HandlerRegistry::new();
        registry.register("ai", Arc::new(FailingHandler)).await.unwrap();
        let err = registry.register("ai", Arc::new(FailingHandler)).await.unwrap_err();
        assert!(matches!(err, ExecutorError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_validate_reports_missing_handlers() {
        let registry = HandlerRegistry::with_builtins().await;
        let actions = vec![
            Action::click("#a"),
            Action::extension("log"),
            Action::extension("vision_click"),
            Action::extension("cloud_sync"),
            Action::extension("vision_click"),
        ];

        let err = registry.validate(&actions).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "配置错误: 未注册的动作处理器: cloud_sync, vision_click"
        );

        assert!(registry.validate(&actions[..2]).await.is_ok());
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let registry = HandlerRegistry::new();
        registry.register("ai", Arc::new(FailingHandler)).await.unwrap();
        let platform = SimulatedPlatform::new(PlatformType::Web);

        let handler = registry.get("ai").await.unwrap();
        let err = handler
            .handle(&Action::extension("ai"), &platform)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "模型不可用");
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = HandlerRegistry::with_builtins().await;
        registry.unregister("log").await.unwrap();
        assert!(matches!(
            registry.get("log").await,
            Err(ExecutorError::HandlerNotFound(_))
        ));
    }
}
