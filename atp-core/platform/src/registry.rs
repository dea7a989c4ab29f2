//! 平台注册表

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{PlatformBuilder, PlatformError, PlatformFactory, PlatformHandle, PlatformType, Result};

/// 平台注册表
///
/// 管理所有已注册的平台后端，每种平台类型对应一个构建器
pub struct PlatformRegistry {
    /// 平台构建器映射
    builders: Arc<RwLock<HashMap<PlatformType, Box<dyn PlatformBuilder>>>>,
}

impl PlatformRegistry {
    /// 创建新的平台注册表
    pub fn new() -> Self {
        Self {
            builders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册平台后端
    pub async fn register(&self, builder: Box<dyn PlatformBuilder>) -> Result<()> {
        let platform_type = builder.platform_type();
        info!("注册平台: {}", platform_type);

        let mut builders = self.builders.write().await;

        if builders.contains_key(&platform_type) {
            return Err(PlatformError::AlreadyRegistered(platform_type.to_string()));
        }

        builders.insert(platform_type, builder);

        Ok(())
    }

    /// 注销平台后端
    pub async fn unregister(&self, platform_type: PlatformType) -> Result<()> {
        info!("注销平台: {}", platform_type);

        let mut builders = self.builders.write().await;

        builders
            .remove(&platform_type)
            .ok_or_else(|| PlatformError::UnsupportedType(platform_type.to_string()))?;

        Ok(())
    }

    /// 列出所有已注册的平台类型
    pub async fn list(&self) -> Vec<PlatformType> {
        let builders = self.builders.read().await;
        let mut types: Vec<PlatformType> = builders.keys().copied().collect();
        types.sort();
        types
    }

    /// 检查平台是否已注册
    pub async fn is_registered(&self, platform_type: PlatformType) -> bool {
        let builders = self.builders.read().await;
        builders.contains_key(&platform_type)
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformFactory for PlatformRegistry {
    async fn create(&self, platform_type: PlatformType) -> Result<Arc<dyn PlatformHandle>> {
        debug!("创建平台句柄: {}", platform_type);

        let builders = self.builders.read().await;

        let builder = builders
            .get(&platform_type)
            .ok_or_else(|| PlatformError::UnsupportedType(platform_type.to_string()))?;

        Ok(builder.build())
    }
}
