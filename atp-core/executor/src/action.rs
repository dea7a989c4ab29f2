//! 测试动作定义

use serde::{Deserialize, Serialize};

use crate::DEFAULT_WAIT_THRESHOLD_SECS;

/// 一个脚本化的自动化步骤
///
/// 序列化为扁平结构，由 `type` 字段区分动作类型:
///
/// ```yaml
/// - type: navigate
///   url: https://example.com/login
/// - name: 输入用户名
///   type: fill
///   selector: "#user"
///   value: alice
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// 动作名称 (可选，用于日志和错误信息)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// 动作类型及其参数
    #[serde(flatten)]
    pub kind: ActionKind,

    /// 自由参数 (由扩展处理器解释)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// 动作类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// 导航到 URL / 页面
    Navigate { url: String },

    /// 点击元素
    Click { selector: String },

    /// 填写输入框
    Fill { selector: String, value: String },

    /// 提交表单
    Submit { selector: String },

    /// 等待（秒）
    Wait { seconds: u64 },

    /// 截图，`file` 为空时自动生成文件名
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },

    /// 开始录屏，`duration` 秒后自动停止 (0 表示持续到运行结束)
    Record {
        #[serde(default)]
        duration: u64,
    },

    /// 扩展动作，按名称转发给已注册的处理器
    Extension {
        handler: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl ActionKind {
    /// 动作类型名称
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Click { .. } => "click",
            ActionKind::Fill { .. } => "fill",
            ActionKind::Submit { .. } => "submit",
            ActionKind::Wait { .. } => "wait",
            ActionKind::Screenshot { .. } => "screenshot",
            ActionKind::Record { .. } => "record",
            ActionKind::Extension { handler, .. } => handler,
        }
    }
}

impl Action {
    /// 从动作类型创建未命名、无参数的动作
    pub fn from_kind(kind: ActionKind) -> Self {
        Self {
            name: None,
            kind,
            params: serde_json::Map::new(),
        }
    }

    pub fn navigate(url: &str) -> Self {
        Self::from_kind(ActionKind::Navigate {
            url: url.to_string(),
        })
    }

    pub fn click(selector: &str) -> Self {
        Self::from_kind(ActionKind::Click {
            selector: selector.to_string(),
        })
    }

    pub fn fill(selector: &str, value: &str) -> Self {
        Self::from_kind(ActionKind::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        })
    }

    pub fn submit(selector: &str) -> Self {
        Self::from_kind(ActionKind::Submit {
            selector: selector.to_string(),
        })
    }

    pub fn wait(seconds: u64) -> Self {
        Self::from_kind(ActionKind::Wait { seconds })
    }

    pub fn screenshot() -> Self {
        Self::from_kind(ActionKind::Screenshot { file: None })
    }

    pub fn record(duration: u64) -> Self {
        Self::from_kind(ActionKind::Record { duration })
    }

    pub fn extension(handler: &str) -> Self {
        Self::from_kind(ActionKind::Extension {
            handler: handler.to_string(),
            target: None,
            value: None,
        })
    }

    /// 设置动作名称
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// 添加自由参数
    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// 用于日志和错误信息的标签: 优先使用名称，否则为动作类型
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.kind.as_str().to_string(),
        }
    }

    /// 是否必须单独成为一个串行阶段
    ///
    /// 导航、提交、带时长的录屏以及超过阈值的等待都会修改共享运行状态
    /// 或阻塞调用方可感知的时间。
    pub fn forces_sequential(&self, wait_threshold_secs: u64) -> bool {
        match &self.kind {
            ActionKind::Navigate { .. } | ActionKind::Submit { .. } => true,
            ActionKind::Record { duration } => *duration > 0,
            ActionKind::Wait { seconds } => *seconds > wait_threshold_secs,
            _ => false,
        }
    }

    /// 使用默认阈值判断
    pub fn is_forcing(&self) -> bool {
        self.forces_sequential(DEFAULT_WAIT_THRESHOLD_SECS)
    }

    /// 扩展处理器名称 (非扩展动作返回 None)
    pub fn handler_name(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Extension { handler, .. } => Some(handler),
            _ => None,
        }
    }
}
