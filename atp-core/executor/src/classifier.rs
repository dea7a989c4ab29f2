//! 动作分类器
//!
//! 从左到右扫描动作列表，把连续的非强制动作缓冲为一个可并行阶段；
//! 遇到强制动作时先刷新缓冲区，再把强制动作单独作为一个串行阶段。

use serde::Serialize;
use tracing::debug;

use crate::Action;

/// 等待超过该秒数时强制串行
pub const DEFAULT_WAIT_THRESHOLD_SECS: u64 = 2;

/// 动作阶段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionStage {
    /// 有序动作
    pub actions: Vec<Action>,

    /// 是否可并行
    pub parallel: bool,
}

impl ActionStage {
    /// 单个强制动作组成的串行阶段
    pub fn sequential(action: Action) -> Self {
        Self {
            actions: vec![action],
            parallel: false,
        }
    }

    /// 可并行阶段
    pub fn parallel(actions: Vec<Action>) -> Self {
        Self {
            actions,
            parallel: true,
        }
    }

    /// 实际是否并行执行 (单动作阶段总是串行)
    pub fn runs_in_parallel(&self) -> bool {
        self.parallel && self.actions.len() > 1
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// 动作分类器
#[derive(Debug, Clone)]
pub struct ActionClassifier {
    wait_threshold_secs: u64,
}

impl ActionClassifier {
    pub fn new() -> Self {
        Self {
            wait_threshold_secs: DEFAULT_WAIT_THRESHOLD_SECS,
        }
    }

    /// 设置强制串行的等待阈值（秒）
    pub fn with_wait_threshold(mut self, seconds: u64) -> Self {
        self.wait_threshold_secs = seconds;
        self
    }

    pub fn wait_threshold(&self) -> u64 {
        self.wait_threshold_secs
    }

    /// 将动作列表划分为有序阶段
    pub fn classify(&self, actions: &[Action]) -> Vec<ActionStage> {
        let mut stages = Vec::new();
        let mut buffer: Vec<Action> = Vec::new();

        for action in actions {
            if action.forces_sequential(self.wait_threshold_secs) {
                if !buffer.is_empty() {
                    stages.push(ActionStage::parallel(std::mem::take(&mut buffer)));
                }
                stages.push(ActionStage::sequential(action.clone()));
            } else {
                buffer.push(action.clone());
            }
        }

        if !buffer.is_empty() {
            stages.push(ActionStage::parallel(buffer));
        }

        debug!("{} 个动作划分为 {} 个阶段", actions.len(), stages.len());
        stages
    }
}

impl Default for ActionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// 使用默认阈值分类
pub fn classify(actions: &[Action]) -> Vec<ActionStage> {
    ActionClassifier::new().classify(actions)
}
