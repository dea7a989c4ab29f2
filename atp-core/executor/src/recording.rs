//! 录屏生命周期管理
//!
//! 状态: Idle → Recording → Idle。
//!
//! 会话状态只由一把锁持有，定时器和显式停止都经由 `stop_session`，
//! 因此同一个会话的 `stop_recording` 只会被调用一次。
//! 自动停止定时器可取消、可等待，`shutdown` 会等它退出后才返回。

use atp_platform::PlatformHandle;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{ArtifactPaths, ExecutorError, Result};

/// 录屏会话
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    /// 会话 ID
    pub id: Uuid,

    /// 输出路径
    pub path: PathBuf,

    /// 开始时间
    pub started_at: DateTime<Utc>,

    /// 自动停止时长
    pub duration: Option<Duration>,
}

struct ActiveRecording {
    session: RecordingSession,

    /// 自动停止定时器取消通道
    cancel: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct RecordingState {
    active: Option<ActiveRecording>,

    /// `shutdown` 之后不再接受新的录屏
    closed: bool,
}

/// 录屏管理器
pub struct RecordingManager {
    platform: Arc<dyn PlatformHandle>,
    artifacts: Arc<ArtifactPaths>,

    /// 当前活跃会话
    state: Mutex<RecordingState>,

    /// 自动停止定时器任务
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl RecordingManager {
    pub fn new(platform: Arc<dyn PlatformHandle>, artifacts: Arc<ArtifactPaths>) -> Self {
        Self {
            platform,
            artifacts,
            state: Mutex::new(RecordingState::default()),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// 开始录屏
    ///
    /// 已有活跃会话时拒绝，返回 [`ExecutorError::RecordingAlreadyActive`]；
    /// `shutdown` 之后返回 [`ExecutorError::RecordingClosed`]。
    /// 指定 `duration` 时启动自动停止定时器。
    pub async fn start(self: &Arc<Self>, duration: Option<Duration>) -> Result<PathBuf> {
        let mut state = self.state.lock().await;

        if state.closed {
            warn!("录屏管理器已关闭，拒绝新的录屏请求");
            return Err(ExecutorError::RecordingClosed);
        }
        if let Some(active) = state.active.as_ref() {
            warn!(
                "录屏 {} 仍在进行，拒绝新的录屏请求",
                active.session.path.display()
            );
            return Err(ExecutorError::RecordingAlreadyActive);
        }

        let path = self.artifacts.video_path();
        self.platform.start_recording(&path).await?;

        let session = RecordingSession {
            id: Uuid::new_v4(),
            path: path.clone(),
            started_at: Utc::now(),
            duration,
        };

        let cancel = match duration {
            Some(duration) => {
                let (tx, rx) = oneshot::channel();
                let handle = self.spawn_timer(session.id, duration, rx);
                self.timers.lock().await.push(handle);
                Some(tx)
            }
            None => None,
        };

        info!(
            "开始录屏: {} (自动停止: {:?})",
            path.display(),
            duration
        );
        state.active = Some(ActiveRecording { session, cancel });

        Ok(path)
    }

    fn spawn_timer(
        self: &Arc<Self>,
        session_id: Uuid,
        duration: Duration,
        mut cancel: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    debug!("录屏 {} 到达时长 {:?}", session_id, duration);
                    manager.stop_session(Some(session_id)).await;
                }
                _ = &mut cancel => {
                    debug!("录屏 {} 的自动停止定时器已取消", session_id);
                }
            }
        })
    }

    /// 停止会话，`expected` 为 None 时停止任意活跃会话
    ///
    /// 返回是否真正执行了停止。
    async fn stop_session(&self, expected: Option<Uuid>) -> bool {
        let mut state = self.state.lock().await;

        let matches = match (state.active.as_ref(), expected) {
            (None, _) => false,
            (Some(active), Some(id)) => active.session.id == id,
            (Some(_), None) => true,
        };
        if !matches {
            return false;
        }

        let Some(active) = state.active.take() else {
            return false;
        };

        if let Some(cancel) = active.cancel {
            let _ = cancel.send(());
        }

        // 停止失败只记录日志
        match self.platform.stop_recording().await {
            Ok(()) => info!("录屏已停止: {}", active.session.path.display()),
            Err(e) => warn!("停止录屏失败 {}: {}", active.session.path.display(), e),
        }

        true
    }

    /// 停止当前活跃录屏 (空闲时为空操作)
    pub async fn stop_active(&self) -> bool {
        self.stop_session(None).await
    }

    /// 运行结束时调用: 拒绝后续录屏，停止活跃录屏并等待所有定时器退出
    pub async fn shutdown(&self) -> bool {
        self.state.lock().await.closed = true;
        let stopped = self.stop_active().await;

        let timers = std::mem::take(&mut *self.timers.lock().await);
        for timer in timers {
            if let Err(e) = timer.await {
                warn!("录屏定时器异常退出: {}", e);
            }
        }

        stopped
    }

    /// 是否有活跃录屏
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    /// 当前活跃会话
    pub async fn active_session(&self) -> Option<RecordingSession> {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_platform::{PlatformType, SimulatedPlatform};
    use std::path::Path;

    fn manager(platform: Arc<SimulatedPlatform>) -> Arc<RecordingManager> {
        let artifacts = Arc::new(ArtifactPaths::new(Path::new("out"), "app"));
        Arc::new(RecordingManager::new(platform, artifacts))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_exactly_once() {
        let platform = Arc::new(SimulatedPlatform::new(PlatformType::Web));
        let manager = manager(platform.clone());

        manager.start(Some(Duration::from_secs(5))).await.unwrap();
        assert!(manager.is_active().await);

        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(!manager.is_active().await);
        assert_eq!(platform.count("stop_recording").await, 1);

        // 定时器已停止，显式停止为空操作
        assert!(!manager.stop_active().await);
        assert!(!manager.shutdown().await);
        assert_eq!(platform.count("stop_recording").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_stop_cancels_timer() {
        let platform = Arc::new(SimulatedPlatform::new(PlatformType::Web));
        let manager = manager(platform.clone());

        manager.start(Some(Duration::from_secs(30))).await.unwrap();
        assert!(manager.shutdown().await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(platform.count("stop_recording").await, 1);
        assert!(manager.timers.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_start_rejected() {
        let platform = Arc::new(SimulatedPlatform::new(PlatformType::Desktop));
        let manager = manager(platform.clone());

        let first = manager.start(None).await.unwrap();
        let err = manager.start(None).await.unwrap_err();
        assert!(matches!(err, ExecutorError::RecordingAlreadyActive));
        assert_eq!(platform.count("start_recording").await, 1);

        let session = manager.active_session().await.unwrap();
        assert_eq!(session.path, first);
        assert!(session.duration.is_none());
    }

    #[tokio::test]
    async fn test_undurated_recording_stopped_at_shutdown() {
        let platform = Arc::new(SimulatedPlatform::new(PlatformType::Mobile));
        let manager = manager(platform.clone());

        manager.start(None).await.unwrap();
        assert!(manager.shutdown().await);
        assert_eq!(platform.count("stop_recording").await, 1);
        assert!(!platform.is_recording());
    }

    #[tokio::test]
    async fn test_start_failure_leaves_idle() {
        let platform = Arc::new(
            SimulatedPlatform::new(PlatformType::Web).fail_on("start_recording", None),
        );
        let manager = manager(platform.clone());

        assert!(manager.start(Some(Duration::from_secs(1))).await.is_err());
        assert!(!manager.is_active().await);
        assert!(manager.timers.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_failure_is_not_escalated() {
        let platform = Arc::new(
            SimulatedPlatform::new(PlatformType::Web).fail_on("stop_recording", None),
        );
        let manager = manager(platform.clone());

        manager.start(None).await.unwrap();
        assert!(manager.stop_active().await);
        assert!(!manager.is_active().await);
    }

    #[tokio::test]
    async fn test_start_rejected_after_shutdown() {
        let platform = Arc::new(SimulatedPlatform::new(PlatformType::Web));
        let manager = manager(platform.clone());

        assert!(!manager.shutdown().await);
        let err = manager.start(None).await.unwrap_err();
        assert!(matches!(err, ExecutorError::RecordingClosed));
        assert_eq!(platform.count("start_recording").await, 0);
        assert!(!manager.is_active().await);
    }
}
