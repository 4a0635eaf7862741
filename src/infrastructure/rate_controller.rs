//! 自适应限速控制器
//!
//! ## 职责
//!
//! 在同一次批处理的所有工作任务之间共享延迟状态：
//! - 成功后延迟逐步衰减（不低于下限）
//! - 被限流后延迟按倍数增长
//! - 派发作业前的错峰延迟取 "静态分档" 与 "当前延迟" 的较大者

use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 延迟状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateState {
    pub base_delay: Duration,
    pub current_delay: Duration,
    pub backoff_multiplier: f64,
    pub decay_multiplier: f64,
    pub floor_delay: Duration,
}

impl Default for RateState {
    fn default() -> Self {
        let base = Duration::from_millis(1500);
        Self {
            base_delay: base,
            current_delay: base,
            backoff_multiplier: 1.5,
            decay_multiplier: 0.9,
            floor_delay: Duration::from_millis(500),
        }
    }
}

/// 自适应限速控制器
#[derive(Debug, Default)]
pub struct AdaptiveRateController {
    state: Mutex<RateState>,
}

impl AdaptiveRateController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RateState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// 按文件大小的静态错峰延迟
    pub fn stagger_for_size(size_mb: f64) -> Duration {
        if size_mb < 5.0 {
            Duration::from_millis(500)
        } else if size_mb < 30.0 {
            Duration::from_millis(1500)
        } else {
            Duration::from_millis(4000)
        }
    }

    /// 派发下一个作业前应等待的时长
    pub async fn delay_for_size(&self, size_mb: f64) -> Duration {
        let current = self.state.lock().await.current_delay;
        Self::stagger_for_size(size_mb).max(current)
    }

    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.current_delay
    }

    /// 成功：延迟衰减，不低于下限
    pub async fn on_success(&self) -> Duration {
        let mut state = self.state.lock().await;
        let decayed = state.current_delay.mul_f64(state.decay_multiplier);
        state.current_delay = decayed.max(state.floor_delay);
        debug!("限速延迟衰减至 {:.2}s", state.current_delay.as_secs_f64());
        state.current_delay
    }

    /// 被限流：延迟按倍数增长，返回新的延迟
    pub async fn on_rate_limited(&self) -> Duration {
        let mut state = self.state.lock().await;
        state.current_delay = state.current_delay.mul_f64(state.backoff_multiplier);
        warn!(
            "⚠️ 检测到限流，延迟增加至 {:.2}s",
            state.current_delay.as_secs_f64()
        );
        state.current_delay
    }
}
