//! # Polling Module / 轮询模块
//!
//! `wait_until` repeatedly evaluates an async predicate at a fixed interval
//! until it reports ready or failed, or until `max_wait` has elapsed.
//! There is no backoff and no cancellation of an in-flight evaluation.
//!
//! `wait_until` 以固定间隔反复执行异步谓词，直到其报告就绪或失败，
//! 或者直到超过 `max_wait`。没有退避，也不会取消正在进行的评估。

use std::future::Future;
use std::time::{Duration, Instant};

/// What one evaluation of the predicate observed.
/// 谓词单次评估的观察结果。
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
    Failed(String),
}

/// The final verdict of a polling loop.
/// 轮询循环的最终结果。
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    Failed {
        reason: String,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
    },
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. }
            | PollOutcome::Failed { attempts, .. }
            | PollOutcome::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollOutcome::Ready { elapsed, .. }
            | PollOutcome::Failed { elapsed, .. }
            | PollOutcome::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

/// Evaluates `predicate` until it is ready or failed, sleeping `interval`
/// between evaluations. The predicate always runs at least once; once
/// `max_wait` has elapsed after an evaluation, the loop gives up with
/// `TimedOut`. The last sleep is shortened so the loop never oversleeps
/// the budget.
///
/// 反复执行 `predicate` 直到就绪或失败，两次评估之间休眠 `interval`。
/// 谓词至少执行一次；评估后若已超过 `max_wait`，循环以 `TimedOut` 结束。
/// 最后一次休眠会被缩短，避免超出预算。
pub async fn wait_until<T, F, Fut>(mut predicate: F, interval: Duration, max_wait: Duration) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollStatus<T>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match predicate().await {
            PollStatus::Ready(value) => {
                return PollOutcome::Ready {
                    value,
                    attempts,
                    elapsed: start.elapsed(),
                };
            }
            PollStatus::Failed(reason) => {
                return PollOutcome::Failed {
                    reason,
                    attempts,
                    elapsed: start.elapsed(),
                };
            }
            PollStatus::Pending => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= max_wait {
            return PollOutcome::TimedOut { attempts, elapsed };
        }
        tokio::time::sleep(interval.min(max_wait - elapsed)).await;
    }
}
