//! 投递引擎（delivery）
//!
//! 两种投递方式共享同一个注册表：
//! - `SyncDeliveryEngine`：发布者线程执行全部回调，线程内 FIFO、可重入；
//! - `PartitionedDeliveryEngine`：按订阅的稳定哈希把事件分配到固定的
//!   单线程 lane，保证每个订阅内的顺序，同时并行处理无关订阅。
//!
//! 引擎只返回 `SubscriptionError`，是否抛出由总线的 `ExceptionPolicy` 决定。
//!
mod lane;
pub mod partitioned;
pub mod synchronous;

pub use partitioned::PartitionedDeliveryEngine;
pub use synchronous::SyncDeliveryEngine;

use crate::error::SubscriptionResult;
use crate::event::EventRef;

/// 一次发布的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// 事件已交给 `subscriptions` 个订阅（同步引擎已执行完，分区引擎已入队/缓存/过滤）
    Dispatched { subscriptions: usize },
    /// 同线程的重入发布：事件已排入外层发布的队列
    Queued,
    /// 该事件类型没有订阅者（提示，而非错误）
    NoSubscribers,
    /// 投递失败，错误已按总线策略记录并吞掉
    Suppressed,
}

/// 投递引擎协议
pub trait DeliveryEngine: Send + Sync {
    fn publish(&self, event: EventRef) -> SubscriptionResult<Delivery>;

    /// 停止接收新的投递；默认无需处理
    fn shutdown(&self) {}
}
