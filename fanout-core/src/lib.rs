//! 进程内发布/订阅事件分发（fanout-core）
//!
//! 发布者在不知道订阅者的情况下发出任意类型的事件，总线按事件的
//! 运行时类型把它投递给所有订阅了该类型的回调：
//! - 订阅注册表（`registry`）：订阅者 × 事件类型 → 回调，支持并发读写；
//! - 同步投递（`delivery::synchronous`）：在发布者线程执行，线程内 FIFO、可重入；
//! - 分区投递（`delivery::partitioned`）：按订阅的稳定哈希分配到固定 lane，
//!   支持过滤器与按事件类型的最新事件缓存；
//! - 错误策略（`policy`）：决定注册/投递错误是返回给调用方还是记录后吞掉；
//! - 门面（`bus`）：`SyncEventBus` 与 `AsyncEventBus`。
//!
//! 典型用法：
//! 1. 为订阅者实现 `Subscribe`，声明其回调；
//! 2. 构造总线并 `add_subscriber`；
//! 3. `publish` 任意事件，按需设置过滤器或开启缓存。
//!
pub mod bus;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod policy;
pub mod registry;
pub mod subscriber;
pub mod subscription;

pub use bus::{AsyncEventBus, EventBus, SyncEventBus};
pub use config::BusConfig;
pub use delivery::{Delivery, DeliveryEngine};
pub use error::{BusError, BusResult, SubscriptionError, SubscriptionResult};
pub use event::{Event, EventRef, EventType};
pub use policy::{ErrorMode, ExceptionPolicy};
pub use subscriber::{
    Binding, Bindings, CallbackResolver, CallbackResult, DeclaredCallbacks, SubscriberRef, Subscribe,
};
pub use subscription::{EventFilter, Subscription};
