//! 订阅注册表（SubscriptionRegistry）
//!
//! 维护两张映射：
//! - `by_event_type`：事件类型 → 有序订阅列表（写时复制，读取只克隆 `Arc`，
//!   读者永远看不到写了一半的列表）；
//! - `by_subscriber`：订阅者 → 已订阅的事件类型（用于重复检测与批量移除）。
//!
//! 写操作（add/remove/清理）由一把写锁串行化；读路径只在快照里
//! 出现已释放的订阅者时才进入该锁。
//!
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::event::EventType;
use crate::subscriber::{Binding, SubscriberRef};
use crate::subscription::{EventFilter, Subscription};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// 某事件类型的订阅快照（按注册顺序）
pub type Subscriptions = Arc<Vec<Arc<Subscription>>>;

#[derive(Default)]
pub struct SubscriptionRegistry {
    by_event_type: DashMap<EventType, Subscriptions>,
    by_subscriber: DashMap<SubscriberRef, Vec<EventType>>,
    writer: Mutex<()>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 逐条注册绑定；遇到重复的 (订阅者, 事件类型) 即失败，
    /// 之前已应用的绑定保持注册状态（不回滚）
    pub fn add(&self, subscriber: &SubscriberRef, bindings: Vec<Binding>) -> SubscriptionResult<()> {
        let _writer = self.writer.lock();

        for binding in bindings {
            let event_type = binding.event_type();
            {
                let mut tracked = self.by_subscriber.entry(subscriber.clone()).or_default();
                if tracked.contains(&event_type) {
                    return Err(SubscriptionError::DuplicateSubscription {
                        subscriber: subscriber.type_name(),
                        event_type: event_type.name(),
                    });
                }
                tracked.push(event_type);
            }

            let subscription = Arc::new(Subscription::new(subscriber.clone(), binding));
            self.by_event_type
                .entry(event_type)
                .and_modify(|list| {
                    let mut next = Vec::with_capacity(list.len() + 1);
                    next.extend(list.iter().cloned());
                    next.push(Arc::clone(&subscription));
                    *list = Arc::new(next);
                })
                .or_insert_with(|| Arc::new(vec![Arc::clone(&subscription)]));

            debug!(
                subscriber = ?subscriber,
                event_type = %event_type,
                stable_hash = subscription.stable_hash(),
                "subscription added"
            );
        }

        Ok(())
    }

    /// 移除订阅者的全部订阅；每个事件类型的列表整体替换
    pub fn remove(&self, subscriber: &SubscriberRef) -> SubscriptionResult<()> {
        let _writer = self.writer.lock();

        if !self.detach(subscriber) {
            return Err(SubscriptionError::SubscriberNotFound {
                subscriber: subscriber.type_name(),
            });
        }
        debug!(subscriber = ?subscriber, "subscriber removed");
        Ok(())
    }

    /// 清理已被释放的订阅者，返回清理的数量
    pub fn prune_dropped(&self) -> usize {
        let _writer = self.writer.lock();

        let dropped: Vec<SubscriberRef> = self
            .by_subscriber
            .iter()
            .filter(|entry| !entry.key().is_alive())
            .map(|entry| entry.key().clone())
            .collect();
        for subscriber in &dropped {
            self.detach(subscriber);
            debug!(subscriber = ?subscriber, "dropped subscriber pruned");
        }
        dropped.len()
    }

    /// 从两张映射中摘除订阅者；调用方须持有写锁
    fn detach(&self, subscriber: &SubscriberRef) -> bool {
        let Some((_, event_types)) = self.by_subscriber.remove(subscriber) else {
            return false;
        };

        for event_type in event_types {
            if let Some(mut list) = self.by_event_type.get_mut(&event_type) {
                let next: Vec<_> = list
                    .iter()
                    .filter(|s| s.subscriber() != subscriber)
                    .cloned()
                    .collect();
                *list = Arc::new(next);
            }
            self.by_event_type.remove_if(&event_type, |_, list| list.is_empty());
        }
        true
    }

    pub fn find(&self, subscriber: &SubscriberRef, event_type: EventType) -> Option<Arc<Subscription>> {
        self.subscriptions_for(event_type)
            .iter()
            .find(|s| s.matches(subscriber, event_type))
            .cloned()
    }

    /// 当前订阅快照；可与其他订阅者的 add/remove 并发读取
    ///
    /// 快照中若有已释放的订阅者，先清理再重新取快照。
    pub fn subscriptions_for(&self, event_type: EventType) -> Subscriptions {
        let snapshot = self.snapshot(event_type);
        if snapshot.iter().all(|s| s.subscriber().is_alive()) {
            return snapshot;
        }
        self.prune_dropped();
        self.snapshot(event_type)
    }

    fn snapshot(&self, event_type: EventType) -> Subscriptions {
        self.by_event_type
            .get(&event_type)
            .map(|list| Arc::clone(&list))
            .unwrap_or_default()
    }

    pub fn set_filter(
        &self,
        subscriber: &SubscriberRef,
        event_type: EventType,
        filter: Option<EventFilter>,
    ) -> SubscriptionResult<()> {
        let subscription = self.require(subscriber, event_type)?;
        let state = if filter.is_some() { "on" } else { "off" };
        debug!(subscriber = ?subscriber, event_type = %event_type, filter = state, "set filter");
        subscription.set_filter(filter);
        Ok(())
    }

    pub fn set_cache(
        &self,
        subscriber: &SubscriberRef,
        event_type: EventType,
        enabled: bool,
    ) -> SubscriptionResult<()> {
        let subscription = self.require(subscriber, event_type)?;
        let state = if enabled { "on" } else { "off" };
        debug!(subscriber = ?subscriber, event_type = %event_type, caching = state, "set caching");
        subscription.set_caching(enabled);
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.prune_dropped();
        self.by_subscriber.len()
    }

    pub fn subscribed_event_count(&self, subscriber: &SubscriberRef) -> usize {
        self.by_subscriber
            .get(subscriber)
            .map_or(0, |types| types.len())
    }

    pub fn is_subscribed(&self, subscriber: &SubscriberRef, event_type: EventType) -> bool {
        self.find(subscriber, event_type).is_some()
    }

    pub fn has_filter(&self, subscriber: &SubscriberRef, event_type: EventType) -> bool {
        self.find(subscriber, event_type)
            .is_some_and(|s| s.filter().is_some())
    }

    pub fn is_caching(&self, subscriber: &SubscriberRef, event_type: EventType) -> bool {
        self.find(subscriber, event_type)
            .is_some_and(|s| s.is_caching())
    }

    fn require(
        &self,
        subscriber: &SubscriberRef,
        event_type: EventType,
    ) -> SubscriptionResult<Arc<Subscription>> {
        self.find(subscriber, event_type)
            .ok_or(SubscriptionError::SubscriptionNotFound {
                subscriber: subscriber.type_name(),
                event_type: event_type.name(),
            })
    }
}
