//! 分区投递引擎（PartitionedDeliveryEngine）
//!
//! 固定数量的单线程 lane；每个订阅按 `stable_hash % lane_count` 固定落在
//! 同一条 lane 上，因此同一 (订阅者, 事件类型) 的事件严格按入队顺序执行，
//! 而不同订阅（即便属于同一订阅者）可以在不同 lane 上并行。
//!
//! 单订阅投递的判定顺序：
//! 1. 设置了过滤器则先求值，未通过的事件直接丢弃；谓词 panic 记为
//!    `FilterEvaluation`，不影响其余订阅；
//! 2. 开启缓存则覆盖该事件类型的缓存槽位并返回，不进入 lane；
//! 3. 否则把回调调用提交到订阅所属的 lane。
//!
//! 缓存按事件类型共享：所有开启缓存的订阅者共用同一个槽位。
//! 缓存判定与入队、关闭缓存与补发都在订阅的闸门内进行，
//! 因此补发的缓存值总是先于关闭之后发布的事件到达。
//!
use super::lane::{Lane, LaneTask};
use super::{Delivery, DeliveryEngine};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::event::{EventRef, EventType};
use crate::registry::SubscriptionRegistry;
use crate::subscriber::SubscriberRef;
use crate::subscription::Subscription;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

pub struct PartitionedDeliveryEngine {
    registry: Arc<SubscriptionRegistry>,
    lanes: Vec<Lane>,
    cache: DashMap<EventType, EventRef>,
    token: CancellationToken,
}

impl PartitionedDeliveryEngine {
    pub fn new(registry: Arc<SubscriptionRegistry>, lane_count: usize) -> SubscriptionResult<Self> {
        if lane_count == 0 {
            return Err(SubscriptionError::InvalidConfig {
                reason: "lane_count must be greater than zero".to_string(),
            });
        }

        let token = CancellationToken::new();
        let lanes = (0..lane_count)
            .map(|index| Lane::spawn(index, token.clone()))
            .collect::<SubscriptionResult<Vec<_>>>()
            .inspect_err(|_| token.cancel())?;

        debug!(lane_count, "partitioned delivery started");
        Ok(Self {
            registry,
            lanes,
            cache: DashMap::new(),
            token,
        })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// 订阅所属的 lane：只由稳定哈希与 lane 数量决定
    pub fn lane_index(&self, subscription: &Subscription) -> usize {
        (subscription.stable_hash() % self.lanes.len() as u64) as usize
    }

    pub fn lane_for(&self, subscriber: &SubscriberRef, event_type: EventType) -> Option<usize> {
        self.registry
            .find(subscriber, event_type)
            .map(|s| self.lane_index(&s))
    }

    /// 单订阅投递：过滤 → 缓存 → 提交到 lane
    pub fn publish_to_single_subscriber(
        &self,
        event: &EventRef,
        subscription: &Arc<Subscription>,
    ) -> SubscriptionResult<()> {
        if !subscription.accepts(event)? {
            debug!(
                subscriber = ?subscription.subscriber(),
                event_type = %event.event_type(),
                "event filtered"
            );
            return Ok(());
        }

        let _gate = subscription.gate();
        if subscription.is_caching() {
            self.cache.insert(subscription.event_type(), event.clone());
            trace!(event_type = %event.event_type(), "event cached");
            return Ok(());
        }
        self.submit(subscription, event.clone())
    }

    /// 关闭缓存，并把当前缓存值（若有）补发给该订阅者一次
    ///
    /// 两步在订阅的闸门内完成：并发发布要么先被缓存（随后被补发），
    /// 要么排在补发之后进入 lane，订阅者不会在新事件之后再收到旧值。
    pub fn stop_caching(&self, subscriber: &SubscriberRef, event_type: EventType) -> SubscriptionResult<()> {
        let subscription = self.registry.find(subscriber, event_type).ok_or(
            SubscriptionError::SubscriptionNotFound {
                subscriber: subscriber.type_name(),
                event_type: event_type.name(),
            },
        )?;

        let _gate = subscription.gate();
        subscription.set_caching(false);
        debug!(subscriber = ?subscriber, event_type = %event_type, caching = "off", "set caching");
        match self.cached(event_type) {
            Some(event) => self.submit(&subscription, event),
            None => Ok(()),
        }
    }

    fn submit(&self, subscription: &Arc<Subscription>, event: EventRef) -> SubscriptionResult<()> {
        let lane = self.lane_index(subscription);
        trace!(
            lane,
            stable_hash = subscription.stable_hash(),
            event_type = %event.event_type(),
            "event routed"
        );
        self.lanes[lane].submit(LaneTask {
            subscription: Arc::clone(subscription),
            event,
        })
    }

    pub fn cached(&self, event_type: EventType) -> Option<EventRef> {
        self.cache.get(&event_type).map(|event| event.clone())
    }

    pub fn remove_cached(&self, event_type: EventType) -> Option<EventRef> {
        self.cache.remove(&event_type).map(|(_, event)| event)
    }

    pub fn clear_cached(&self) {
        self.cache.clear();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl DeliveryEngine for PartitionedDeliveryEngine {
    fn publish(&self, event: EventRef) -> SubscriptionResult<Delivery> {
        let subscriptions = self.registry.subscriptions_for(event.event_type());
        if subscriptions.is_empty() {
            warn!(event_type = %event.event_type(), "no subscribers registered for event");
            return Ok(Delivery::NoSubscribers);
        }

        let mut failure: Option<SubscriptionError> = None;
        for subscription in subscriptions.iter() {
            if let Err(err) = self.publish_to_single_subscriber(&event, subscription) {
                match failure {
                    None => failure = Some(err),
                    Some(_) => warn!(error = %err, "additional delivery failure"),
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(Delivery::Dispatched {
                subscriptions: subscriptions.len(),
            }),
        }
    }

    /// 通知所有 lane 停止；已入队的任务不保证执行完成
    fn shutdown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.lanes.iter().for_each(Lane::close);
        debug!(lane_count = self.lanes.len(), "partitioned delivery stopped");
    }
}

impl Drop for PartitionedDeliveryEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
