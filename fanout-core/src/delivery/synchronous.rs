//! 同步投递引擎（SyncDeliveryEngine）
//!
//! 每个发布线程、每个引擎实例各有一份私有状态：待投递队列 + 是否正在排空。
//! 回调中在同一线程再次发布时，只会把事件追加到这份队列，由最外层的
//! 发布循环按入队顺序依次投递，因此：
//! - 同一线程上的所有事件（含重入事件）严格 FIFO；
//! - 无论重入多深，调用栈都不会增长；
//! - 不同线程的队列相互独立，跨线程不保证顺序。
//!
use super::{Delivery, DeliveryEngine};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::event::EventRef;
use crate::registry::SubscriptionRegistry;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static PUBLISHER_STATES: RefCell<HashMap<u64, PublisherState>> = RefCell::new(HashMap::new());
}

/// 发布线程私有状态
#[derive(Default)]
struct PublisherState {
    queue: VecDeque<EventRef>,
    draining: bool,
}

pub struct SyncDeliveryEngine {
    id: u64,
    registry: Arc<SubscriptionRegistry>,
}

impl SyncDeliveryEngine {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            registry,
        }
    }

    /// 入队；若当前线程尚未在排空则接管排空并返回 `true`
    fn enqueue(&self, event: EventRef) -> bool {
        PUBLISHER_STATES.with(|states| {
            let mut states = states.borrow_mut();
            let state = states.entry(self.id).or_default();
            state.queue.push_back(event);
            !std::mem::replace(&mut state.draining, true)
        })
    }

    fn pop_next(&self) -> Option<EventRef> {
        PUBLISHER_STATES.with(|states| {
            states
                .borrow_mut()
                .get_mut(&self.id)
                .and_then(|state| state.queue.pop_front())
        })
    }

    /// 投递单个事件到其全部订阅；第一个失败作为结果，其余失败仅记录
    fn deliver(&self, event: &EventRef) -> (Delivery, Option<SubscriptionError>) {
        let subscriptions = self.registry.subscriptions_for(event.event_type());
        if subscriptions.is_empty() {
            warn!(event_type = %event.event_type(), "no subscribers registered for event");
            return (Delivery::NoSubscribers, None);
        }

        let mut failure = None;
        for subscription in subscriptions.iter() {
            if let Err(err) = subscription.invoke(event) {
                record_failure(&mut failure, err);
            }
        }

        let delivery = Delivery::Dispatched {
            subscriptions: subscriptions.len(),
        };
        (delivery, failure)
    }
}

impl DeliveryEngine for SyncDeliveryEngine {
    fn publish(&self, event: EventRef) -> SubscriptionResult<Delivery> {
        let event_type = event.event_type();
        if !self.enqueue(event) {
            trace!(event_type = %event_type, "reentrant publish queued");
            return Ok(Delivery::Queued);
        }

        let _drain = DrainGuard { engine_id: self.id };
        // 接管排空时队列为空，第一个出队的就是本次发布的事件
        let mut own: Option<Delivery> = None;
        let mut failure = None;

        while let Some(next) = self.pop_next() {
            let (delivery, err) = self.deliver(&next);
            own.get_or_insert(delivery);
            if let Some(err) = err {
                record_failure(&mut failure, err);
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(own.unwrap_or(Delivery::NoSubscribers)),
        }
    }
}

fn record_failure(slot: &mut Option<SubscriptionError>, err: SubscriptionError) {
    if slot.is_none() {
        *slot = Some(err);
    } else {
        warn!(error = %err, "additional delivery failure");
    }
}

/// 排空结束（含 panic 展开）时清理本线程的私有状态
struct DrainGuard {
    engine_id: u64,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let _ = PUBLISHER_STATES.try_with(|states| {
            if let Ok(mut states) = states.try_borrow_mut() {
                states.remove(&self.engine_id);
            }
        });
    }
}
