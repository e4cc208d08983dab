//! 订阅（Subscription）
//!
//! 不可变身份（订阅者 + 事件类型 + 回调）加上可变的服务状态
//! （过滤器、缓存开关）。`stable_hash` 在构造时计算一次，是分区投递
//! 选择 lane 的唯一依据。
//!
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::event::{Event, EventRef, EventType};
use crate::subscriber::{Binding, Callback, SubscriberRef};
use fxhash::FxHasher;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::any::{Any, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type PredicateFn = dyn Fn(&EventRef) -> Option<bool> + Send + Sync;

/// 事件过滤器：对事件求值的谓词
///
/// 谓词按自身的参数类型 `P` 构造，不要求与订阅的事件类型一致；
/// 类型不符只会在求值时以 `FilterTypeMismatch` 暴露。
#[derive(Clone)]
pub struct EventFilter {
    accepts: &'static str,
    predicate: Arc<PredicateFn>,
}

impl EventFilter {
    pub fn new<P, F>(predicate: F) -> Self
    where
        P: Event,
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        Self {
            accepts: type_name::<P>(),
            predicate: Arc::new(move |event: &EventRef| event.downcast_ref::<P>().map(&predicate)),
        }
    }

    /// 谓词接受的事件类型名
    pub fn accepts(&self) -> &'static str {
        self.accepts
    }

    pub fn evaluate(&self, event: &EventRef) -> SubscriptionResult<bool> {
        (self.predicate)(event).ok_or_else(|| SubscriptionError::FilterTypeMismatch {
            expected: self.accepts,
            found: event.event_type().name(),
        })
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("accepts", &self.accepts)
            .finish_non_exhaustive()
    }
}

/// 一个订阅者对一个事件类型的绑定
pub struct Subscription {
    subscriber: SubscriberRef,
    event_type: EventType,
    callback: Callback,
    stable_hash: u64,
    filter: RwLock<Option<EventFilter>>,
    hold_last_event: AtomicBool,
    /// 串行化“缓存判定 + 入队”与“关闭缓存 + 补发”
    gate: Mutex<()>,
}

impl Subscription {
    pub(crate) fn new(subscriber: SubscriberRef, binding: Binding) -> Self {
        let event_type = binding.event_type();
        Self {
            stable_hash: stable_hash(&subscriber, &event_type),
            subscriber,
            event_type,
            callback: binding.into_callback(),
            filter: RwLock::new(None),
            hold_last_event: AtomicBool::new(false),
            gate: Mutex::new(()),
        }
    }

    pub fn subscriber(&self) -> &SubscriberRef {
        &self.subscriber
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// 分区键：由 (订阅者身份, 事件类型) 决定，生命周期内不变
    pub fn stable_hash(&self) -> u64 {
        self.stable_hash
    }

    pub fn matches(&self, subscriber: &SubscriberRef, event_type: EventType) -> bool {
        self.subscriber == *subscriber && self.event_type == event_type
    }

    pub fn filter(&self) -> Option<EventFilter> {
        self.filter.read().clone()
    }

    /// 替换过滤器（`None` 关闭过滤），不做合并
    pub fn set_filter(&self, filter: Option<EventFilter>) {
        *self.filter.write() = filter;
    }

    pub fn is_caching(&self) -> bool {
        self.hold_last_event.load(Ordering::Acquire)
    }

    pub fn set_caching(&self, enabled: bool) {
        self.hold_last_event.store(enabled, Ordering::Release);
    }

    pub(crate) fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock()
    }

    /// 按当前过滤器判断是否放行；未设置过滤器时总是放行，
    /// 谓词 panic 转换为 `FilterEvaluation`
    pub(crate) fn accepts(&self, event: &EventRef) -> SubscriptionResult<bool> {
        let Some(filter) = self.filter() else {
            return Ok(true);
        };
        match panic::catch_unwind(AssertUnwindSafe(|| filter.evaluate(event))) {
            Ok(verdict) => verdict,
            Err(payload) => Err(SubscriptionError::FilterEvaluation {
                subscriber: self.subscriber.type_name(),
                event_type: self.event_type.name(),
                reason: panic_message(payload.as_ref()),
            }),
        }
    }

    /// 在当前线程调用回调；回调返回错误或 panic 都转换为 `CallbackInvocation`
    pub(crate) fn invoke(&self, event: &EventRef) -> SubscriptionResult<()> {
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.callback.call(event))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => panic_message(payload.as_ref()),
        };

        Err(SubscriptionError::CallbackInvocation {
            subscriber: self.subscriber.type_name(),
            event_type: self.event_type.name(),
            reason,
        })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber", &self.subscriber)
            .field("event_type", &self.event_type)
            .field("stable_hash", &self.stable_hash)
            .field("filter", &self.filter.read().is_some())
            .field("hold_last_event", &self.is_caching())
            .finish()
    }
}

/// 与注册顺序无关的确定性哈希（u64，天然非负）
pub fn stable_hash(subscriber: &SubscriberRef, event_type: &EventType) -> u64 {
    let mut hasher = FxHasher::default();
    subscriber.hash(&mut hasher);
    event_type.hash(&mut hasher);
    hasher.finish()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
