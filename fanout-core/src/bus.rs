//! 事件总线门面（EventBus）
//!
//! 只做转发：把调用交给注册表或投递引擎，再把结果交给
//! `ExceptionPolicy` 决定抛出还是记录。两种具体形态：
//! - `SyncEventBus`：发布者线程同步执行全部回调；
//! - `AsyncEventBus`：分区 lane 异步执行，额外支持过滤器与最新事件缓存。
//!
//! 每个总线实例拥有独立的注册表与缓存，不存在全局单例。
//!
use crate::config::BusConfig;
use crate::delivery::{Delivery, DeliveryEngine, PartitionedDeliveryEngine, SyncDeliveryEngine};
use crate::error::{BusError, BusResult};
use crate::event::{Event, EventRef, EventType};
use crate::policy::ExceptionPolicy;
use crate::registry::SubscriptionRegistry;
use crate::subscriber::{CallbackResolver, DeclaredCallbacks, SubscriberRef, Subscribe};
use crate::subscription::EventFilter;
use std::sync::Arc;
use tracing::info;

pub type SyncEventBus = EventBus<SyncDeliveryEngine>;
pub type AsyncEventBus = EventBus<PartitionedDeliveryEngine>;

pub struct EventBus<D: DeliveryEngine> {
    registry: Arc<SubscriptionRegistry>,
    engine: D,
    policy: ExceptionPolicy,
}

impl<D: DeliveryEngine> EventBus<D> {
    fn assemble(config: &BusConfig, registry: Arc<SubscriptionRegistry>, engine: D) -> Self {
        info!(bus_id = %config.bus_id, error_mode = ?config.error_mode, "event bus created");
        Self {
            registry,
            engine,
            policy: ExceptionPolicy::new(config.bus_id.clone(), config.error_mode),
        }
    }

    pub fn bus_id(&self) -> &str {
        self.policy.bus_id()
    }

    pub fn policy(&self) -> &ExceptionPolicy {
        &self.policy
    }

    /// 以 `Subscribe` 声明的回调注册订阅者
    pub fn add_subscriber<S: Subscribe>(&self, subscriber: &Arc<S>) -> BusResult<()> {
        self.add_subscriber_with(subscriber, &DeclaredCallbacks)
    }

    /// 以指定的解析器注册订阅者
    pub fn add_subscriber_with<S, R>(&self, subscriber: &Arc<S>, resolver: &R) -> BusResult<()>
    where
        S: Send + Sync + 'static,
        R: CallbackResolver<S> + ?Sized,
    {
        let bindings = resolver.resolve(subscriber);
        let result = self.registry.add(&SubscriberRef::of(subscriber), bindings);
        self.policy.apply("add subscriber", result, || ())
    }

    pub fn remove_subscriber<S: Send + Sync + 'static>(&self, subscriber: &Arc<S>) -> BusResult<()> {
        let result = self.registry.remove(&SubscriberRef::of(subscriber));
        self.policy.apply("remove subscriber", result, || ())
    }

    pub fn publish<E: Event>(&self, event: E) -> BusResult<Delivery> {
        self.publish_event(EventRef::new(event))
    }

    pub fn publish_arc<E: Event>(&self, event: Arc<E>) -> BusResult<Delivery> {
        self.publish_event(EventRef::from_arc(event))
    }

    pub fn publish_event(&self, event: EventRef) -> BusResult<Delivery> {
        let result = self.engine.publish(event);
        self.policy.apply("publish", result, || Delivery::Suppressed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }

    pub fn subscribed_event_count<S: Send + Sync + 'static>(&self, subscriber: &Arc<S>) -> usize {
        self.registry
            .subscribed_event_count(&SubscriberRef::of(subscriber))
    }

    pub fn is_subscribed<E: Event, S: Send + Sync + 'static>(&self, subscriber: &Arc<S>) -> bool {
        self.registry
            .is_subscribed(&SubscriberRef::of(subscriber), EventType::of::<E>())
    }
}

impl SyncEventBus {
    pub fn new() -> Self {
        let config = BusConfig::default();
        let registry = Arc::new(SubscriptionRegistry::new());
        let engine = SyncDeliveryEngine::new(Arc::clone(&registry));
        Self::assemble(&config, registry, engine)
    }

    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        config
            .validate()
            .map_err(|err| BusError::new(config.bus_id.clone(), "create bus", err))?;
        let registry = Arc::new(SubscriptionRegistry::new());
        let engine = SyncDeliveryEngine::new(Arc::clone(&registry));
        Ok(Self::assemble(&config, registry, engine))
    }
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncEventBus {
    pub fn new() -> BusResult<Self> {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        let create = |err| BusError::new(config.bus_id.clone(), "create bus", err);
        config.validate().map_err(create)?;
        let registry = Arc::new(SubscriptionRegistry::new());
        let engine =
            PartitionedDeliveryEngine::new(Arc::clone(&registry), config.lane_count).map_err(create)?;
        Ok(Self::assemble(&config, registry, engine))
    }

    /// 设置（`Some`）或清除（`None`）订阅者在事件类型 `E` 上的过滤器
    pub fn set_event_filter<E: Event, S: Send + Sync + 'static>(
        &self,
        subscriber: &Arc<S>,
        filter: Option<EventFilter>,
    ) -> BusResult<()> {
        let result = self
            .registry
            .set_filter(&SubscriberRef::of(subscriber), EventType::of::<E>(), filter);
        self.policy.apply("set event filter", result, || ())
    }

    /// 开关最新事件缓存；关闭时把当前缓存值补发给该订阅者一次
    pub fn set_cache_last_event<E: Event, S: Send + Sync + 'static>(
        &self,
        subscriber: &Arc<S>,
        enabled: bool,
    ) -> BusResult<()> {
        let subscriber = SubscriberRef::of(subscriber);
        let event_type = EventType::of::<E>();
        let result = if enabled {
            self.registry.set_cache(&subscriber, event_type, true)
        } else {
            self.engine.stop_caching(&subscriber, event_type)
        };
        self.policy.apply("set cache last event", result, || ())
    }

    pub fn poll_cached_event<E: Event>(&self) -> Option<Arc<E>> {
        self.engine
            .cached(EventType::of::<E>())
            .and_then(|event| event.downcast::<E>())
    }

    pub fn remove_cached_event<E: Event>(&self) -> Option<Arc<E>> {
        self.engine
            .remove_cached(EventType::of::<E>())
            .and_then(|event| event.downcast::<E>())
    }

    pub fn remove_all_cached_events(&self) {
        self.engine.clear_cached();
    }

    pub fn has_filter<E: Event, S: Send + Sync + 'static>(&self, subscriber: &Arc<S>) -> bool {
        self.registry
            .has_filter(&SubscriberRef::of(subscriber), EventType::of::<E>())
    }

    pub fn is_caching<E: Event, S: Send + Sync + 'static>(&self, subscriber: &Arc<S>) -> bool {
        self.registry
            .is_caching(&SubscriberRef::of(subscriber), EventType::of::<E>())
    }

    pub fn lane_count(&self) -> usize {
        self.engine.lane_count()
    }

    pub fn lane_for<E: Event, S: Send + Sync + 'static>(&self, subscriber: &Arc<S>) -> Option<usize> {
        self.engine
            .lane_for(&SubscriberRef::of(subscriber), EventType::of::<E>())
    }

    pub fn is_shutdown(&self) -> bool {
        self.engine.is_shutdown()
    }

    /// 停止所有 lane（尽力而为）；之后的发布以 `LaneClosed` 交给策略处理
    pub fn shutdown(&self) {
        info!(bus_id = %self.bus_id(), "event bus shutting down");
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubscriptionError;
    use crate::policy::ErrorMode;
    use crate::subscriber::{Bindings, CallbackResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tester {
        texts: Mutex<Vec<String>>,
        ints: Mutex<Vec<i32>>,
    }

    impl Tester {
        fn on_text(&self, event: &String) -> CallbackResult {
            self.texts.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn on_int(&self, event: &i32) -> CallbackResult {
            self.ints.lock().unwrap().push(*event);
            Ok(())
        }
    }

    impl Subscribe for Tester {
        fn subscriptions(bindings: &mut Bindings<Self>) {
            bindings.on(Self::on_text).on(Self::on_int);
        }
    }

    struct TextOnly;

    impl CallbackResolver<Tester> for TextOnly {
        fn resolve(&self, subscriber: &Arc<Tester>) -> Vec<crate::subscriber::Binding> {
            let mut bindings = Bindings::new(subscriber);
            bindings.on(Tester::on_text);
            bindings.into_bindings()
        }
    }

    #[test]
    fn errors_carry_the_bus_id() {
        let bus = SyncEventBus::with_config(BusConfig::builder().bus_id("orders").build()).unwrap();
        let tester = Arc::new(Tester::default());

        bus.add_subscriber(&tester).unwrap();
        let err = bus.add_subscriber(&tester).unwrap_err();

        assert_eq!(err.bus_id(), "orders");
        assert_eq!(err.context(), "add subscriber");
        assert!(matches!(err.kind(), SubscriptionError::DuplicateSubscription { .. }));
    }

    #[test]
    fn suppressing_bus_swallows_registry_errors() {
        let config = BusConfig::builder()
            .error_mode(ErrorMode::LogAndSuppress)
            .build();
        let bus = SyncEventBus::with_config(config).unwrap();
        let tester = Arc::new(Tester::default());

        assert!(bus.remove_subscriber(&tester).is_ok());
        bus.add_subscriber(&tester).unwrap();
        assert!(bus.add_subscriber(&tester).is_ok());
        assert_eq!(bus.subscribed_event_count(&tester), 2);
    }

    #[test]
    fn custom_resolver_controls_the_bindings() {
        let bus = SyncEventBus::new();
        let tester = Arc::new(Tester::default());

        bus.add_subscriber_with(&tester, &TextOnly).unwrap();
        assert!(bus.is_subscribed::<String, _>(&tester));
        assert!(!bus.is_subscribed::<i32, _>(&tester));

        assert_eq!(bus.publish(7_i32).unwrap(), Delivery::NoSubscribers);
        assert_eq!(
            bus.publish(String::from("Hello")).unwrap(),
            Delivery::Dispatched { subscriptions: 1 }
        );
        assert_eq!(*tester.texts.lock().unwrap(), vec!["Hello"]);
        assert!(tester.ints.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let err = AsyncEventBus::with_config(BusConfig::builder().lane_count(0).build())
            .err()
            .unwrap();
        assert_eq!(err.context(), "create bus");
        assert!(matches!(err.kind(), SubscriptionError::InvalidConfig { .. }));
    }

    #[test]
    fn publish_after_shutdown_goes_through_the_policy() {
        let bus = AsyncEventBus::with_config(BusConfig::builder().lane_count(2).build()).unwrap();
        let tester = Arc::new(Tester::default());
        bus.add_subscriber(&tester).unwrap();
        assert!(!bus.is_shutdown());
        bus.shutdown();
        assert!(bus.is_shutdown());

        let err = bus.publish(1_i32).unwrap_err();
        assert!(matches!(err.kind(), SubscriptionError::LaneClosed { .. }));

        let quiet = AsyncEventBus::with_config(
            BusConfig::builder()
                .lane_count(2)
                .error_mode(ErrorMode::LogAndSuppress)
                .build(),
        )
        .unwrap();
        quiet.add_subscriber(&tester).unwrap();
        quiet.shutdown();
        assert_eq!(quiet.publish(1_i32).unwrap(), Delivery::Suppressed);
    }
}
