//! 订阅者与回调解析（CallbackResolver）
//!
//! 核心层从不检查订阅者内部结构：由 `CallbackResolver` 给出
//! 有序的 (事件类型, 回调) 绑定列表，注册表只消费这份列表。
//! - `SubscriberRef`：以指针身份比较的订阅者引用；
//! - `Callback` / `Binding`：类型擦除后的单参数回调及其事件类型；
//! - `Subscribe` + `DeclaredCallbacks`：订阅者自行声明回调的默认解析方式。
//!
use crate::event::{Event, EventRef, EventType};
use anyhow::anyhow;
use std::any::{Any, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// 回调返回值
pub type CallbackResult = anyhow::Result<()>;

/// 订阅者引用：身份语义（指针相等），而非值相等
///
/// 仅持有弱引用，因此不会延长订阅者的生命周期，也不会与
/// 持有总线的订阅者形成引用环；弱引用同时保证在注册期间
/// 该地址不会被复用。
#[derive(Clone)]
pub struct SubscriberRef {
    key: usize,
    type_name: &'static str,
    anchor: Weak<dyn Any + Send + Sync>,
}

impl SubscriberRef {
    pub fn of<S: Send + Sync + 'static>(subscriber: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        let anchor: Weak<dyn Any + Send + Sync> = weak;
        Self {
            key: Arc::as_ptr(subscriber) as *const () as usize,
            type_name: type_name::<S>(),
            anchor,
        }
    }

    /// 身份键（订阅者的地址）
    pub fn key(&self) -> usize {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_alive(&self) -> bool {
        self.anchor.strong_count() > 0
    }
}

impl PartialEq for SubscriberRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SubscriberRef {}

impl Hash for SubscriberRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for SubscriberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.type_name, self.key)
    }
}

type CallbackFn = dyn Fn(&EventRef) -> CallbackResult + Send + Sync;

/// 类型擦除后的单参数回调
#[derive(Clone)]
pub struct Callback {
    f: Arc<CallbackFn>,
}

impl Callback {
    pub fn new<E, F>(f: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(move |event: &EventRef| match event.downcast_ref::<E>() {
                Some(event) => f(event),
                None => Err(anyhow!(
                    "callback expects {}, got {}",
                    type_name::<E>(),
                    event.event_type()
                )),
            }),
        }
    }

    pub(crate) fn call(&self, event: &EventRef) -> CallbackResult {
        (self.f)(event)
    }
}

/// 一条 (事件类型, 回调) 绑定
#[derive(Clone)]
pub struct Binding {
    event_type: EventType,
    callback: Callback,
}

impl Binding {
    pub fn new<E, F>(f: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            event_type: EventType::of::<E>(),
            callback: Callback::new(f),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub(crate) fn into_callback(self) -> Callback {
        self.callback
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// 为订阅者 `S` 收集绑定的构建器，回调以 `&S` 作为接收者
pub struct Bindings<S> {
    subscriber: Weak<S>,
    list: Vec<Binding>,
}

impl<S: Send + Sync + 'static> Bindings<S> {
    pub fn new(subscriber: &Arc<S>) -> Self {
        Self {
            subscriber: Arc::downgrade(subscriber),
            list: Vec::new(),
        }
    }

    /// 绑定一个事件类型的回调；同一事件类型重复绑定会在注册时报重复订阅
    pub fn on<E, F>(&mut self, f: F) -> &mut Self
    where
        E: Event,
        F: Fn(&S, &E) -> CallbackResult + Send + Sync + 'static,
    {
        let subscriber = self.subscriber.clone();
        self.list.push(Binding::new::<E, _>(move |event| {
            match subscriber.upgrade() {
                Some(s) => f(&*s, event),
                None => Err(anyhow!("subscriber {} has been dropped", type_name::<S>())),
            }
        }));
        self
    }

    pub fn into_bindings(self) -> Vec<Binding> {
        self.list
    }
}

/// 回调解析器：给定订阅者，返回有序的绑定列表
pub trait CallbackResolver<S>: Send + Sync {
    fn resolve(&self, subscriber: &Arc<S>) -> Vec<Binding>;
}

/// 订阅者自行声明回调
///
/// ```rust
/// use fanout_core::{Bindings, Subscribe};
///
/// struct Quotes;
///
/// impl Quotes {
///     fn on_price(&self, price: &f64) -> anyhow::Result<()> {
///         println!("price {price}");
///         Ok(())
///     }
/// }
///
/// impl Subscribe for Quotes {
///     fn subscriptions(bindings: &mut Bindings<Self>) {
///         bindings.on(Self::on_price);
///     }
/// }
/// ```
pub trait Subscribe: Send + Sync + Sized + 'static {
    fn subscriptions(bindings: &mut Bindings<Self>);
}

/// 默认解析器：读取 `Subscribe` 声明的回调
#[derive(Clone, Copy, Debug, Default)]
pub struct DeclaredCallbacks;

impl<S: Subscribe> CallbackResolver<S> for DeclaredCallbacks {
    fn resolve(&self, subscriber: &Arc<S>) -> Vec<Binding> {
        let mut bindings = Bindings::new(subscriber);
        S::subscriptions(&mut bindings);
        bindings.into_bindings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn on_text(&self, event: &String) -> CallbackResult {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn on_number(&self, event: &i32) -> CallbackResult {
            self.seen.lock().unwrap().push(event.to_string());
            Ok(())
        }
    }

    impl Subscribe for Recorder {
        fn subscriptions(bindings: &mut Bindings<Self>) {
            bindings.on(Self::on_text).on(Self::on_number);
        }
    }

    #[test]
    fn subscriber_identity_is_pointer_identity() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());

        assert_eq!(SubscriberRef::of(&a), SubscriberRef::of(&a.clone()));
        assert_ne!(SubscriberRef::of(&a), SubscriberRef::of(&b));
        assert!(SubscriberRef::of(&a).type_name().ends_with("Recorder"));
    }

    #[test]
    fn declared_callbacks_keep_declaration_order() {
        let recorder = Arc::new(Recorder::default());
        let bindings = DeclaredCallbacks.resolve(&recorder);

        let types: Vec<EventType> = bindings.iter().map(Binding::event_type).collect();
        assert_eq!(types, vec![EventType::of::<String>(), EventType::of::<i32>()]);

        bindings[0]
            .callback
            .call(&EventRef::new(String::from("Hello")))
            .unwrap();
        bindings[1].callback.call(&EventRef::new(10_i32)).unwrap();
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["Hello", "10"]);
    }

    #[test]
    fn callback_reports_dropped_subscriber_and_wrong_event() {
        let recorder = Arc::new(Recorder::default());
        let bindings = DeclaredCallbacks.resolve(&recorder);

        let wrong = bindings[0].callback.call(&EventRef::new(1_u8));
        assert!(wrong.unwrap_err().to_string().contains("callback expects"));

        drop(recorder);
        let dropped = bindings[0].callback.call(&EventRef::new(String::from("late")));
        assert!(dropped.unwrap_err().to_string().contains("has been dropped"));
    }
}
