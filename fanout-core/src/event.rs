//! 事件与事件类型
//!
//! 事件按运行时类型匹配订阅：`EventType` 以 `TypeId` 作为身份，
//! 同时保留类型名用于日志与错误信息。
//!
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 可在总线上分发的事件
///
/// 任何 `Send + Sync + 'static` 类型都自动实现该 trait。
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

/// 事件类型标签（用作映射键）
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 类型擦除后的事件实例，克隆只增加引用计数
#[derive(Clone)]
pub struct EventRef {
    event_type: EventType,
    payload: Arc<dyn Any + Send + Sync>,
}

impl EventRef {
    pub fn new<E: Event>(event: E) -> Self {
        Self::from_arc(Arc::new(event))
    }

    pub fn from_arc<E: Event>(event: Arc<E>) -> Self {
        Self {
            event_type: EventType::of::<E>(),
            payload: event,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// 还原为具体类型的共享引用；类型不符时返回 `None`
    pub fn downcast<E: Event>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.payload).downcast::<E>().ok()
    }
}

impl fmt::Debug for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRef")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}
