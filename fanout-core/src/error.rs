//! 事件总线统一错误定义
//!
//! 核心层（注册表、投递引擎）只产生 `SubscriptionError`；
//! 对调用方可见的 `BusError` 只由 `ExceptionPolicy` 构造，
//! 以保证“抛出还是记录”的决策只有一个出口。
//!
use thiserror::Error;

/// 核心层错误（注册表与投递引擎）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SubscriptionError {
    // --- 订阅注册 ---
    #[error("duplicate subscription: subscriber={subscriber}, event_type={event_type}")]
    DuplicateSubscription {
        subscriber: &'static str,
        event_type: &'static str,
    },
    #[error("subscriber not found: subscriber={subscriber}")]
    SubscriberNotFound { subscriber: &'static str },
    #[error("subscription not found: subscriber={subscriber}, event_type={event_type}")]
    SubscriptionNotFound {
        subscriber: &'static str,
        event_type: &'static str,
    },

    // --- 投递 ---
    #[error("filter type mismatch: expected={expected}, found={found}")]
    FilterTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("filter failed: subscriber={subscriber}, event_type={event_type}, reason={reason}")]
    FilterEvaluation {
        subscriber: &'static str,
        event_type: &'static str,
        reason: String,
    },
    #[error("callback failed: subscriber={subscriber}, event_type={event_type}, reason={reason}")]
    CallbackInvocation {
        subscriber: &'static str,
        event_type: &'static str,
        reason: String,
    },
    #[error("lane closed: lane={lane}")]
    LaneClosed { lane: usize },

    // --- 生命周期/配置 ---
    #[error("failed to spawn lane {lane}: {source}")]
    LaneSpawn {
        lane: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

impl SubscriptionError {
    /// “未找到”族错误：对未注册的订阅者或事件类型进行操作
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SubscriberNotFound { .. } | Self::SubscriptionNotFound { .. }
        )
    }
}

/// 核心层 Result 类型别名
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// 总线错误：携带总线标识与触发操作的上下文
#[derive(Debug, Error)]
#[error("{bus_id}: {context}: {source}")]
pub struct BusError {
    bus_id: String,
    context: &'static str,
    #[source]
    source: SubscriptionError,
}

impl BusError {
    pub(crate) fn new(bus_id: impl Into<String>, context: &'static str, source: SubscriptionError) -> Self {
        Self {
            bus_id: bus_id.into(),
            context,
            source,
        }
    }

    pub fn bus_id(&self) -> &str {
        &self.bus_id
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    /// 触发该错误的核心层原因
    pub fn kind(&self) -> &SubscriptionError {
        &self.source
    }

    pub fn into_kind(self) -> SubscriptionError {
        self.source
    }
}

/// 总线 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn bus_error_carries_bus_id_context_and_source() {
        let err = BusError::new(
            "orders",
            "add subscriber",
            SubscriptionError::DuplicateSubscription {
                subscriber: "Tester",
                event_type: "alloc::string::String",
            },
        );

        assert_eq!(err.bus_id(), "orders");
        assert_eq!(err.context(), "add subscriber");
        assert!(matches!(
            err.kind(),
            SubscriptionError::DuplicateSubscription { .. }
        ));
        assert!(err.to_string().starts_with("orders: add subscriber: duplicate subscription"));
        assert!(err.source().is_some());
    }

    #[test]
    fn not_found_family() {
        assert!(SubscriptionError::SubscriberNotFound { subscriber: "S" }.is_not_found());
        assert!(
            SubscriptionError::SubscriptionNotFound {
                subscriber: "S",
                event_type: "E"
            }
            .is_not_found()
        );
        assert!(!SubscriptionError::LaneClosed { lane: 0 }.is_not_found());
    }
}
