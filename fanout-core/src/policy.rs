//! 错误处理策略（ExceptionPolicy）
//!
//! 总线上所有注册与投递错误的唯一出口：
//! - `Propagate`：包装为带总线标识的 `BusError` 返回给调用方；
//! - `LogAndSuppress`：以 warn 级别记录后吞掉。
//!
use crate::error::{BusError, BusResult, SubscriptionError};
use serde::Deserialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    #[default]
    Propagate,
    LogAndSuppress,
}

#[derive(Clone, Debug)]
pub struct ExceptionPolicy {
    bus_id: String,
    mode: ErrorMode,
}

impl ExceptionPolicy {
    pub fn new(bus_id: impl Into<String>, mode: ErrorMode) -> Self {
        Self {
            bus_id: bus_id.into(),
            mode,
        }
    }

    pub fn bus_id(&self) -> &str {
        &self.bus_id
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    pub fn handle(&self, context: &'static str, cause: SubscriptionError) -> BusResult<()> {
        match self.mode {
            ErrorMode::Propagate => Err(BusError::new(self.bus_id.clone(), context, cause)),
            ErrorMode::LogAndSuppress => {
                warn!(bus_id = %self.bus_id, context, error = %cause, "error suppressed");
                Ok(())
            }
        }
    }

    /// 成功时原样返回；失败时交给 `handle`，被吞掉则返回 `fallback`
    pub(crate) fn apply<T>(
        &self,
        context: &'static str,
        result: Result<T, SubscriptionError>,
        fallback: impl FnOnce() -> T,
    ) -> BusResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(cause) => self.handle(context, cause).map(|()| fallback()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane_closed() -> SubscriptionError {
        SubscriptionError::LaneClosed { lane: 1 }
    }

    #[test]
    fn propagate_wraps_with_bus_id() {
        let policy = ExceptionPolicy::new("quotes", ErrorMode::Propagate);
        let err = policy.handle("publish", lane_closed()).unwrap_err();

        assert_eq!(err.bus_id(), "quotes");
        assert_eq!(err.context(), "publish");
        assert_eq!(err.to_string(), "quotes: publish: lane closed: lane=1");
    }

    #[test]
    fn suppress_swallows_and_applies_fallback() {
        let policy = ExceptionPolicy::new("quotes", ErrorMode::LogAndSuppress);
        assert!(policy.handle("publish", lane_closed()).is_ok());

        let value = policy.apply("publish", Err(lane_closed()), || 7).unwrap();
        assert_eq!(value, 7);
        assert_eq!(policy.apply("publish", Ok(3), || 7).unwrap(), 3);
    }
}
