//! 总线配置（BusConfig）
//!
//! 既可通过 builder 构造，也可从任意 serde 数据源反序列化；
//! 缺省字段回落到默认值。
//!
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::policy::ErrorMode;
use bon::Builder;
use serde::Deserialize;

pub const DEFAULT_BUS_ID: &str = "EventBus";
pub const DEFAULT_LANE_COUNT: usize = 10;

#[derive(Builder, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 总线标识，出现在日志与错误信息中
    #[builder(into, default = DEFAULT_BUS_ID.to_string())]
    pub bus_id: String,
    /// 分区投递的 lane 数量（仅异步总线使用）
    #[builder(default = DEFAULT_LANE_COUNT)]
    pub lane_count: usize,
    /// 投递/注册错误的处理方式
    #[builder(default)]
    pub error_mode: ErrorMode,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_id: DEFAULT_BUS_ID.to_string(),
            lane_count: DEFAULT_LANE_COUNT,
            error_mode: ErrorMode::default(),
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> SubscriptionResult<()> {
        if self.lane_count == 0 {
            return Err(SubscriptionError::InvalidConfig {
                reason: "lane_count must be greater than zero".to_string(),
            });
        }
        if self.bus_id.trim().is_empty() {
            return Err(SubscriptionError::InvalidConfig {
                reason: "bus_id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        assert_eq!(BusConfig::builder().build(), BusConfig::default());

        let config = BusConfig::builder()
            .bus_id("orders")
            .lane_count(4)
            .error_mode(ErrorMode::LogAndSuppress)
            .build();
        assert_eq!(config.bus_id, "orders");
        assert_eq!(config.lane_count, 4);
        assert_eq!(config.error_mode, ErrorMode::LogAndSuppress);
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: BusConfig = serde_json::from_str(r#"{"lane_count": 3}"#).unwrap();
        assert_eq!(config.bus_id, DEFAULT_BUS_ID);
        assert_eq!(config.lane_count, 3);
        assert_eq!(config.error_mode, ErrorMode::Propagate);

        let config: BusConfig =
            serde_json::from_str(r#"{"bus_id": "quotes", "error_mode": "log_and_suppress"}"#).unwrap();
        assert_eq!(config.bus_id, "quotes");
        assert_eq!(config.lane_count, DEFAULT_LANE_COUNT);
        assert_eq!(config.error_mode, ErrorMode::LogAndSuppress);

        assert!(serde_json::from_str::<BusConfig>(r#"{"error_mode": "explode"}"#).is_err());
    }

    #[test]
    fn validate_rejects_zero_lanes_and_blank_id() {
        assert!(BusConfig::default().validate().is_ok());

        let zero = BusConfig::builder().lane_count(0).build();
        assert!(matches!(
            zero.validate(),
            Err(SubscriptionError::InvalidConfig { .. })
        ));

        let blank = BusConfig::builder().bus_id("  ").build();
        assert!(blank.validate().is_err());
    }
}
