/// 最新事件缓存示例
/// 行情订阅者暂停期间只保留最新报价；恢复时自动补发那一条，
/// 之后照常接收实时报价。
use anyhow::Result as AnyResult;
use fanout_core::{AsyncEventBus, Bindings, BusConfig, EventFilter, Subscribe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Quote {
    ticker: &'static str,
    price: f64,
}

#[derive(Default)]
struct Dashboard {
    shown: Mutex<Vec<String>>,
}

impl Dashboard {
    fn on_quote(&self, quote: &Quote) -> AnyResult<()> {
        self.shown
            .lock()
            .unwrap()
            .push(format!("{} {:.2}", quote.ticker, quote.price));
        Ok(())
    }
}

impl Subscribe for Dashboard {
    fn subscriptions(bindings: &mut Bindings<Self>) {
        bindings.on(Self::on_quote);
    }
}

fn catch_up() {
    thread::sleep(Duration::from_millis(50));
}

fn main() -> AnyResult<()> {
    let bus = AsyncEventBus::with_config(BusConfig::builder().bus_id("quotes").lane_count(2).build())?;
    let dashboard = Arc::new(Dashboard::default());
    bus.add_subscriber(&dashboard)?;

    bus.publish(Quote { ticker: "MSFT", price: 42.40 })?;
    catch_up();

    // 暂停：只缓存最新报价
    bus.set_cache_last_event::<Quote, _>(&dashboard, true)?;
    for price in [42.45, 42.50, 42.55] {
        bus.publish(Quote { ticker: "MSFT", price })?;
    }
    if let Some(latest) = bus.poll_cached_event::<Quote>() {
        println!("cached while paused: {latest:?}");
    }

    // 恢复：补发缓存的那一条
    bus.set_cache_last_event::<Quote, _>(&dashboard, false)?;
    catch_up();

    // 只显示大幅变动
    bus.set_event_filter::<Quote, _>(&dashboard, Some(EventFilter::new(|q: &Quote| q.price > 43.0)))?;
    bus.publish(Quote { ticker: "MSFT", price: 42.60 })?;
    bus.publish(Quote { ticker: "MSFT", price: 43.10 })?;
    catch_up();

    println!("dashboard:");
    for line in dashboard.shown.lock().unwrap().iter() {
        println!("  {line}");
    }

    bus.remove_all_cached_events();
    bus.shutdown();
    Ok(())
}
