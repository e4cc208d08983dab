use anyhow::Result as AnyResult;
use fanout_core::{AsyncEventBus, Bindings, BusConfig, EventFilter, Subscribe, SyncEventBus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 一个带有三个回调的订阅者
#[derive(Default)]
struct Tester {
    units: AtomicUsize,
    strings: AtomicUsize,
    ints: AtomicUsize,
}

impl Tester {
    fn on_unit(&self, _: &()) -> AnyResult<()> {
        let count = self.units.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "callback unit");
        Ok(())
    }

    fn on_string(&self, event: &String) -> AnyResult<()> {
        let count = self.strings.fetch_add(1, Ordering::SeqCst) + 1;
        info!(event = %event, count, "callback string");
        Ok(())
    }

    fn on_int(&self, event: &i32) -> AnyResult<()> {
        let count = self.ints.fetch_add(1, Ordering::SeqCst) + 1;
        info!(event, count, "callback integer");
        Ok(())
    }
}

impl Subscribe for Tester {
    fn subscriptions(bindings: &mut Bindings<Self>) {
        bindings
            .on(Self::on_unit)
            .on(Self::on_string)
            .on(Self::on_int);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .init();
}

fn catch_up() {
    thread::sleep(Duration::from_millis(20));
}

fn main() -> AnyResult<()> {
    init_tracing();
    let tester = Arc::new(Tester::default());

    info!("sync bus");
    let sync_bus = SyncEventBus::with_config(BusConfig::builder().bus_id("SyncMyBus").build())?;
    sync_bus.add_subscriber(&tester)?;
    sync_bus.publish(String::from("Hello"))?;
    sync_bus.publish(55_i32)?;
    sync_bus.publish(())?;
    // 无人订阅：仅记录 warn
    sync_bus.publish(1939.50_f64)?;

    info!("async bus");
    let async_bus = AsyncEventBus::with_config(
        BusConfig::builder()
            .bus_id("AsyncMyBus")
            .lane_count(4)
            .build(),
    )?;
    async_bus.add_subscriber(&tester)?;
    async_bus.publish(String::from("World"))?;
    async_bus.publish(155_i32)?;
    catch_up();
    async_bus.remove_subscriber(&tester)?;

    info!("async bus with filter");
    async_bus.add_subscriber(&tester)?;
    async_bus.set_event_filter::<i32, _>(&tester, Some(EventFilter::new(|t: &i32| *t > 10_000)))?;
    async_bus.publish(500_i32)?;
    async_bus.publish(20_000_i32)?;
    catch_up();

    async_bus.shutdown();
    info!(
        strings = tester.strings.load(Ordering::SeqCst),
        ints = tester.ints.load(Ordering::SeqCst),
        units = tester.units.load(Ordering::SeqCst),
        "done"
    );
    Ok(())
}
