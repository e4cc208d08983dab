/// 同步总线的重入发布示例
/// 订单回调在处理时发布成交事件，成交回调再发布一条确认；所有事件在
/// 最外层 `publish` 返回前按 FIFO 顺序处理完毕，调用栈不会嵌套增长。
use anyhow::Result as AnyResult;
use fanout_core::{Bindings, Delivery, Subscribe, SyncEventBus};
use std::sync::{Arc, Mutex, OnceLock, Weak};

#[derive(Debug, Clone)]
struct Order {
    id: u32,
    qty: u32,
}

#[derive(Debug, Clone)]
struct Execution {
    order_id: u32,
    filled: u32,
}

#[derive(Default)]
struct TradingDesk {
    bus: OnceLock<Weak<SyncEventBus>>,
    journal: Mutex<Vec<String>>,
}

impl TradingDesk {
    fn bus(&self) -> AnyResult<Arc<SyncEventBus>> {
        self.bus
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| anyhow::anyhow!("bus is gone"))
    }

    fn on_order(&self, order: &Order) -> AnyResult<()> {
        self.journal.lock().unwrap().push(format!("order #{} qty={}", order.id, order.qty));
        // 回调内发布：只是排入当前线程的队列
        let delivery = self.bus()?.publish(Execution {
            order_id: order.id,
            filled: order.qty,
        })?;
        assert_eq!(delivery, Delivery::Queued);
        Ok(())
    }

    fn on_execution(&self, exec: &Execution) -> AnyResult<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("execution for #{} filled={}", exec.order_id, exec.filled));
        self.bus()?.publish(format!("confirmed #{}", exec.order_id))?;
        Ok(())
    }

    fn on_note(&self, note: &String) -> AnyResult<()> {
        self.journal.lock().unwrap().push(note.clone());
        Ok(())
    }
}

impl Subscribe for TradingDesk {
    fn subscriptions(bindings: &mut Bindings<Self>) {
        bindings
            .on(Self::on_order)
            .on(Self::on_execution)
            .on(Self::on_note);
    }
}

fn main() -> AnyResult<()> {
    let bus = Arc::new(SyncEventBus::new());
    let desk = Arc::new(TradingDesk::default());
    let _ = desk.bus.set(Arc::downgrade(&bus));
    bus.add_subscriber(&desk)?;

    for (id, qty) in [(1, 100), (2, 250)] {
        let delivery = bus.publish(Order { id, qty })?;
        println!("publish order #{id} -> {delivery:?}");
    }

    println!("journal:");
    for line in desk.journal.lock().unwrap().iter() {
        println!("  {line}");
    }
    Ok(())
}
