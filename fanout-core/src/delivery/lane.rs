//! 单消费者 lane：一个专用线程按 FIFO 逐个执行任务，从不与自身并发。
//!
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::event::EventRef;
use crate::subscription::Subscription;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) struct LaneTask {
    pub(crate) subscription: Arc<Subscription>,
    pub(crate) event: EventRef,
}

pub(crate) struct Lane {
    index: usize,
    sender: RwLock<Option<mpsc::UnboundedSender<LaneTask>>>,
}

impl Lane {
    pub(crate) fn spawn(index: usize, token: CancellationToken) -> SubscriptionResult<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<LaneTask>();

        thread::Builder::new()
            .name(format!("fanout-lane-{index}"))
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    // 关闭后丢弃尚未执行的任务
                    if token.is_cancelled() {
                        break;
                    }
                    if let Err(err) = task.subscription.invoke(&task.event) {
                        warn!(lane = index, error = %err, "callback failed in lane");
                    }
                }
                debug!(lane = index, "lane stopped");
            })
            .map_err(|source| SubscriptionError::LaneSpawn { lane: index, source })?;

        Ok(Self {
            index,
            sender: RwLock::new(Some(tx)),
        })
    }

    /// 只在入队期间短暂持有读锁，不等待回调执行
    pub(crate) fn submit(&self, task: LaneTask) -> SubscriptionResult<()> {
        let closed = SubscriptionError::LaneClosed { lane: self.index };
        match self.sender.read().as_ref() {
            Some(tx) => tx.send(task).map_err(|_| closed),
            None => Err(closed),
        }
    }

    /// 停止接收新任务；工作线程在队列关闭或取消后自行退出
    pub(crate) fn close(&self) {
        self.sender.write().take();
    }
}
