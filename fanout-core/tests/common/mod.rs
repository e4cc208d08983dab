#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

/// 轮询直到条件成立或超时；返回最后一次求值结果
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// 异步投递的等待上限
pub const CATCH_UP: Duration = Duration::from_secs(5);

/// 给 lane 一点时间处理“不应发生”的投递
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}
