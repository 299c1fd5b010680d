//! 锚点帧行进度屏障
//!
//! B 帧直接模式要读未来锚点帧的共定位 MV; 帧级并行时锚点可能尚未
//! 解完, B 帧按宏块行等待锚点的解码进度. 进度单调递增, 整帧完成用
//! `finish` 一次性放行.

use std::sync::{Condvar, Mutex};

#[derive(Debug)]
pub(super) struct RowProgress {
    rows: Mutex<i64>,
    cond: Condvar,
}

impl RowProgress {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(-1),
            cond: Condvar::new(),
        }
    }

    /// 报告第 `row` 行 (含) 之前的宏块已全部解码
    pub fn report(&self, row: usize) {
        let mut done = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *done < row as i64 {
            *done = row as i64;
            self.cond.notify_all();
        }
    }

    /// 整帧完成, 放行所有等待者
    pub fn finish(&self, mb_height: usize) {
        self.report(mb_height);
    }

    /// 阻塞到第 `row` 行可用
    pub fn wait_for(&self, row: usize) {
        let mut done = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *done < row as i64 {
            done = match self.cond.wait(done) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_行进度等待与放行() {
        let progress = Arc::new(RowProgress::new());
        let waiter = Arc::clone(&progress);
        let handle = thread::spawn(move || {
            waiter.wait_for(2);
            true
        });

        progress.report(0);
        progress.report(2);
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_进度单调不回退() {
        let progress = RowProgress::new();
        progress.report(5);
        progress.report(3);
        // 回退报告被忽略, 第 5 行仍可用
        progress.wait_for(5);
    }
}
