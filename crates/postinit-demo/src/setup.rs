//! 模拟的慢速初始化步骤。
use std::thread;
use std::time::Duration;

use postinit_core::Setup;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("simulated logger backend failed to start")]
pub struct SimulatedFailure;

/// 休眠固定时长后完成（或按配置失败）。
#[derive(Clone, Copy, Debug)]
pub struct SimulatedSetup {
    delay: Duration,
    fail: bool,
}

impl SimulatedSetup {
    pub fn new(delay: Duration) -> Self {
        Self { delay, fail: false }
    }

    pub fn failing(mut self, fail: bool) -> Self {
        self.fail = fail;
        self
    }
}

impl Setup for SimulatedSetup {
    type Error = SimulatedFailure;

    fn setup(self) -> Result<(), SimulatedFailure> {
        info!(delay_ms = self.delay.as_millis() as u64, "logger backend starting");
        thread::sleep(self.delay);
        if self.fail {
            return Err(SimulatedFailure);
        }
        info!("Init");
        Ok(())
    }
}
