//! 演示用的底层操作：逐行写出日志消息。
use std::io::{self, Write};

use parking_lot::Mutex;
use postinit_core::Operation;

/// 将每条消息写为一行 ``got message to log `<msg>` ``。
pub struct LogSink<W> {
    writer: Mutex<W>,
}

impl LogSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W> LogSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 在持锁状态下检查底层写入目标。
    #[cfg(test)]
    pub fn inspect<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        f(&self.writer.lock())
    }
}

impl<W> Operation for LogSink<W>
where
    W: Write + Send + 'static,
{
    type Payload = String;
    type Error = io::Error;

    fn execute(&self, message: String) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "got message to log `{message}`")?;
        writer.flush()
    }
}
