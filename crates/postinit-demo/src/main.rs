#![doc = r#"
# postinit-demo

## 设计动机（Why）
- 复现“服务尚未初始化完成就被调用”的启动时序：日志后端需要数秒才能就绪，
  而业务调用方在进程启动的第一时间就开始写日志；
- 同时展示两类调用方：`caller1` 假定服务已就绪（`strict`），`caller2` 容忍未就绪（`deferred`）。

## 执行流程（How）
1. 加载配置并安装 `tracing` 订阅者；
2. 构造服务句柄，在后台线程启动初始化器并拿到显式句柄；
3. 交替发起 `rounds` 轮 strict/deferred 调用，打印 strict 的失败；
4. `join` 初始化句柄，输出回放报告与计数快照；初始化失败时以非零状态退出。
"#]

mod config;
mod setup;
mod sink;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use postinit_core::DeferredService;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DemoConfig;
use crate::setup::SimulatedSetup;
use crate::sink::LogSink;

const USAGE: &str = "usage: postinit-demo [--config <file.toml>]";

fn main() -> Result<()> {
    let config = match parse_config_path(env::args().skip(1))? {
        Some(path) => DemoConfig::from_path(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DemoConfig::default(),
    };
    init_tracing(&config.startup.log_filter);

    let (service, initializer) = DeferredService::new(LogSink::stdout());
    let setup = SimulatedSetup::new(config.startup.setup_delay()).failing(config.simulate_failure);
    let handle = initializer
        .spawn_named(config.startup.init_thread_name.clone(), setup)
        .context("starting initializer")?;

    for round in 1..=config.rounds {
        // caller1 假定日志服务已经初始化。
        if let Err(err) = service.strict(format!("func: caller1 value-{round}")) {
            println!("Error on caller1 {round}: {err}");
        }
        // caller2 容忍未初始化，消息会在就绪后回放。
        if let Err(err) = service.deferred(format!("func: caller2 value-{round}")) {
            println!("Error on caller2 {round}: {err}");
        }
    }

    let outcome = handle.join();
    let stats = serde_json::to_string(&service.stats()).context("serializing stats")?;
    match outcome {
        Ok(report) => {
            info!(
                replayed = report.replayed(),
                failed = report.failures().len(),
                setup_ms = report.setup_elapsed().as_millis() as u64,
                %stats,
                "initialization complete"
            );
            Ok(())
        }
        Err(err) => {
            warn!(
                pending = service.pending_len(),
                %stats,
                "service will never become ready"
            );
            Err(err).context("initialization failed")
        }
    }
}

fn parse_config_path(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>> {
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let Some(value) = args.next() else {
                    bail!("missing value for {arg}\n{USAGE}");
                };
                path = Some(PathBuf::from(value));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unexpected argument `{other}`\n{USAGE}"),
        }
    }
    Ok(path)
}

fn init_tracing(fallback_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter));
    // 订阅者已存在时（例如被嵌入测试进程）保留原有订阅者。
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
