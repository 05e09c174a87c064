#![cfg(not(any(loom, postinit_loom)))]
//! 延迟分派端到端契约测试。
//!
//! # 教案式导航
//! - **核心目标 (Why)**：以真实线程驱动 `strict`/`deferred` 与后台初始化器并发运行，
//!   验证快速失败、排队回放、就绪直通与“无丢失、无重复”四类不变量。
//! - **执行策略 (How)**：底层操作统一使用 [`Journal`] 记录执行序列；初始化步骤通过通道放行，
//!   以便测试精确控制“就绪前 / 就绪后”的时间窗口。
//! - **契约声明 (What)**：任一测试结束时，`Journal` 中的条目即为底层操作被调用的完整历史。

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use postinit_core::{
    DeferredService, Dispatch, DispatchError, InitError, Operation, PendingEntry, PendingQueue,
    ReadinessState,
};
use tracing_test::traced_test;

/// 记录每次执行的底层操作；载荷以 `fail:` 开头时返回错误。
#[derive(Default)]
struct Journal {
    lines: Mutex<Vec<String>>,
}

impl Journal {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("poison").clone()
    }
}

impl Operation for Journal {
    type Payload = String;
    type Error = io::Error;

    fn execute(&self, line: String) -> Result<(), io::Error> {
        if line.starts_with("fail:") {
            return Err(io::Error::other(format!("refused `{line}`")));
        }
        self.lines.lock().expect("poison").push(line);
        Ok(())
    }
}

/// 返回一个等待放行信号的初始化步骤，以及放行端。
fn gated_setup() -> (
    impl FnOnce() -> Result<(), io::Error> + Send + 'static,
    mpsc::Sender<()>,
) {
    let (release, wait) = mpsc::channel::<()>();
    let setup = move || {
        wait.recv()
            .map_err(|_| io::Error::other("setup released without signal"))
    };
    (setup, release)
}

/// 场景：启动瞬间发起 5 次 strict 与 5 次 deferred，初始化耗时 5 个时间单位。
#[test]
fn startup_scenario_rejects_strict_and_replays_deferred() {
    let (service, initializer) = DeferredService::new(Journal::default());
    let handle = initializer
        .spawn(|| {
            thread::sleep(Duration::from_millis(50));
            Ok::<_, io::Error>(())
        })
        .expect("初始化线程创建应成功");

    for idx in 1..=5 {
        let err = service
            .strict(format!("func: caller1 value-{idx}"))
            .expect_err("初始化完成前 strict 必须失败");
        assert!(matches!(err, DispatchError::NotInitialized));

        let dispatch = service
            .deferred(format!("func: caller2 value-{idx}"))
            .expect("deferred 必须立即返回成功");
        assert!(dispatch.is_queued(), "初始化完成前应进入队列");
    }

    let report = handle.join().expect("初始化应成功");
    assert_eq!(report.replayed(), 5);
    assert!(report.setup_elapsed() >= Duration::from_millis(50));
    assert_eq!(
        service.operation().lines(),
        (1..=5)
            .map(|idx| format!("func: caller2 value-{idx}"))
            .collect::<Vec<_>>(),
        "回放必须恰好 5 次且保持调用顺序"
    );

    let stats = service.stats();
    assert_eq!(stats.strict_rejected, 5);
    assert_eq!(stats.deferred_queued, 5);
    assert_eq!(stats.replayed, 5);
    assert_eq!(stats.executions(), 5);
}

#[test]
fn strict_never_touches_operation_before_ready() {
    let (service, initializer) = DeferredService::new(Journal::default());
    let (setup, release) = gated_setup();
    let handle = initializer.spawn(setup).expect("初始化线程创建应成功");

    let callers: Vec<_> = (0..4)
        .map(|caller| {
            let service = service.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|idx| service.strict(format!("{caller}-{idx}")))
                    .filter(|outcome| matches!(outcome, Err(DispatchError::NotInitialized)))
                    .count()
            })
        })
        .collect();
    let rejected: usize = callers
        .into_iter()
        .map(|caller| caller.join().expect("调用线程不应 panic"))
        .sum();

    assert_eq!(rejected, 100);
    assert!(service.operation().lines().is_empty());

    release.send(()).expect("初始化线程应仍在等待");
    handle.join().expect("初始化应成功");
    assert!(service.operation().lines().is_empty(), "strict 调用不会被回放");
}

#[test]
fn concurrent_deferred_calls_replay_once_in_sequence_order() {
    const CALLERS: usize = 8;
    const PER_CALLER: usize = 50;

    let (service, initializer) = DeferredService::new(Journal::default());
    let barrier = Arc::new(Barrier::new(CALLERS));
    let callers: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_CALLER)
                    .map(|idx| {
                        let line = format!("{caller}:{idx}");
                        match service.deferred(line.clone()) {
                            Ok(Dispatch::Queued { sequence }) => (sequence, line),
                            other => panic!("就绪前 deferred 必须入队，实际为 {other:?}"),
                        }
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut acknowledged: Vec<(u64, String)> = callers
        .into_iter()
        .flat_map(|caller| caller.join().expect("调用线程不应 panic"))
        .collect();
    assert_eq!(service.pending_len(), CALLERS * PER_CALLER);

    let report = initializer
        .run(|| Ok::<_, io::Error>(()))
        .expect("初始化应成功");
    assert_eq!(report.replayed(), CALLERS * PER_CALLER);

    acknowledged.sort_by_key(|(sequence, _)| *sequence);
    let expected: Vec<String> = acknowledged.into_iter().map(|(_, line)| line).collect();
    let executed = service.operation().lines();
    assert_eq!(executed, expected, "回放顺序必须与到达序号一致");

    // 每个调用方自身的提交顺序同样被保留。
    for caller in 0..CALLERS {
        let prefix = format!("{caller}:");
        let own: Vec<_> = executed
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .cloned()
            .collect();
        let issued: Vec<_> = (0..PER_CALLER).map(|idx| format!("{caller}:{idx}")).collect();
        assert_eq!(own, issued);
    }
}

#[test]
fn deferred_calls_racing_initialization_run_exactly_once() {
    const CALLERS: usize = 6;
    const PER_CALLER: usize = 200;

    let (service, initializer) = DeferredService::new(Journal::default());
    let (setup, release) = gated_setup();
    let handle = initializer.spawn(setup).expect("初始化线程创建应成功");

    let barrier = Arc::new(Barrier::new(CALLERS + 1));
    let callers: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for idx in 0..PER_CALLER {
                    service
                        .deferred(format!("{caller}:{idx}"))
                        .expect("deferred 不应失败");
                    if idx % 16 == 0 {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    release.send(()).expect("初始化线程应仍在等待");
    for caller in callers {
        caller.join().expect("调用线程不应 panic");
    }
    let report = handle.join().expect("初始化应成功");

    let executed = service.operation().lines();
    assert_eq!(executed.len(), CALLERS * PER_CALLER, "每个调用恰好执行一次");
    let unique: HashSet<_> = executed.iter().collect();
    assert_eq!(unique.len(), executed.len(), "不得重复执行");
    assert_eq!(service.pending_len(), 0, "不得残留无人消费的条目");

    let stats = service.stats();
    assert_eq!(stats.deferred_queued as usize, report.total());
    assert_eq!(
        stats.deferred_queued + stats.deferred_inline,
        (CALLERS * PER_CALLER) as u64
    );
}

#[test]
fn queue_keeps_every_concurrent_enqueue() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 500;

    let queue = Arc::new(PendingQueue::new());
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for idx in 0..PER_PRODUCER {
                    queue.enqueue((producer, idx));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("生产线程不应 panic");
    }

    let drained = queue.drain_all();
    assert_eq!(drained.len(), PRODUCERS * PER_PRODUCER);
    let sequences: Vec<u64> = drained.entries().iter().map(PendingEntry::sequence).collect();
    let expected: Vec<u64> = (0..(PRODUCERS * PER_PRODUCER) as u64).collect();
    assert_eq!(sequences, expected, "序号连续且无重复");
    assert!(queue.is_empty());
}

#[test]
fn readiness_never_reverts() {
    let (service, initializer) = DeferredService::new(Journal::default());
    let (setup, release) = gated_setup();
    let handle = initializer.spawn(setup).expect("初始化线程创建应成功");

    let observers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || {
                let mut seen_ready = false;
                for _ in 0..100_000 {
                    let ready = service.is_ready();
                    assert!(!(seen_ready && !ready), "观测到就绪后不得回退");
                    seen_ready |= ready;
                    if seen_ready {
                        break;
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    assert_eq!(service.readiness(), ReadinessState::NotReady);
    release.send(()).expect("初始化线程应仍在等待");
    handle.join().expect("初始化应成功");
    assert_eq!(service.readiness(), ReadinessState::Ready);
    for observer in observers {
        observer.join().expect("观察线程不应 panic");
    }
}

#[test]
fn ready_service_returns_real_outcome() {
    let (service, initializer) = DeferredService::new(Journal::default());
    initializer
        .run(|| Ok::<_, io::Error>(()))
        .expect("初始化应成功");

    service.strict("direct".to_owned()).expect("就绪后 strict 应成功");
    assert_eq!(
        service.deferred("inline".to_owned()).expect("就绪后 deferred 应成功"),
        Dispatch::Executed
    );

    let err = service
        .strict("fail:strict".to_owned())
        .expect_err("底层失败必须透传");
    assert_eq!(
        err.into_operation_error().map(|e| e.to_string()).as_deref(),
        Some("refused `fail:strict`")
    );
    let err = service
        .deferred("fail:deferred".to_owned())
        .expect_err("就绪后 deferred 返回真实结果而非入队确认");
    assert!(matches!(err, DispatchError::Operation(_)));

    assert_eq!(service.operation().lines(), ["direct", "inline"]);
    assert_eq!(service.pending_len(), 0);
}

#[test]
fn failed_initialization_is_terminal() {
    let (service, initializer) = DeferredService::new(Journal::default());
    service.deferred("early".to_owned()).expect("入队应成功");

    let handle = initializer
        .spawn(|| Err::<(), _>(io::Error::other("config backend unreachable")))
        .expect("初始化线程创建应成功");
    let err = handle.join().expect_err("初始化应失败");
    assert!(matches!(err, InitError::Setup(_)));
    assert_eq!(
        err.to_string(),
        "initialization setup failed: config backend unreachable"
    );

    assert_eq!(service.readiness(), ReadinessState::NotReady);
    assert!(
        service
            .strict("after failure".to_owned())
            .expect_err("失败后 strict 仍被拒绝")
            .is_not_initialized()
    );
    assert!(
        service
            .deferred("after failure".to_owned())
            .expect("失败后 deferred 仍可入队")
            .is_queued()
    );
    assert_eq!(service.pending_len(), 2);
    assert!(service.operation().lines().is_empty());
}

#[test]
#[traced_test]
fn replay_failures_are_logged_not_returned() {
    let (service, initializer) = DeferredService::new(Journal::default());
    service.deferred("ok-1".to_owned()).expect("入队应成功");
    let ack = service
        .deferred("fail:replay".to_owned())
        .expect("入队确认不感知后续执行结果");
    assert_eq!(ack, Dispatch::Queued { sequence: 1 });
    service.deferred("ok-2".to_owned()).expect("入队应成功");

    let report = initializer
        .run(|| Ok::<_, io::Error>(()))
        .expect("初始化应成功");
    assert_eq!(report.replayed(), 2);
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].sequence, 1);

    assert!(logs_contain("replayed call failed"));
    assert!(logs_contain("refused `fail:replay`"));
    assert_eq!(service.operation().lines(), ["ok-1", "ok-2"]);
}

#[test]
fn stats_snapshot_serializes() {
    let (service, _initializer) = DeferredService::new(Journal::default());
    let _ = service.strict("nope".to_owned());
    service.deferred("later".to_owned()).expect("入队应成功");

    let value = serde_json::to_value(service.stats()).expect("快照应可序列化");
    assert_eq!(value["strict_rejected"], 1);
    assert_eq!(value["deferred_queued"], 1);
    assert_eq!(value["replayed"], 0);
}
