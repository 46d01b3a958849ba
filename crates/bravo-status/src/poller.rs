//! 状态轮询引擎
//!
//! 两种轮询节奏共用同一个原语（按序对每个包类型发请求、间隔短暂停顿）：
//!
//! - **启动期扫描**：构造时同步执行一次（身份、限位、心跳频率），
//!   之后重复调用是无操作；
//! - **实时循环**：`start()` 之后在后台线程持续轮询（模式、速度、
//!   位置、电流、温度），`stop()` 后退出。
//!
//! 生命周期单向：`Created → Primed → Running → Stopped`，`Stopped`
//! 之后不可重启，需要新会话的调用方构造新实例。
//!
//! 传输线程收到的包经有界通道转投到本引擎的更新线程，由更新线程写入
//! [`PropertyCache`]——缓存加锁与传输内部线程完全解耦。

use crate::cache::{PropertyCache, StatusSnapshot};
use crate::cancel::CancelToken;
use bravo_driver::{BravoDriver, ChannelSink, DriverError};
use bravo_protocol::{PacketId, request_for};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// 状态引擎错误类型
#[derive(Error, Debug)]
pub enum StatusError {
    /// 驱动层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 会话已停止，不可重启
    #[error("Status session stopped; construct a new session to restart")]
    Stopped,

    /// 包类型没有对应的请求表条目
    #[error("Packet type {0:?} is not queryable")]
    NotQueryable(PacketId),
}

/// 轮询配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// 相邻两次请求之间的间隔（避免灌满传输）
    pub request_interval: Duration,
    /// 包转投通道容量
    pub channel_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            request_interval: Duration::from_millis(10),
            channel_capacity: 256,
        }
    }
}

/// 更新线程的接收超时：兼作取消检查周期
const UPDATE_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Bravo 状态引擎
pub struct BravoStatus {
    driver: Arc<BravoDriver>,
    cache: Arc<PropertyCache>,
    startup_ids: Vec<PacketId>,
    realtime_ids: Vec<PacketId>,
    config: PollerConfig,
    cancel: CancelToken,
    primed: AtomicBool,
    stopped: AtomicBool,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
    update_thread: Mutex<Option<JoinHandle<()>>>,
}

impl BravoStatus {
    /// 以默认包列表和配置创建（实时 = [`PacketId::REALTIME`]，
    /// 启动期 = [`PacketId::STARTUP`]）
    pub fn with_defaults(driver: Arc<BravoDriver>) -> Result<Self, StatusError> {
        Self::new(
            driver,
            PacketId::REALTIME.to_vec(),
            PacketId::STARTUP.to_vec(),
            PollerConfig::default(),
        )
    }

    /// 创建状态引擎并同步执行启动期扫描
    ///
    /// 驱动必须已经连接（回调注册要求连接状态）。两个包列表中的每个
    /// 类型都注册一条通道回调；更新线程随即启动，最后执行一次启动期
    /// 扫描——返回时缓存即处于可用（Primed）状态。
    pub fn new(
        driver: Arc<BravoDriver>,
        realtime_ids: Vec<PacketId>,
        startup_ids: Vec<PacketId>,
        config: PollerConfig,
    ) -> Result<Self, StatusError> {
        for id in realtime_ids.iter().chain(startup_ids.iter()) {
            if request_for(*id).is_none() {
                return Err(StatusError::NotQueryable(*id));
            }
        }

        let cache = Arc::new(PropertyCache::new());
        let (packet_tx, packet_rx) = crossbeam_channel::bounded(config.channel_capacity);
        let sink = Arc::new(ChannelSink::new(packet_tx));

        // 同一类型只注册一次（两个列表允许有交集时也不重复投递）
        let subscribed: BTreeSet<PacketId> = realtime_ids
            .iter()
            .chain(startup_ids.iter())
            .copied()
            .collect();
        for id in subscribed {
            driver.attach_callback(id, sink.clone())?;
        }

        let cancel = CancelToken::new();
        let update_thread = {
            let cache = cache.clone();
            let cancel = cancel.clone();
            spawn(move || update_loop(packet_rx, cache, cancel))
        };

        let status = Self {
            driver,
            cache,
            startup_ids,
            realtime_ids,
            config,
            cancel,
            primed: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            poll_thread: Mutex::new(None),
            update_thread: Mutex::new(Some(update_thread)),
        };
        status.prime()?;
        Ok(status)
    }

    /// 启动期扫描：对启动列表逐项发请求，一次会话只执行一次
    ///
    /// 幂等：已经扫描过时直接返回。扫描中途失败会清除 primed 标记，
    /// 允许调用方重试。
    pub fn prime(&self) -> Result<(), StatusError> {
        if self.primed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.sweep(&self.startup_ids) {
            self.primed.store(false, Ordering::SeqCst);
            return Err(e);
        }
        debug!("Startup sweep complete");
        Ok(())
    }

    /// 是否已完成启动期扫描
    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::SeqCst)
    }

    /// 启动实时轮询循环
    ///
    /// 重复调用是无操作（不会生成第二个循环）；`stop()` 之后调用
    /// 返回 [`StatusError::Stopped`]。
    pub fn start(&self) -> Result<(), StatusError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(StatusError::Stopped);
        }
        let mut guard = self.poll_thread.lock();
        if guard.is_some() {
            warn!("Realtime poll loop already running, start() ignored");
            return Ok(());
        }

        let driver = self.driver.clone();
        let ids = self.realtime_ids.clone();
        let cancel = self.cancel.clone();
        let interval = self.config.request_interval;
        *guard = Some(spawn(move || realtime_loop(driver, ids, cancel, interval)));
        Ok(())
    }

    /// 停止引擎：结束实时循环与更新线程，并断开驱动
    ///
    /// 幂等；`start()` 从未被调用时同样安全（不会等待不存在的线程）。
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        if let Some(handle) = self.poll_thread.lock().take()
            && handle.join().is_err()
        {
            warn!("Realtime poll thread panicked during join");
        }
        if let Some(handle) = self.update_thread.lock().take()
            && handle.join().is_err()
        {
            warn!("Update thread panicked during join");
        }

        self.driver.disconnect();
        debug!("Status session stopped");
    }

    /// 属性缓存
    pub fn cache(&self) -> &Arc<PropertyCache> {
        &self.cache
    }

    /// 驱动（供校正器等共用同一连接）
    pub fn driver(&self) -> &Arc<BravoDriver> {
        &self.driver
    }

    /// 缓存全量快照
    pub fn snapshot(&self) -> StatusSnapshot {
        self.cache.snapshot()
    }

    /// 按序对一组包类型各发一条请求
    fn sweep(&self, ids: &[PacketId]) -> Result<(), StatusError> {
        for id in ids {
            let Some(request) = request_for(*id) else {
                return Err(StatusError::NotQueryable(*id));
            };
            self.driver.send(request)?;
            spin_sleep::sleep(self.config.request_interval);
        }
        Ok(())
    }
}

impl Drop for BravoStatus {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 实时轮询循环（后台线程）
///
/// 每发一条请求检查一次取消令牌；单次发送失败只结束本轮，
/// 循环继续运行直到被取消。
fn realtime_loop(
    driver: Arc<BravoDriver>,
    ids: Vec<PacketId>,
    cancel: CancelToken,
    interval: Duration,
) {
    debug!("Realtime poll loop started");
    while !cancel.is_cancelled() {
        for id in &ids {
            if cancel.is_cancelled() {
                break;
            }
            let Some(request) = request_for(*id) else {
                continue;
            };
            if let Err(e) = driver.send(request) {
                warn!(packet_id = ?id, "Realtime request failed, ending this pass: {e}");
                break;
            }
            spin_sleep::sleep(interval);
        }
    }
    debug!("Realtime poll loop exited");
}

/// 更新线程循环：把通道里的包写进缓存
fn update_loop(packet_rx: Receiver<bravo_protocol::Packet>, cache: Arc<PropertyCache>, cancel: CancelToken) {
    loop {
        match packet_rx.recv_timeout(UPDATE_RECV_TIMEOUT) {
            Ok(packet) => cache.record(&packet),
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    break;
                }
            },
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Update thread exited");
}
