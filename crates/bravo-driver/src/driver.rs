//! 驱动核心
//!
//! [`BravoDriver`] 封装后台 IO 线程：命令经有界队列进入 IO 线程发送，
//! 收到的包按类型分发给注册的回调。传输适配器在 `connect()` 时被移动进
//! IO 线程，线程退出前恰好关闭一次传输。

use crate::dispatch::{CallbackRegistry, PacketCallback};
use crate::error::DriverError;
use crate::transport::{Transport, TransportError};
use bravo_protocol::{Packet, PacketId};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// 命令队列容量
const CMD_QUEUE_CAPACITY: usize = 32;

/// IO 循环接收超时：循环唯一的调度点，同时决定命令队列的排空延迟
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(2);

/// Bravo 机械臂驱动（对外 API）
///
/// 生命周期为一次会话：`new → connect → (send/attach_callback)* → disconnect`。
/// `disconnect` 之后不可重新连接，需要重连的调用方构造新的驱动实例。
///
/// 所有方法都以 `&self` 工作，可安全地放进 `Arc` 在线程间共享。
pub struct BravoDriver {
    /// 传输适配器：`connect()` 之前持有，连接后移动进 IO 线程。
    /// 该锁同时用于串行化 connect/disconnect。
    transport: Mutex<Option<Box<dyn Transport>>>,
    /// 命令发送通道（连接期间为 Some）
    cmd_tx: Mutex<Option<Sender<Packet>>>,
    /// IO 线程句柄（disconnect 时 join）
    io_thread: Mutex<Option<JoinHandle<()>>>,
    /// 回调注册表（IO 线程共享读取）
    callbacks: Arc<RwLock<CallbackRegistry>>,
    /// 连接状态
    connected: AtomicBool,
    /// 会话已结束（disconnect 过）
    shut_down: AtomicBool,
}

impl BravoDriver {
    /// 创建驱动实例（不建立连接）
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Mutex::new(Some(Box::new(transport))),
            cmd_tx: Mutex::new(None),
            io_thread: Mutex::new(None),
            callbacks: Arc::new(RwLock::new(CallbackRegistry::new())),
            connected: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// 建立连接并启动 IO 线程
    ///
    /// 已连接时再次调用是无操作。会话结束后（`disconnect`）调用
    /// 返回 [`DriverError::ShutDown`]。传输打开失败时适配器被保留，
    /// 允许调用方修复后重试。
    pub fn connect(&self) -> Result<(), DriverError> {
        let mut slot = self.transport.lock();
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(mut transport) = slot.take() else {
            return Err(DriverError::ShutDown);
        };

        if let Err(e) = transport.open() {
            *slot = Some(transport);
            return Err(e.into());
        }

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(CMD_QUEUE_CAPACITY);
        let callbacks = self.callbacks.clone();
        let handle = spawn(move || io_loop(transport, cmd_rx, callbacks));

        *self.cmd_tx.lock() = Some(cmd_tx);
        *self.io_thread.lock() = Some(handle);
        self.connected.store(true, Ordering::SeqCst);
        debug!("Driver connected, IO thread started");
        Ok(())
    }

    /// 是否处于连接状态
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 发送一个协议包（入队，由 IO 线程实际发出）
    ///
    /// # 错误
    /// - [`DriverError::NotConnected`]: 未连接
    /// - [`DriverError::ChannelFull`]: 命令积压
    /// - [`DriverError::ChannelClosed`]: IO 线程已退出
    pub fn send(&self, packet: &Packet) -> Result<(), DriverError> {
        let guard = self.cmd_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(DriverError::NotConnected);
        };
        match tx.try_send(*packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DriverError::ChannelFull(CMD_QUEUE_CAPACITY)),
            Err(TrySendError::Disconnected(_)) => Err(DriverError::ChannelClosed),
        }
    }

    /// 为指定包类型注册回调
    ///
    /// 回调在 IO 线程上执行，必须非阻塞（见 [`crate::dispatch`]）。
    pub fn attach_callback(
        &self,
        packet_id: PacketId,
        callback: Arc<dyn PacketCallback>,
    ) -> Result<(), DriverError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected);
        }
        self.callbacks.write().attach(packet_id, callback);
        Ok(())
    }

    /// 断开连接：通知 IO 线程退出并等待其终止
    ///
    /// 幂等；从未连接时调用是无操作，不会失败也不会死锁。
    pub fn disconnect(&self) {
        let _serialize = self.transport.lock();

        // 先丢弃发送端：IO 线程在下一次排空命令队列时观察到
        // Disconnected 并退出（退出路径上关闭传输）
        let had_session = self.cmd_tx.lock().take().is_some();

        if let Some(handle) = self.io_thread.lock().take()
            && handle.join().is_err()
        {
            error!("IO thread panicked during join");
        }

        if had_session {
            self.connected.store(false, Ordering::SeqCst);
            self.shut_down.store(true, Ordering::SeqCst);
            debug!("Driver disconnected");
        }
    }
}

impl Drop for BravoDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// IO 线程循环
///
/// 每轮迭代：排空命令队列并逐包发送，然后带超时接收一个包并分发。
/// 命令通道断开是唯一的正常退出路径；传输在退出前恰好关闭一次。
fn io_loop(
    mut transport: Box<dyn Transport>,
    cmd_rx: Receiver<Packet>,
    callbacks: Arc<RwLock<CallbackRegistry>>,
) {
    'io: loop {
        // 排空命令队列
        loop {
            match cmd_rx.try_recv() {
                Ok(packet) => {
                    if let Err(e) = transport.send(&packet) {
                        // 发送失败只影响当前包，循环继续
                        warn!(packet_id = ?packet.packet_id, "Transport send failed: {e}");
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'io,
            }
        }

        // 带超时接收：超时是正常调度点
        match transport.receive_timeout(RECEIVE_TIMEOUT) {
            Ok(packet) => {
                trace!(device = ?packet.device_id, packet_id = ?packet.packet_id, "Packet received");
                callbacks.read().dispatch(&packet);
            },
            Err(TransportError::Timeout) => {},
            Err(TransportError::Closed | TransportError::NotConnected) => {
                // 传输在会话中途失效：等待上层 disconnect，避免空转
                std::thread::sleep(RECEIVE_TIMEOUT);
            },
            Err(e) => {
                error!("Transport receive error: {e}");
            },
        }
    }

    transport.close();
    debug!("IO thread exited");
}
