//! 传输层抽象
//!
//! 帧定界、校验和、串口/UDP 细节都属于 [`Transport`] 实现的内部事务；
//! 驱动层只依赖 `(open, close, send, receive_timeout)` 四个操作。

use bravo_protocol::Packet;
use std::time::Duration;
use thiserror::Error;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,
    #[error("Receive timeout")]
    Timeout,
    #[error("Transport closed")]
    Closed,
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// 传输适配器
///
/// 实现会被移动进驱动的 IO 线程，因此要求 `Send`。
/// `receive_timeout` 是 IO 循环唯一的调度点：超时返回
/// [`TransportError::Timeout`] 属于正常情况，不是故障。
pub trait Transport: Send {
    /// 建立连接
    fn open(&mut self) -> Result<(), TransportError>;

    /// 断开连接（幂等：重复调用无副作用）
    fn close(&mut self);

    /// 发送一个协议包
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError>;

    /// 带超时接收一个协议包
    fn receive_timeout(&mut self, timeout: Duration) -> Result<Packet, TransportError>;
}
