//! 驱动层错误类型定义

use crate::transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 尚未连接（`connect()` 之前调用了 `send`/`attach_callback`）
    #[error("Driver not connected")]
    NotConnected,

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed (IO thread exited)")]
    ChannelClosed,

    /// 命令通道已满
    #[error("Command channel full (buffer size: {0})")]
    ChannelFull(usize),

    /// 驱动已经断开，本会话不可重新连接
    #[error("Driver has been shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::NotConnected;
        assert_eq!(format!("{err}"), "Driver not connected");

        let err = DriverError::ChannelFull(32);
        assert!(format!("{err}").contains("32"));

        let err: DriverError = TransportError::Timeout.into();
        assert!(matches!(err, DriverError::Transport(TransportError::Timeout)));
    }
}
