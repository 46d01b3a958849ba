//! # Bravo Driver
//!
//! Bravo 机械臂的设备驱动层，包括：
//! - 传输抽象（[`Transport`]）：帧定界/校验和等线路细节的边界
//! - 后台 IO 线程（[`BravoDriver`]）：命令队列发送 + 按包类型回调分发
//! - Mock 传输与机械臂模拟器（`mock` feature，默认启用）
//!
//! 回调在 IO 线程上执行，必须遵守非阻塞纪律；上层应使用
//! [`ChannelSink`] 把包转投到自己的消费线程（见 [`dispatch`] 模块）。

mod driver;
pub mod dispatch;
mod error;
pub mod transport;

#[cfg(feature = "mock")]
pub mod mock;

pub use dispatch::{CallbackRegistry, ChannelSink, PacketCallback};
pub use driver::BravoDriver;
pub use error::DriverError;
pub use transport::{Transport, TransportError};

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockTransport, SimulatedArm};
