//! # Bravo Protocol
//!
//! Bravo 机械臂请求/响应包协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `device_id`: 设备 ID（关节 + 广播地址）
//! - `packet_id`: 包类型 ID 与启动期/实时分类
//! - `mode_id`: 工作模式
//! - `value`: 载荷解码（封闭映射，穷举匹配）
//! - `request`: 遥测请求表（进程内只读常量）
//!
//! ## 字节序
//!
//! 多字节数值载荷统一为小端 IEEE-754 f32。帧定界、校验和等
//! 传输层细节由底层驱动负责，本 crate 只处理
//! `(device_id, packet_id, payload)` 三元组。

pub mod device_id;
pub mod mode_id;
pub mod packet_id;
pub mod request;
pub mod value;

pub use device_id::DeviceId;
pub use mode_id::ModeId;
pub use packet_id::PacketId;
pub use request::request_for;
pub use value::{FirmwareVersion, LimitPair, PacketValue};

use thiserror::Error;

/// 协议包（线缆单元）
///
/// 载荷最长 8 字节（限位对），使用定长缓冲避免堆分配，
/// `Copy` 语义便于在线程间和通道里传递。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// 目标/来源设备
    pub device_id: DeviceId,
    /// 包类型（决定载荷形状）
    pub packet_id: PacketId,
    /// 载荷（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],
    /// 有效载荷长度 (0-8)
    pub len: u8,
}

impl Packet {
    /// 创建协议包；超过 8 字节的载荷会被截断
    pub fn new(device_id: DeviceId, packet_id: PacketId, payload: &[u8]) -> Self {
        let mut data = [0u8; 8];
        let len = payload.len().min(8);
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            device_id,
            packet_id,
            data,
            len: len as u8,
        }
    }

    /// 从原始字节构造，校验设备与包类型两个标识字节
    ///
    /// # 错误
    /// - [`ProtocolError::UnknownDevice`]: 设备字节不在定义集合内
    /// - [`ProtocolError::UnknownPacketId`]: 包类型字节不在定义集合内
    pub fn from_wire(device: u8, packet: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let device_id =
            DeviceId::try_from(device).map_err(|_| ProtocolError::UnknownDevice { value: device })?;
        let packet_id = PacketId::try_from(packet)
            .map_err(|_| ProtocolError::UnknownPacketId { value: packet })?;
        Ok(Self::new(device_id, packet_id, payload))
    }

    /// 有效载荷切片
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 解码本包的载荷
    pub fn decode(&self) -> Result<PacketValue, ProtocolError> {
        PacketValue::decode(self.packet_id, self.payload())
    }
}

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid payload length for {id:?}: expected {expected}, got {actual}")]
    PayloadLength {
        id: PacketId,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown mode byte: 0x{value:02X}")]
    UnknownMode { value: u8 },

    #[error("Unknown device id byte: 0x{value:02X}")]
    UnknownDevice { value: u8 },

    #[error("Unknown packet id byte: 0x{value:02X}")]
    UnknownPacketId { value: u8 },

    #[error("Packet type {id:?} is not a telemetry payload")]
    NotTelemetry { id: PacketId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_new_truncates() {
        let packet = Packet::new(DeviceId::RotateBase, PacketId::Position, &[0u8; 12]);
        assert_eq!(packet.len, 8);
        assert_eq!(packet.payload().len(), 8);
    }

    #[test]
    fn test_packet_from_wire() {
        let payload = 1.25f32.to_le_bytes();
        let packet = Packet::from_wire(0x03, 0x03, &payload).unwrap();
        assert_eq!(packet.device_id, DeviceId::BendForearm);
        assert_eq!(packet.packet_id, PacketId::Position);
        assert_eq!(packet.decode().unwrap(), PacketValue::Scalar(1.25));
    }

    #[test]
    fn test_packet_from_wire_unknown_device() {
        let err = Packet::from_wire(0x42, 0x03, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownDevice { value: 0x42 }));
    }

    #[test]
    fn test_packet_from_wire_unknown_packet_id() {
        let err = Packet::from_wire(0x01, 0x7E, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketId { value: 0x7E }));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::PayloadLength {
            id: PacketId::Position,
            expected: 4,
            actual: 8,
        };
        let msg = format!("{err}");
        assert!(msg.contains("expected 4") && msg.contains("got 8"));

        let err = ProtocolError::UnknownMode { value: 0x0A };
        assert!(format!("{err}").contains("0x0A"));
    }
}
