//! 载荷解码
//!
//! 每个包类型的载荷形状是静态确定的封闭映射：
//!
//! | 包类型 | 载荷 | 解码结果 |
//! |---|---|---|
//! | `SoftwareVersion` | 3 字节 | [`FirmwareVersion`] |
//! | `Mode` | 1 字节 | [`ModeId`] |
//! | `*Limits` | 8 字节 | [`LimitPair`]（2 × 小端 f32） |
//! | 其余遥测 | 4 字节 | 小端 f32 标量 |
//!
//! [`PacketValue::decode`] 对 [`PacketId`] 做穷举匹配，不存在
//! "未识别类型按 f32 解" 的兜底分支：新增包类型时这里无法编译通过，
//! 而不是被静默误解。

use crate::{ModeId, PacketId, ProtocolError};
use std::fmt;

/// 限位对（min, max），按线缆传输顺序存储
///
/// 线缆格式为两个小端 IEEE-754 f32。设备反馈的分量顺序不保证与配置
/// 书写顺序一致，比较与显示前应先经过 [`LimitPair::normalized`]。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimitPair {
    pub min: f32,
    pub max: f32,
}

impl LimitPair {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// 从 8 字节线缆载荷解码
    pub fn from_wire(bytes: [u8; 8]) -> Self {
        let min = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let max = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self { min, max }
    }

    /// 编码为 8 字节线缆载荷
    pub fn to_wire(self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.min.to_le_bytes());
        bytes[4..].copy_from_slice(&self.max.to_le_bytes());
        bytes
    }

    /// 规范化为 min ≤ max 的统一顺序
    ///
    /// 比较和显示一律使用规范化后的限位对。
    pub fn normalized(self) -> Self {
        if self.min <= self.max {
            self
        } else {
            Self {
                min: self.max,
                max: self.min,
            }
        }
    }

    /// 逐分量绝对容差比较
    pub fn approx_eq(&self, other: &LimitPair, tolerance: f32) -> bool {
        (self.min - other.min).abs() <= tolerance && (self.max - other.max).abs() <= tolerance
    }
}

impl fmt::Display for LimitPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3}]", self.min, self.max)
    }
}

/// 固件版本（major.minor.patch）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// 解码后的遥测值
///
/// 变体由包类型唯一决定，见模块级文档的映射表。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacketValue {
    /// 单个 f32 标量（位置、速度、电流、温度、电压、心跳频率、序列号、型号）
    Scalar(f32),
    /// 限位对（位置/速度/电流限位）
    Limits(LimitPair),
    /// 固件版本
    Version(FirmwareVersion),
    /// 工作模式
    Mode(ModeId),
}

impl PacketValue {
    /// 按包类型解码载荷
    ///
    /// # 错误
    /// - [`ProtocolError::PayloadLength`]: 载荷长度与该类型要求不符
    /// - [`ProtocolError::UnknownMode`]: 模式字节超出定义范围
    /// - [`ProtocolError::NotTelemetry`]: `Request` 包装不是遥测数据
    pub fn decode(packet_id: PacketId, payload: &[u8]) -> Result<PacketValue, ProtocolError> {
        match packet_id {
            PacketId::SoftwareVersion => {
                let bytes = expect_len::<3>(packet_id, payload)?;
                Ok(PacketValue::Version(FirmwareVersion {
                    major: bytes[0],
                    minor: bytes[1],
                    patch: bytes[2],
                }))
            },
            PacketId::Mode => {
                let bytes = expect_len::<1>(packet_id, payload)?;
                let mode = ModeId::try_from(bytes[0])
                    .map_err(|_| ProtocolError::UnknownMode { value: bytes[0] })?;
                Ok(PacketValue::Mode(mode))
            },
            PacketId::PositionLimits | PacketId::VelocityLimits | PacketId::CurrentLimits => {
                let bytes = expect_len::<8>(packet_id, payload)?;
                Ok(PacketValue::Limits(LimitPair::from_wire(bytes)))
            },
            PacketId::Velocity
            | PacketId::Position
            | PacketId::Current
            | PacketId::SerialNumber
            | PacketId::ModelNumber
            | PacketId::Temperature
            | PacketId::Voltage
            | PacketId::HeartbeatFrequency => {
                let bytes = expect_len::<4>(packet_id, payload)?;
                Ok(PacketValue::Scalar(f32::from_le_bytes(bytes)))
            },
            PacketId::Request => Err(ProtocolError::NotTelemetry { id: packet_id }),
        }
    }
}

impl fmt::Display for PacketValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketValue::Scalar(v) => write!(f, "{v:.3}"),
            PacketValue::Limits(pair) => write!(f, "{pair}"),
            PacketValue::Version(version) => write!(f, "{version}"),
            PacketValue::Mode(mode) => write!(f, "{mode:?}"),
        }
    }
}

fn expect_len<const N: usize>(
    packet_id: PacketId,
    payload: &[u8],
) -> Result<[u8; N], ProtocolError> {
    payload
        .try_into()
        .map_err(|_| ProtocolError::PayloadLength {
            id: packet_id,
            expected: N,
            actual: payload.len(),
        })
}
