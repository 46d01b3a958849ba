//! 包类型 ID 定义
//!
//! 每个包类型唯一决定载荷的解码形状（见 [`crate::value::PacketValue`]），
//! 并划分为启动期查询（每次会话一次）和实时查询（持续轮询）两类。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 包类型 ID（单字节）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PacketId {
    /// 工作模式反馈（1 字节，见 [`crate::ModeId`]）
    Mode = 0x01,
    /// 关节速度（f32，rad/s 或 mm/s）
    Velocity = 0x02,
    /// 关节位置（f32，rad 或 mm）
    Position = 0x03,
    /// 关节电流（f32，mA）
    Current = 0x05,
    /// 位置限位对（2 × f32）
    PositionLimits = 0x10,
    /// 速度限位对（2 × f32）
    VelocityLimits = 0x11,
    /// 电流限位对（2 × f32）
    CurrentLimits = 0x12,
    /// 请求包装：载荷为被请求的包类型 ID
    Request = 0x60,
    /// 序列号（f32）
    SerialNumber = 0x61,
    /// 型号（f32）
    ModelNumber = 0x62,
    /// 固件版本（3 字节：major/minor/patch）
    SoftwareVersion = 0x63,
    /// 温度（f32，°C）
    Temperature = 0x66,
    /// 供电电压（f32，V）
    Voltage = 0x90,
    /// 心跳频率（f32，Hz）
    HeartbeatFrequency = 0x92,
}

impl PacketId {
    /// 启动期查询列表（有序）：每次会话只查询一次的身份与配置信息
    pub const STARTUP: [PacketId; 7] = [
        PacketId::SerialNumber,
        PacketId::ModelNumber,
        PacketId::SoftwareVersion,
        PacketId::HeartbeatFrequency,
        PacketId::PositionLimits,
        PacketId::VelocityLimits,
        PacketId::CurrentLimits,
    ];

    /// 实时查询列表（有序）：使用期间持续轮询的遥测
    pub const REALTIME: [PacketId; 5] = [
        PacketId::Mode,
        PacketId::Velocity,
        PacketId::Position,
        PacketId::Current,
        PacketId::Temperature,
    ];

    /// 可查询遥测全集：请求表为其中每一项建立一条请求包。
    ///
    /// `Voltage` 可查询但不在任何轮询列表中（按需单独查询）。
    pub const QUERYABLE: [PacketId; 13] = [
        PacketId::Mode,
        PacketId::Velocity,
        PacketId::Position,
        PacketId::Current,
        PacketId::PositionLimits,
        PacketId::VelocityLimits,
        PacketId::CurrentLimits,
        PacketId::SerialNumber,
        PacketId::ModelNumber,
        PacketId::SoftwareVersion,
        PacketId::Temperature,
        PacketId::Voltage,
        PacketId::HeartbeatFrequency,
    ];

    /// 是否属于启动期查询列表
    pub fn is_startup(self) -> bool {
        Self::STARTUP.contains(&self)
    }

    /// 是否属于实时查询列表
    pub fn is_realtime(self) -> bool {
        Self::REALTIME.contains(&self)
    }
}
