//! 设备 ID 定义
//!
//! Bravo 机械臂上每个可寻址单元（6 个关节 + 末端夹爪）各占一个设备 ID，
//! `AllJoints` 为广播地址，请求包统一发往该地址。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 设备 ID（单字节，线缆字节序）
///
/// 轴命名沿用 Bravo 约定：axis A 是末端直线夹爪，axis G 是基座旋转。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeviceId {
    /// 直线夹爪（axis A）
    LinearJaws = 0x01,
    /// 末端旋转（axis B）
    RotateEndEffector = 0x02,
    /// 前臂俯仰（axis C）
    BendForearm = 0x03,
    /// 肘部旋转（axis D）
    RotateElbow = 0x04,
    /// 肘部俯仰（axis E）
    BendElbow = 0x05,
    /// 肩部俯仰（axis F）
    BendShoulder = 0x06,
    /// 基座旋转（axis G）
    RotateBase = 0x07,
    /// 广播地址（所有关节）
    AllJoints = 0xFF,
}

impl DeviceId {
    /// 全部关节设备（不含广播地址），即状态缓存的固定键集合
    pub const JOINTS: [DeviceId; 7] = [
        DeviceId::LinearJaws,
        DeviceId::RotateEndEffector,
        DeviceId::BendForearm,
        DeviceId::RotateElbow,
        DeviceId::BendElbow,
        DeviceId::BendShoulder,
        DeviceId::RotateBase,
    ];

    /// 是否为单个关节设备（广播地址返回 false）
    pub fn is_joint(self) -> bool {
        self != DeviceId::AllJoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_roundtrip() {
        for device in DeviceId::JOINTS {
            let byte: u8 = device.into();
            assert_eq!(DeviceId::try_from(byte).unwrap(), device);
        }
        assert_eq!(u8::from(DeviceId::AllJoints), 0xFF);
    }

    #[test]
    fn test_device_id_unknown_byte() {
        // 0x08 不在设备集合内
        assert!(DeviceId::try_from(0x08).is_err());
        assert!(DeviceId::try_from(0x00).is_err());
    }

    #[test]
    fn test_joints_exclude_broadcast() {
        assert_eq!(DeviceId::JOINTS.len(), 7);
        assert!(DeviceId::JOINTS.iter().all(|d| d.is_joint()));
        assert!(!DeviceId::AllJoints.is_joint());
    }
}
