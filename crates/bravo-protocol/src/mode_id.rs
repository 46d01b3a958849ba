//! 工作模式定义

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 机械臂工作模式
///
/// `Mode` 遥测包的载荷为单字节模式值；字节超出定义范围时解码失败
/// （见 [`crate::ProtocolError::UnknownMode`]），不会静默落到默认值。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ModeId {
    /// 待机
    Standby = 0x00,
    /// 失能
    Disable = 0x01,
    /// 位置模式
    Position = 0x02,
    /// 速度模式
    Velocity = 0x03,
    /// 电流模式
    Current = 0x04,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_id_roundtrip() {
        for byte in 0u8..=4 {
            let mode = ModeId::try_from(byte).unwrap();
            assert_eq!(u8::from(mode), byte);
        }
    }

    #[test]
    fn test_mode_id_out_of_range() {
        assert!(ModeId::try_from(0x05).is_err());
        assert!(ModeId::try_from(0xFF).is_err());
    }
}
