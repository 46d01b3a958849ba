//! 期望限位配置
//!
//! 外部以 YAML 文档按关节名提供期望限位，例如：
//!
//! ```yaml
//! bravo_axis_e:
//!   has_position_limits: true
//!   position_limits: [0.0, 1.5]
//!   has_velocity_limits: true
//!   velocity_limits: [-0.5, 0.5]
//!   has_current_limits: false
//! ```
//!
//! 文档缺失、无法解析、或声明了某类限位却没给出数值对时，配置加载
//! 立即失败——绝不把残缺配置当作"全部收敛"。

use bravo_protocol::{DeviceId, LimitPair, PacketId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// 关节名 ↔ 设备 ID 固定映射（7 个命名轴）
pub const JOINT_DEVICE_MAP: [(&str, DeviceId); 7] = [
    ("bravo_axis_a", DeviceId::LinearJaws),
    ("bravo_axis_b", DeviceId::RotateEndEffector),
    ("bravo_axis_c", DeviceId::BendForearm),
    ("bravo_axis_d", DeviceId::RotateElbow),
    ("bravo_axis_e", DeviceId::BendElbow),
    ("bravo_axis_f", DeviceId::BendShoulder),
    ("bravo_axis_g", DeviceId::RotateBase),
];

/// 按关节名查设备 ID
pub fn device_for_joint(name: &str) -> Option<DeviceId> {
    JOINT_DEVICE_MAP
        .iter()
        .find(|(joint, _)| *joint == name)
        .map(|(_, device)| *device)
}

/// 按设备 ID 查关节名
pub fn joint_for_device(device: DeviceId) -> Option<&'static str> {
    JOINT_DEVICE_MAP
        .iter()
        .find(|(_, d)| *d == device)
        .map(|(joint, _)| *joint)
}

/// 限位种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LimitKind {
    Position,
    Velocity,
    Current,
}

impl LimitKind {
    pub const ALL: [LimitKind; 3] = [LimitKind::Position, LimitKind::Velocity, LimitKind::Current];

    /// 对应的遥测/写入包类型
    pub fn packet_id(self) -> PacketId {
        match self {
            LimitKind::Position => PacketId::PositionLimits,
            LimitKind::Velocity => PacketId::VelocityLimits,
            LimitKind::Current => PacketId::CurrentLimits,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LimitKind::Position => "position",
            LimitKind::Velocity => "velocity",
            LimitKind::Current => "current",
        }
    }
}

/// 单个关节的期望限位声明
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointLimitsSpec {
    #[serde(default)]
    pub has_position_limits: bool,
    #[serde(default)]
    pub position_limits: Option<[f32; 2]>,
    #[serde(default)]
    pub has_velocity_limits: bool,
    #[serde(default)]
    pub velocity_limits: Option<[f32; 2]>,
    #[serde(default)]
    pub has_current_limits: bool,
    #[serde(default)]
    pub current_limits: Option<[f32; 2]>,
}

impl JointLimitsSpec {
    /// 某类限位的声明值；未声明（has 标志为 false）返回 `None`
    pub fn declared(&self, kind: LimitKind) -> Option<LimitPair> {
        let (has, pair) = match kind {
            LimitKind::Position => (self.has_position_limits, self.position_limits),
            LimitKind::Velocity => (self.has_velocity_limits, self.velocity_limits),
            LimitKind::Current => (self.has_current_limits, self.current_limits),
        };
        if !has {
            return None;
        }
        pair.map(|[min, max]| LimitPair::new(min, max))
    }

    fn validate(&self, joint: &str) -> Result<(), ConfigError> {
        for kind in LimitKind::ALL {
            let (has, pair) = match kind {
                LimitKind::Position => (self.has_position_limits, self.position_limits),
                LimitKind::Velocity => (self.has_velocity_limits, self.velocity_limits),
                LimitKind::Current => (self.has_current_limits, self.current_limits),
            };
            if has && pair.is_none() {
                return Err(ConfigError::MissingPair {
                    joint: joint.to_string(),
                    kind: kind.label(),
                });
            }
        }
        Ok(())
    }
}

/// 期望限位全集（按关节名）
#[derive(Debug, Clone, Default)]
pub struct DesiredLimits {
    pub joints: BTreeMap<String, JointLimitsSpec>,
}

impl DesiredLimits {
    /// 从 YAML 文本加载并校验
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let joints: BTreeMap<String, JointLimitsSpec> = serde_yaml::from_str(text)?;
        let limits = Self { joints };
        limits.validate()?;
        Ok(limits)
    }

    /// 从 YAML 文件加载并校验
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (joint, spec) in &self.joints {
            spec.validate(joint)?;
        }
        Ok(())
    }
}

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read limits file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse limits document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Joint {joint}: has_{kind}_limits is set but {kind}_limits is missing")]
    MissingPair { joint: String, kind: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
bravo_axis_e:
  has_position_limits: true
  position_limits: [0.0, 1.5]
  has_velocity_limits: false
  has_current_limits: true
  current_limits: [-600.0, 600.0]
bravo_axis_g:
  has_position_limits: true
  position_limits: [-3.0, 3.0]
"#;

    #[test]
    fn test_load_sample_config() {
        let limits = DesiredLimits::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(limits.joints.len(), 2);

        let axis_e = &limits.joints["bravo_axis_e"];
        assert_eq!(
            axis_e.declared(LimitKind::Position),
            Some(LimitPair::new(0.0, 1.5))
        );
        // has_velocity_limits 为 false：即便给了数值也不算声明
        assert_eq!(axis_e.declared(LimitKind::Velocity), None);
        assert_eq!(
            axis_e.declared(LimitKind::Current),
            Some(LimitPair::new(-600.0, 600.0))
        );
    }

    #[test]
    fn test_declared_but_missing_pair_fails() {
        let text = r#"
bravo_axis_a:
  has_position_limits: true
"#;
        let err = DesiredLimits::from_yaml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPair { .. }));
        assert!(format!("{err}").contains("bravo_axis_a"));
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(DesiredLimits::from_yaml_str("not: [valid").is_err());
        // 结构不符（标量而非映射）
        assert!(DesiredLimits::from_yaml_str("42").is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let err = DesiredLimits::from_yaml_file("/nonexistent/bravo_limits.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_joint_device_map_bidirectional() {
        assert_eq!(device_for_joint("bravo_axis_g"), Some(DeviceId::RotateBase));
        assert_eq!(joint_for_device(DeviceId::LinearJaws), Some("bravo_axis_a"));
        assert_eq!(device_for_joint("bravo_axis_z"), None);
        assert_eq!(joint_for_device(DeviceId::AllJoints), None);

        // 7 个命名关节与设备一一对应
        assert_eq!(JOINT_DEVICE_MAP.len(), DeviceId::JOINTS.len());
        for (name, device) in JOINT_DEVICE_MAP {
            assert_eq!(device_for_joint(name), Some(device));
            assert_eq!(joint_for_device(device), Some(name));
        }
    }

    #[test]
    fn test_limit_kind_packet_ids() {
        assert_eq!(LimitKind::Position.packet_id(), PacketId::PositionLimits);
        assert_eq!(LimitKind::Velocity.packet_id(), PacketId::VelocityLimits);
        assert_eq!(LimitKind::Current.packet_id(), PacketId::CurrentLimits);
    }
}
