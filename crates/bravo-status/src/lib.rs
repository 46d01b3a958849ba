//! # Bravo Status
//!
//! Bravo 机械臂的状态缓存与轮询/校正引擎：
//!
//! - [`PropertyCache`]: `(设备, 包类型) → 最近解码值` 的共享缓存
//! - [`BravoStatus`]: 启动期扫描 + 实时轮询 + 缓存更新线程
//! - [`DesiredLimits`]: 按关节名的期望限位配置（YAML）
//! - [`LimitReconciler`]: 实际限位 vs 期望限位的有界收敛回路
//!
//! 数据流：轮询线程发请求 → 驱动异步送达应答 → 更新线程解码写入
//! 缓存 → 打印/校正读取快照 → 校正器按需发出限位写入 → 循环。

pub mod cache;
pub mod cancel;
pub mod limits;
pub mod poller;
pub mod reconcile;

pub use cache::{CacheMetricsSnapshot, DeviceProperties, PropertyCache, StatusSnapshot};
pub use cancel::CancelToken;
pub use limits::{
    ConfigError, DesiredLimits, JOINT_DEVICE_MAP, JointLimitsSpec, LimitKind, device_for_joint,
    joint_for_device,
};
pub use poller::{BravoStatus, PollerConfig, StatusError};
pub use reconcile::{
    DEFAULT_TOLERANCE, LimitReconciler, PendingLimit, ReconcileError, ReconcilePolicy,
    ReconcileReport,
};
