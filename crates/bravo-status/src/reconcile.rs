//! 限位校正
//!
//! 把缓存里的实际限位与期望配置逐项比对：超出容差的发一条限位写入
//! 包，然后等设备下一轮遥测反映新值，再比对——直到全部收敛或尝试
//! 次数耗尽。
//!
//! 刚发出的写入不会立即出现在缓存里（要等设备应答下一次限位查询），
//! 所以 [`LimitReconciler::run`] 在每轮未收敛后会对发散的限位种类
//! 重新发查询请求，让缓存有机会观察到校正结果。

use crate::cache::PropertyCache;
use crate::cancel::CancelToken;
use crate::limits::{DesiredLimits, LimitKind, device_for_joint};
use bravo_driver::{BravoDriver, DriverError};
use bravo_protocol::{DeviceId, LimitPair, Packet, PacketValue, request_for};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 默认比对容差（工程单位）
pub const DEFAULT_TOLERANCE: f32 = 0.1;

/// 校正错误类型
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// 驱动层错误（写入或查询发送失败）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 尝试次数耗尽仍未收敛
    #[error("Limits did not converge after {attempts} attempts")]
    NotConverged { attempts: u32 },

    /// 被取消令牌中止
    #[error("Reconciliation cancelled")]
    Cancelled,
}

/// 重试策略（参考实现的重试是无界的，这里强制封顶）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 两次尝试之间的间隔
    pub retry_interval: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// 单项未收敛记录
#[derive(Debug, Clone)]
pub struct PendingLimit {
    pub joint: String,
    pub device: DeviceId,
    pub kind: LimitKind,
    /// 期望值（规范化 min ≤ max）
    pub desired: LimitPair,
    /// 实际值（规范化）；缓存里尚无该项时为 `None`
    pub actual: Option<LimitPair>,
}

/// 单轮校正结果
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// 所有已声明限位是否全部在容差内
    pub converged: bool,
    /// 本轮发出的校正写入条数
    pub corrections_sent: u32,
    /// 未收敛明细
    pub pending: Vec<PendingLimit>,
    /// 配置中出现但不在关节映射里的名字（配置告警，不阻塞收敛）
    pub skipped_joints: Vec<String>,
}

/// 限位校正器
pub struct LimitReconciler {
    driver: Arc<BravoDriver>,
    cache: Arc<PropertyCache>,
    desired: DesiredLimits,
    tolerance: f32,
}

impl LimitReconciler {
    pub fn new(
        driver: Arc<BravoDriver>,
        cache: Arc<PropertyCache>,
        desired: DesiredLimits,
    ) -> Self {
        Self {
            driver,
            cache,
            desired,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// 覆盖默认容差
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// 对一份新鲜快照执行一轮比对，必要时发出校正写入
    ///
    /// 期望值与实际值都先规范化为 min ≤ max 再逐分量比较；缓存中
    /// 尚无实际值的项计为未收敛但不盲目写入。
    pub fn reconcile_once(&self) -> Result<ReconcileReport, ReconcileError> {
        let snapshot = self.cache.snapshot();
        let mut report = ReconcileReport {
            converged: true,
            ..Default::default()
        };

        for (joint, spec) in &self.desired.joints {
            let Some(device) = device_for_joint(joint) else {
                warn!(joint, "Configured joint not present in the device map, skipping");
                report.skipped_joints.push(joint.clone());
                continue;
            };

            for kind in LimitKind::ALL {
                let Some(desired) = spec.declared(kind) else {
                    continue;
                };
                let desired = desired.normalized();

                let actual = snapshot
                    .get(&device)
                    .and_then(|properties| properties.get(&kind.packet_id()))
                    .and_then(|value| match value {
                        PacketValue::Limits(pair) => Some(pair.normalized()),
                        _ => None,
                    });

                match actual {
                    Some(actual) if desired.approx_eq(&actual, self.tolerance) => {},
                    Some(actual) => {
                        let correction = Packet::new(device, kind.packet_id(), &desired.to_wire());
                        self.driver.send(&correction)?;
                        debug!(joint, kind = kind.label(), %desired, %actual,
                               "Limit outside tolerance, correction sent");
                        report.corrections_sent += 1;
                        report.converged = false;
                        report.pending.push(PendingLimit {
                            joint: joint.clone(),
                            device,
                            kind,
                            desired,
                            actual: Some(actual),
                        });
                    },
                    None => {
                        debug!(joint, kind = kind.label(), "Actual limit not yet reported");
                        report.converged = false;
                        report.pending.push(PendingLimit {
                            joint: joint.clone(),
                            device,
                            kind,
                            desired,
                            actual: None,
                        });
                    },
                }
            }
        }

        Ok(report)
    }

    /// 循环校正直到收敛或尝试次数耗尽
    ///
    /// 每轮未收敛后对发散的限位种类重发查询请求，下一轮针对包含
    /// 最新反馈的新快照比对。
    pub fn run(
        &self,
        policy: &ReconcilePolicy,
        cancel: &CancelToken,
    ) -> Result<ReconcileReport, ReconcileError> {
        for attempt in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled);
            }

            let report = self.reconcile_once()?;
            if report.converged {
                info!(attempt, "All declared limits converged");
                return Ok(report);
            }
            debug!(
                attempt,
                pending = report.pending.len(),
                corrections = report.corrections_sent,
                "Limits not converged yet"
            );

            if attempt < policy.max_attempts {
                self.refresh_pending(&report)?;
                spin_sleep::sleep(policy.retry_interval);
            }
        }
        Err(ReconcileError::NotConverged {
            attempts: policy.max_attempts,
        })
    }

    /// 对本轮发散的限位种类重发遥测查询
    fn refresh_pending(&self, report: &ReconcileReport) -> Result<(), ReconcileError> {
        let kinds: BTreeSet<LimitKind> = report.pending.iter().map(|p| p.kind).collect();
        for kind in kinds {
            if let Some(request) = request_for(kind.packet_id()) {
                self.driver.send(request)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::JointLimitsSpec;
    use bravo_driver::MockTransport;
    use bravo_protocol::PacketId;
    use std::time::Instant;

    fn connected_driver() -> (Arc<BravoDriver>, bravo_driver::MockHandle) {
        let (transport, handle) = MockTransport::new();
        let driver = Arc::new(BravoDriver::new(transport));
        driver.connect().unwrap();
        (driver, handle)
    }

    fn desired_position(joint: &str, min: f32, max: f32) -> DesiredLimits {
        let mut limits = DesiredLimits::default();
        limits.joints.insert(
            joint.to_string(),
            JointLimitsSpec {
                has_position_limits: true,
                position_limits: Some([min, max]),
                ..Default::default()
            },
        );
        limits
    }

    fn record_limits(cache: &PropertyCache, device: DeviceId, id: PacketId, pair: LimitPair) {
        cache.record(&Packet::new(device, id, &pair.to_wire()));
    }

    /// 等待 mock 记录的已发送包满足条件（IO 线程异步发出）
    fn wait_sent(
        handle: &bravo_driver::MockHandle,
        timeout: Duration,
        predicate: impl Fn(&[Packet]) -> bool,
    ) -> Vec<Packet> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let sent = handle.sent();
            if predicate(&sent) {
                return sent;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.sent()
    }

    #[test]
    fn test_reconcile_converged_no_writes() {
        let (driver, handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());
        record_limits(
            &cache,
            DeviceId::BendElbow,
            PacketId::PositionLimits,
            LimitPair::new(0.0, 1.0),
        );

        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.0),
        );
        let report = reconciler.reconcile_once().unwrap();

        assert!(report.converged);
        assert_eq!(report.corrections_sent, 0);
        assert!(report.pending.is_empty());
        std::thread::sleep(Duration::from_millis(20));
        assert!(handle.sent().is_empty());
        driver.disconnect();
    }

    #[test]
    fn test_reconcile_within_tolerance_no_write() {
        let (driver, handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());
        record_limits(
            &cache,
            DeviceId::BendElbow,
            PacketId::PositionLimits,
            LimitPair::new(0.0, 1.0),
        );

        // 期望 (0.0, 1.05)，容差 0.1：视为已收敛
        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.05),
        );
        let report = reconciler.reconcile_once().unwrap();

        assert!(report.converged);
        assert_eq!(report.corrections_sent, 0);
        std::thread::sleep(Duration::from_millis(20));
        assert!(handle.sent().is_empty());
        driver.disconnect();
    }

    #[test]
    fn test_reconcile_divergent_sends_one_correction() {
        let (driver, handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());
        record_limits(
            &cache,
            DeviceId::BendElbow,
            PacketId::PositionLimits,
            LimitPair::new(0.0, 1.0),
        );

        // 期望 (0.0, 1.5)：超出容差，应恰好发出一条位置限位写入
        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.5),
        );
        let report = reconciler.reconcile_once().unwrap();

        assert!(!report.converged);
        assert_eq!(report.corrections_sent, 1);

        let sent = wait_sent(&handle, Duration::from_secs(1), |sent| !sent.is_empty());
        assert_eq!(sent.len(), 1);
        let correction = sent[0];
        assert_eq!(correction.device_id, DeviceId::BendElbow);
        assert_eq!(correction.packet_id, PacketId::PositionLimits);
        let payload = <[u8; 8]>::try_from(correction.payload()).unwrap();
        assert_eq!(LimitPair::from_wire(payload), LimitPair::new(0.0, 1.5));
        driver.disconnect();
    }

    #[test]
    fn test_reconcile_absent_entry_pending_without_write() {
        let (driver, handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());

        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.5),
        );
        let report = reconciler.reconcile_once().unwrap();

        assert!(!report.converged);
        assert_eq!(report.corrections_sent, 0);
        assert_eq!(report.pending.len(), 1);
        assert!(report.pending[0].actual.is_none());
        std::thread::sleep(Duration::from_millis(20));
        assert!(handle.sent().is_empty());
        driver.disconnect();
    }

    #[test]
    fn test_reconcile_reversed_actual_order_converges() {
        let (driver, _handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());
        // 设备按 (max, min) 顺序反馈：规范化后仍应判定收敛
        record_limits(
            &cache,
            DeviceId::BendElbow,
            PacketId::PositionLimits,
            LimitPair::new(1.0, 0.0),
        );

        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.0),
        );
        let report = reconciler.reconcile_once().unwrap();
        assert!(report.converged);
        driver.disconnect();
    }

    #[test]
    fn test_reconcile_unknown_joint_skipped() {
        let (driver, _handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());

        let mut desired = desired_position("bravo_axis_e", 0.0, 1.0);
        desired
            .joints
            .insert("bravo_axis_z".to_string(), JointLimitsSpec::default());
        record_limits(
            &cache,
            DeviceId::BendElbow,
            PacketId::PositionLimits,
            LimitPair::new(0.0, 1.0),
        );

        let reconciler = LimitReconciler::new(driver.clone(), cache, desired);
        let report = reconciler.reconcile_once().unwrap();

        // 未知关节被跳过并上报，但不阻塞收敛
        assert!(report.converged);
        assert_eq!(report.skipped_joints, vec!["bravo_axis_z".to_string()]);
        driver.disconnect();
    }

    #[test]
    fn test_run_gives_up_after_max_attempts() {
        let (driver, _handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());
        // 缓存始终为空：永远无法收敛
        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.5),
        );

        let policy = ReconcilePolicy {
            max_attempts: 3,
            retry_interval: Duration::from_millis(5),
        };
        let err = reconciler.run(&policy, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ReconcileError::NotConverged { attempts: 3 }));
        driver.disconnect();
    }

    #[test]
    fn test_run_cancelled() {
        let (driver, _handle) = connected_driver();
        let cache = Arc::new(PropertyCache::new());
        let reconciler = LimitReconciler::new(
            driver.clone(),
            cache,
            desired_position("bravo_axis_e", 0.0, 1.5),
        );

        let cancel = CancelToken::new();
        cancel.cancel();
        let policy = ReconcilePolicy {
            max_attempts: 10,
            retry_interval: Duration::from_millis(5),
        };
        let err = reconciler.run(&policy, &cancel).unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
        driver.disconnect();
    }
}
