//! 属性缓存
//!
//! `(设备, 包类型) → 最近一次解码值` 的共享表。写入只来自回调消费
//! 线程，读取来自打印/校正等任意线程；整表一把读写锁（更新速率只有
//! 每秒几十包，单锁足够且不会出现撕裂读）。
//!
//! 跨属性没有原子性保证：同一设备的位置和速度可能来自不同时刻，
//! 读者按"最后写入可见"理解快照即可。

use bravo_protocol::{DeviceId, Packet, PacketId, PacketValue};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// 单个设备的属性表
pub type DeviceProperties = BTreeMap<PacketId, PacketValue>;

/// 全量快照（按设备、包类型有序，便于稳定展示）
pub type StatusSnapshot = BTreeMap<DeviceId, DeviceProperties>;

/// 缓存计数器（遥测丢弃必须可观测，但不允许中断回调路径）
#[derive(Debug, Default)]
struct CacheMetrics {
    updates: AtomicU64,
    decode_errors: AtomicU64,
    unknown_device: AtomicU64,
}

/// 缓存计数器快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetricsSnapshot {
    /// 成功写入次数
    pub updates: u64,
    /// 因载荷解码失败而丢弃的包数
    pub decode_errors: u64,
    /// 因设备不在固定集合内而丢弃的包数
    pub unknown_device: u64,
}

/// 属性缓存
///
/// 构造时为 [`DeviceId::JOINTS`] 中每个设备建立一个空表；键集合
/// 此后固定不变，条目在首个匹配包到达前保持缺失。
pub struct PropertyCache {
    table: RwLock<StatusSnapshot>,
    metrics: CacheMetrics,
}

impl PropertyCache {
    pub fn new() -> Self {
        let table = DeviceId::JOINTS
            .into_iter()
            .map(|device| (device, DeviceProperties::new()))
            .collect();
        Self {
            table: RwLock::new(table),
            metrics: CacheMetrics::default(),
        }
    }

    /// 记录一个遥测包：解码并覆盖 `(device, packet_id)` 下的旧值
    ///
    /// 设备不在固定集合内或解码失败时丢弃本次更新（计数 + 日志），
    /// 绝不向调用方抛错——遥测丢包不允许搞垮轮询回路。
    pub fn record(&self, packet: &Packet) {
        let value = match packet.decode() {
            Ok(value) => value,
            Err(e) => {
                self.metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(device = ?packet.device_id, packet_id = ?packet.packet_id,
                      "Dropping telemetry update: {e}");
                return;
            },
        };

        let mut table = self.table.write();
        match table.get_mut(&packet.device_id) {
            Some(properties) => {
                properties.insert(packet.packet_id, value);
                self.metrics.updates.fetch_add(1, Ordering::Relaxed);
            },
            None => {
                self.metrics.unknown_device.fetch_add(1, Ordering::Relaxed);
                debug!(device = ?packet.device_id, "Telemetry from device outside the joint set, dropped");
            },
        }
    }

    /// 读取最近记录的值；从未收到时返回 `None`
    pub fn read(&self, device: DeviceId, packet_id: PacketId) -> Option<PacketValue> {
        self.table.read().get(&device)?.get(&packet_id).copied()
    }

    /// 时间点全量拷贝，供打印与校正在锁外自由读取
    pub fn snapshot(&self) -> StatusSnapshot {
        self.table.read().clone()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            updates: self.metrics.updates.load(Ordering::Relaxed),
            decode_errors: self.metrics.decode_errors.load(Ordering::Relaxed),
            unknown_device: self.metrics.unknown_device.load(Ordering::Relaxed),
        }
    }
}

impl Default for PropertyCache {
    fn default() -> Self {
        Self::new()
    }
}
