//! 回调分发
//!
//! 按包类型注册回调，IO 线程收到包后只触发该类型名下的回调。
//!
//! # 性能要求
//!
//! 回调在 IO 线程上执行，必须是非阻塞的：禁止持锁等待、I/O 和无界分配。
//! 推荐做法是 [`ChannelSink`]——用 `try_send` 把包转投到有界通道，
//! 由消费者线程完成真正的处理（缓存更新等），从而把状态加锁
//! 与传输线程解耦。

use bravo_protocol::{Packet, PacketId};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// 包回调 Trait
///
/// 实现必须非阻塞（见模块级文档）。
pub trait PacketCallback: Send + Sync {
    /// 收到指定类型的包时调用（在 IO 线程上）
    fn on_packet(&self, packet: &Packet);
}

/// 回调注册表（按包类型分发）
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<PacketId, Vec<Arc<dyn PacketCallback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
        }
    }

    /// 注册一个回调；同一包类型可挂多个回调
    pub fn attach(&mut self, packet_id: PacketId, callback: Arc<dyn PacketCallback>) {
        self.callbacks.entry(packet_id).or_default().push(callback);
    }

    /// 分发一个包：仅触发其类型名下的回调
    pub fn dispatch(&self, packet: &Packet) {
        if let Some(callbacks) = self.callbacks.get(&packet.packet_id) {
            for callback in callbacks {
                callback.on_packet(packet);
            }
        } else {
            trace!(packet_id = ?packet.packet_id, "No callback attached, packet dropped");
        }
    }

    /// 已注册回调总数
    pub fn len(&self) -> usize {
        self.callbacks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 把包转投到有界通道的回调实现
///
/// 通道满时丢弃该包（遥测丢包不得阻塞 IO 线程），丢弃会记录 trace 日志。
pub struct ChannelSink {
    tx: Sender<Packet>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Packet>) -> Self {
        Self { tx }
    }
}

impl PacketCallback for ChannelSink {
    fn on_packet(&self, packet: &Packet) {
        if self.tx.try_send(*packet).is_err() {
            trace!(packet_id = ?packet.packet_id, "Packet channel full, telemetry dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bravo_protocol::DeviceId;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingCallback {
        count: Arc<AtomicU64>,
    }

    impl PacketCallback for CountingCallback {
        fn on_packet(&self, _packet: &Packet) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn position_packet() -> Packet {
        Packet::new(
            DeviceId::RotateBase,
            PacketId::Position,
            &1.0f32.to_le_bytes(),
        )
    }

    #[test]
    fn test_dispatch_only_matching_type() {
        let mut registry = CallbackRegistry::new();
        let count = Arc::new(AtomicU64::new(0));
        registry.attach(
            PacketId::Position,
            Arc::new(CountingCallback {
                count: count.clone(),
            }),
        );

        registry.dispatch(&position_packet());
        // Velocity 类型未注册，不触发
        registry.dispatch(&Packet::new(
            DeviceId::RotateBase,
            PacketId::Velocity,
            &2.0f32.to_le_bytes(),
        ));

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_multiple_callbacks_same_type() {
        let mut registry = CallbackRegistry::new();
        let count = Arc::new(AtomicU64::new(0));
        for _ in 0..3 {
            registry.attach(
                PacketId::Position,
                Arc::new(CountingCallback {
                    count: count.clone(),
                }),
            );
        }
        assert_eq!(registry.len(), 3);

        registry.dispatch(&position_packet());
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_channel_sink_try_send() {
        let (tx, rx) = bounded::<Packet>(1);
        let sink = ChannelSink::new(tx);

        sink.on_packet(&position_packet());
        // 通道已满：第二个包被丢弃而不是阻塞
        sink.on_packet(&position_packet());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
