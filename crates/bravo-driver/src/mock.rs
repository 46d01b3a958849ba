//! Mock 传输与机械臂模拟器
//!
//! `MockTransport` 是无硬件依赖的传输实现：发送的包被记录，
//! 接收队列可由测试注入，也可挂一个 [`SimulatedArm`] 自动应答。
//! [`MockHandle`] 在传输被移动进 IO 线程之后仍可从外部检查其状态。

use crate::transport::{Transport, TransportError};
use bravo_protocol::{DeviceId, FirmwareVersion, LimitPair, ModeId, Packet, PacketId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// 单个关节的模拟状态
#[derive(Debug, Clone)]
pub struct SimJointState {
    pub position: f32,
    pub velocity: f32,
    pub current: f32,
    pub temperature: f32,
    pub voltage: f32,
    pub heartbeat_frequency: f32,
    pub serial_number: f32,
    pub model_number: f32,
    pub mode: ModeId,
    pub firmware: FirmwareVersion,
    pub position_limits: LimitPair,
    pub velocity_limits: LimitPair,
    pub current_limits: LimitPair,
}

impl SimJointState {
    fn new(index: u8) -> Self {
        Self {
            position: 0.1 * index as f32,
            velocity: 0.0,
            current: 15.0,
            temperature: 32.5,
            voltage: 24.0,
            heartbeat_frequency: 10.0,
            serial_number: 5000.0 + index as f32,
            model_number: 107.0,
            mode: ModeId::Standby,
            firmware: FirmwareVersion {
                major: 1,
                minor: 4,
                patch: 0,
            },
            position_limits: LimitPair::new(-3.1, 3.1),
            velocity_limits: LimitPair::new(-0.5, 0.5),
            current_limits: LimitPair::new(-900.0, 900.0),
        }
    }
}

/// 机械臂模拟器
///
/// 收到广播 `Request` 包时按关节顺序各应答一条遥测；收到限位写入包时
/// 更新对应关节的存储值，之后的限位查询会反馈新值——针对模拟器运行的
/// 校正回路因此能够真实收敛。
pub struct SimulatedArm {
    joints: BTreeMap<DeviceId, SimJointState>,
}

impl SimulatedArm {
    pub fn new() -> Self {
        let joints = DeviceId::JOINTS
            .into_iter()
            .map(|device| (device, SimJointState::new(u8::from(device))))
            .collect();
        Self { joints }
    }

    /// 处理一个主机发来的包，返回设备的应答序列
    pub fn handle(&mut self, packet: &Packet) -> Vec<Packet> {
        match packet.packet_id {
            PacketId::Request => self.handle_request(packet),
            PacketId::PositionLimits | PacketId::VelocityLimits | PacketId::CurrentLimits => {
                self.handle_limit_write(packet);
                Vec::new()
            },
            // 其余写入（模式切换等）对模拟器不产生应答
            _ => Vec::new(),
        }
    }

    fn handle_request(&self, packet: &Packet) -> Vec<Packet> {
        let payload = packet.payload();
        if payload.len() != 1 {
            debug!("Malformed request payload, ignoring");
            return Vec::new();
        }
        let Ok(requested) = PacketId::try_from(payload[0]) else {
            debug!(byte = payload[0], "Request for unknown packet id, ignoring");
            return Vec::new();
        };

        let targets: Vec<DeviceId> = if packet.device_id == DeviceId::AllJoints {
            self.joints.keys().copied().collect()
        } else {
            vec![packet.device_id]
        };

        targets
            .into_iter()
            .filter_map(|device| self.telemetry(device, requested))
            .collect()
    }

    fn handle_limit_write(&mut self, packet: &Packet) {
        let Ok(payload) = <[u8; 8]>::try_from(packet.payload()) else {
            debug!("Malformed limit write payload, ignoring");
            return;
        };
        let pair = LimitPair::from_wire(payload);
        let targets: Vec<DeviceId> = if packet.device_id == DeviceId::AllJoints {
            self.joints.keys().copied().collect()
        } else {
            vec![packet.device_id]
        };
        for device in targets {
            if let Some(joint) = self.joints.get_mut(&device) {
                match packet.packet_id {
                    PacketId::PositionLimits => joint.position_limits = pair,
                    PacketId::VelocityLimits => joint.velocity_limits = pair,
                    PacketId::CurrentLimits => joint.current_limits = pair,
                    _ => unreachable!(),
                }
            }
        }
    }

    /// 构造一条遥测应答
    fn telemetry(&self, device: DeviceId, id: PacketId) -> Option<Packet> {
        let joint = self.joints.get(&device)?;
        let packet = match id {
            PacketId::Mode => Packet::new(device, id, &[u8::from(joint.mode)]),
            PacketId::SoftwareVersion => Packet::new(
                device,
                id,
                &[joint.firmware.major, joint.firmware.minor, joint.firmware.patch],
            ),
            PacketId::PositionLimits => Packet::new(device, id, &joint.position_limits.to_wire()),
            PacketId::VelocityLimits => Packet::new(device, id, &joint.velocity_limits.to_wire()),
            PacketId::CurrentLimits => Packet::new(device, id, &joint.current_limits.to_wire()),
            PacketId::Position => Packet::new(device, id, &joint.position.to_le_bytes()),
            PacketId::Velocity => Packet::new(device, id, &joint.velocity.to_le_bytes()),
            PacketId::Current => Packet::new(device, id, &joint.current.to_le_bytes()),
            PacketId::Temperature => Packet::new(device, id, &joint.temperature.to_le_bytes()),
            PacketId::Voltage => Packet::new(device, id, &joint.voltage.to_le_bytes()),
            PacketId::HeartbeatFrequency => {
                Packet::new(device, id, &joint.heartbeat_frequency.to_le_bytes())
            },
            PacketId::SerialNumber => Packet::new(device, id, &joint.serial_number.to_le_bytes()),
            PacketId::ModelNumber => Packet::new(device, id, &joint.model_number.to_le_bytes()),
            PacketId::Request => return None,
        };
        Some(packet)
    }

    /// 读取某关节的模拟状态（测试断言用）
    pub fn joint(&self, device: DeviceId) -> Option<&SimJointState> {
        self.joints.get(&device)
    }

    /// 修改某关节的模拟状态（测试布置用）
    pub fn joint_mut(&mut self, device: DeviceId) -> Option<&mut SimJointState> {
        self.joints.get_mut(&device)
    }
}

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::new()
    }
}

struct MockState {
    opened: bool,
    open_count: u32,
    close_count: u32,
    sent: Vec<Packet>,
    incoming: VecDeque<Packet>,
    arm: Option<SimulatedArm>,
}

/// Mock 传输
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Mock 传输的外部观察句柄
///
/// 传输本体在 `connect()` 后归 IO 线程所有，测试通过本句柄
/// 注入包、检查已发送序列和开关计数。
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// 创建不带模拟器的 mock 传输（接收队列完全由测试驱动）
    pub fn new() -> (Self, MockHandle) {
        Self::build(None)
    }

    /// 创建挂载 [`SimulatedArm`] 的 mock 传输
    pub fn simulated() -> (Self, MockHandle) {
        Self::build(Some(SimulatedArm::new()))
    }

    fn build(arm: Option<SimulatedArm>) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            opened: false,
            open_count: 0,
            close_count: 0,
            sent: Vec::new(),
            incoming: VecDeque::new(),
            arm,
        }));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.opened = true;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.opened {
            state.opened = false;
            state.close_count += 1;
        }
    }

    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.opened {
            return Err(TransportError::NotConnected);
        }
        state.sent.push(*packet);
        if let Some(arm) = state.arm.as_mut() {
            let responses = arm.handle(packet);
            state.incoming.extend(responses);
        }
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<Packet, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock();
                if !state.opened {
                    return Err(TransportError::Closed);
                }
                if let Some(packet) = state.incoming.pop_front() {
                    return Ok(packet);
                }
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }
}

impl MockHandle {
    /// 已发送包序列的拷贝
    pub fn sent(&self) -> Vec<Packet> {
        self.state.lock().sent.clone()
    }

    /// 已发送的请求包中被请求的遥测类型序列
    pub fn sent_requests(&self) -> Vec<PacketId> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|p| p.packet_id == PacketId::Request)
            .filter_map(|p| p.payload().first().copied())
            .filter_map(|byte| PacketId::try_from(byte).ok())
            .collect()
    }

    /// 清空已发送记录
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// 注入一个待接收的包
    pub fn push_incoming(&self, packet: Packet) {
        self.state.lock().incoming.push_back(packet);
    }

    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().opened
    }

    /// 访问内部模拟器（未挂载时返回 `None`）
    pub fn with_simulator<R>(&self, f: impl FnOnce(&mut SimulatedArm) -> R) -> Option<R> {
        self.state.lock().arm.as_mut().map(f)
    }
}
