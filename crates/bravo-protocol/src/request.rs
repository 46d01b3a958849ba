//! 请求表
//!
//! 把"感兴趣的遥测类型"映射为触发设备上报的线缆请求包：
//! 每条请求都发往广播地址 [`DeviceId::AllJoints`]，类型为
//! [`PacketId::Request`]，载荷是被请求类型的单字节 ID。
//!
//! 表在进程内只构建一次（[`LazyLock`]），任何组件都不得修改它。

use crate::{DeviceId, Packet, PacketId};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static REQUEST_TABLE: LazyLock<BTreeMap<PacketId, Packet>> = LazyLock::new(|| {
    PacketId::QUERYABLE
        .into_iter()
        .map(|id| {
            let request = Packet::new(DeviceId::AllJoints, PacketId::Request, &[u8::from(id)]);
            (id, request)
        })
        .collect()
});

/// 查询某个遥测类型对应的请求包
///
/// `Request` 本身以及其它不可查询的类型返回 `None`。
pub fn request_for(id: PacketId) -> Option<&'static Packet> {
    REQUEST_TABLE.get(&id)
}
