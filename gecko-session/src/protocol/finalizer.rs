use log::debug;

use crate::{error::ErrorKind, protocol::ResponsePacket};

use super::Response;

/// 握手收尾：由回复的原因码得到错误类型
/// v5 成功的 CONNACK 未携带 topic alias maximum 时补上服务端配置的值
pub(crate) fn finalize(response: &mut Response, topic_alias_maximum: u16) -> ErrorKind {
    let error = response.error();
    match response.packet_mut() {
        ResponsePacket::V5(ack) if error.is_success() => {
            let properties = ack.properties_mut();
            if properties.topic_alias_max.is_none() {
                properties.topic_alias_max = Some(topic_alias_maximum);
            }
        }
        // 扩展认证尚未支持多轮交互，不做处理
        ResponsePacket::Auth(_) => {
            debug!("finalize auth response");
        }
        _ => {}
    }
    error
}
