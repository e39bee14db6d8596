use bytes::Bytes;

use crate::network::packet::QoS;

pub use crate::network::packet::v4::Login;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connect {
    /// keepalive 时长
    pub keepalive: u16,
    /// 客户端id
    pub client_id: String,
    /// 是否清除会话
    pub clean_start: bool,
    /// 遗嘱消息
    pub last_will: Option<LastWill>,
    /// 登录凭证
    pub login: Option<Login>,
    /// 属性
    pub properties: Option<ConnectProperties>,
}

impl Connect {
    pub fn new(client_id: impl Into<String>, clean_start: bool) -> Self {
        Self {
            client_id: client_id.into(),
            clean_start,
            ..Default::default()
        }
    }

    /// 客户端请求的扩展认证方法
    pub fn authentication_method(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.authentication_method.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Option<WillProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WillProperties {
    pub delay_interval: Option<u32>,
    pub payload_format_indicator: Option<u8>,
    pub message_expiry_interval: Option<u32>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub user_properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectProperties {
    pub session_expiry_interval: Option<u32>,
    pub receive_maximum: Option<u16>,
    pub max_packet_size: Option<u32>,
    pub topic_alias_max: Option<u16>,
    pub request_response_info: Option<u8>,
    pub request_problem_info: Option<u8>,
    pub user_properties: Vec<(String, String)>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Bytes>,
}
