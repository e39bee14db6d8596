//! 报文结构
//! 只包含各协议版本报文的字段定义，编解码由传输层负责

use bytes::Bytes;

pub mod v3;
pub mod v4;
pub mod v5;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid protocol level: {0}")]
    InvalidProtocolLevel(u8),
    #[error("Invalid QoS: {0}")]
    InvalidQoS(u8),
    #[error("Invalid reason code: {0:#04x}")]
    InvalidReasonCode(u8),
}

/// mqtt 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// v3.1
    V3,
    /// v3.1.1
    V4,
    /// v5
    V5,
}

impl Protocol {
    /// CONNECT 报文中的协议级别
    pub fn level(&self) -> u8 {
        match self {
            Protocol::V3 => 3,
            Protocol::V4 => 4,
            Protocol::V5 => 5,
        }
    }
}

impl TryFrom<u8> for Protocol {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Protocol::V3),
            4 => Ok(Protocol::V4),
            5 => Ok(Protocol::V5),
            num => Err(Error::InvalidProtocolLevel(num)),
        }
    }
}

/// 服务质量
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[allow(clippy::enum_variant_names)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            qos => Err(Error::InvalidQoS(qos)),
        }
    }
}

/// 遗嘱消息（与协议版本无关）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// 三个协议版本的 connect 报文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectMessage {
    V3(v3::Connect),
    V4(v4::Connect),
    V5(v5::Connect),
}

impl ConnectMessage {
    pub fn protocol(&self) -> Protocol {
        match self {
            ConnectMessage::V3(_) => Protocol::V3,
            ConnectMessage::V4(_) => Protocol::V4,
            ConnectMessage::V5(_) => Protocol::V5,
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            ConnectMessage::V3(c) => &c.client_id,
            ConnectMessage::V4(c) => &c.client_id,
            ConnectMessage::V5(c) => &c.client_id,
        }
    }

    pub fn set_client_id(&mut self, client_id: String) {
        match self {
            ConnectMessage::V3(c) => c.client_id = client_id,
            ConnectMessage::V4(c) => c.client_id = client_id,
            ConnectMessage::V5(c) => c.client_id = client_id,
        }
    }

    /// v3/v4 的 clean session，v5 的 clean start
    pub fn clean_session(&self) -> bool {
        match self {
            ConnectMessage::V3(c) => c.clean_session,
            ConnectMessage::V4(c) => c.clean_session,
            ConnectMessage::V5(c) => c.clean_start,
        }
    }

    pub fn login(&self) -> Option<&v4::Login> {
        match self {
            ConnectMessage::V3(c) => c.login.as_ref(),
            ConnectMessage::V4(c) => c.login.as_ref(),
            ConnectMessage::V5(c) => c.login.as_ref(),
        }
    }

    /// 遗嘱消息，will flag 未设置时为 None
    pub fn will(&self) -> Option<Will> {
        match self {
            ConnectMessage::V3(v3::Connect { last_will, .. })
            | ConnectMessage::V4(v4::Connect { last_will, .. }) => {
                last_will.as_ref().map(|w| Will {
                    topic: w.topic.clone(),
                    payload: w.message.clone(),
                    qos: w.qos,
                    retain: w.retain,
                })
            }
            ConnectMessage::V5(c) => c.last_will.as_ref().map(|w| Will {
                topic: w.topic.clone(),
                payload: w.message.clone(),
                qos: w.qos,
                retain: w.retain,
            }),
        }
    }

    /// v5 扩展认证方法
    pub fn authentication_method(&self) -> Option<&str> {
        match self {
            ConnectMessage::V5(c) => c.authentication_method(),
            _ => None,
        }
    }
}
