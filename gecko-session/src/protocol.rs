//! 协议层
//! connect 握手：准入校验、会话注册表、遗嘱消息、握手收尾

pub(crate) use admission::{Admission, Admitter};
pub(crate) use finalizer::finalize;
pub use registry::{AdmitOutcome, Registry};
pub(crate) use will::WillDispatcher;

use crate::{
    error::ErrorKind,
    network::packet::{
        v3, v4,
        v5::{self, AuthReasonCode, ConnectReasonCode},
        ConnectMessage, Protocol,
    },
};

mod admission;
mod finalizer;
mod registry;
mod will;

/// 对 connect 报文的回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePacket {
    V3(v3::ConnAck),
    V4(v4::ConnAck),
    V5(v5::ConnAck),
    /// v5 扩展认证
    Auth(v5::Auth),
}

/// 一次握手的回复，每次握手只构造一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    packet: ResponsePacket,
    /// false 表示不向客户端发送回复
    send: bool,
}

impl Response {
    pub fn new(packet: ResponsePacket) -> Self {
        Self { packet, send: true }
    }

    /// 根据 connect 报文的协议版本构造回复
    /// v5 客户端请求扩展认证时回复 AUTH
    pub fn for_connect(connect: &ConnectMessage) -> Self {
        let packet = match connect {
            ConnectMessage::V3(_) => {
                ResponsePacket::V3(v3::ConnAck::new(v3::ConnectReturnCode::Success, false))
            }
            ConnectMessage::V4(_) => {
                ResponsePacket::V4(v4::ConnAck::new(v4::ConnectReturnCode::Success, false))
            }
            ConnectMessage::V5(c) if c.authentication_method().is_some() => {
                ResponsePacket::Auth(v5::Auth::new(AuthReasonCode::ContinueAuthentication))
            }
            ConnectMessage::V5(_) => {
                ResponsePacket::V5(v5::ConnAck::new(ConnectReasonCode::Success, false))
            }
        };
        Self::new(packet)
    }

    pub fn packet(&self) -> &ResponsePacket {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut ResponsePacket {
        &mut self.packet
    }

    pub fn into_packet(self) -> ResponsePacket {
        self.packet
    }

    pub fn protocol(&self) -> Protocol {
        match self.packet {
            ResponsePacket::V3(_) => Protocol::V3,
            ResponsePacket::V4(_) => Protocol::V4,
            ResponsePacket::V5(_) | ResponsePacket::Auth(_) => Protocol::V5,
        }
    }

    #[inline]
    pub fn is_auth(&self) -> bool {
        matches!(self.packet, ResponsePacket::Auth(_))
    }

    pub fn reason_code(&self) -> u8 {
        match &self.packet {
            ResponsePacket::V3(ack) => ack.code as u8,
            ResponsePacket::V4(ack) => ack.code as u8,
            ResponsePacket::V5(ack) => ack.code as u8,
            ResponsePacket::Auth(auth) => auth.code as u8,
        }
    }

    /// 回复中的原因码对应的错误类型
    pub fn error(&self) -> ErrorKind {
        ErrorKind::from_reason_code(self.protocol(), self.reason_code())
    }

    /// 按协议版本设置原因码
    pub fn set_error(&mut self, kind: ErrorKind) {
        let code = kind.to_reason_code(self.protocol());
        match &mut self.packet {
            ResponsePacket::V3(ack) => {
                ack.code = v3::ConnectReturnCode::try_from(code)
                    .unwrap_or(v3::ConnectReturnCode::ServerUnavailable);
            }
            ResponsePacket::V4(ack) => {
                ack.code = v4::ConnectReturnCode::try_from(code)
                    .unwrap_or(v4::ConnectReturnCode::ServiceUnavailable);
            }
            ResponsePacket::V5(ack) => {
                ack.code =
                    ConnectReasonCode::try_from(code).unwrap_or(ConnectReasonCode::UnspecifiedError);
            }
            // AUTH 只能携带认证流程的原因码
            ResponsePacket::Auth(auth) => {
                if let Ok(code) = AuthReasonCode::try_from(code) {
                    auth.code = code;
                }
            }
        }

        // If a server sends a CONNACK packet containing a non-zero return code it MUST set Session Present to 0 [MQTT-3.2.2-4].
        if !kind.is_success() {
            self.set_session_present(false);
        }
    }

    pub fn session_present(&self) -> bool {
        match &self.packet {
            ResponsePacket::V3(ack) => ack.session_present,
            ResponsePacket::V4(ack) => ack.session_present,
            ResponsePacket::V5(ack) => ack.session_present,
            ResponsePacket::Auth(_) => false,
        }
    }

    pub fn set_session_present(&mut self, session_present: bool) {
        match &mut self.packet {
            ResponsePacket::V3(ack) => ack.session_present = session_present,
            ResponsePacket::V4(ack) => ack.session_present = session_present,
            ResponsePacket::V5(ack) => ack.session_present = session_present,
            ResponsePacket::Auth(_) => {}
        }
    }

    #[inline]
    pub fn send_flag(&self) -> bool {
        self.send
    }

    #[inline]
    pub fn set_send_flag(&mut self, send: bool) {
        self.send = send;
    }
}
