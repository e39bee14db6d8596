use tokio::io;

use crate::network::{
    self,
    packet::{
        self,
        v5::{AuthReasonCode, ConnectReasonCode},
        Protocol,
    },
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] network::Error),
    #[error("Packet error: {0}")]
    Packet(#[from] packet::Error),
    #[error("Read config file error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// 握手结果的统一错误域
/// v3/v4/v5 三套原因码都归并到这里
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorKind {
    #[error("Success")]
    Success,
    #[error("Unsupported protocol version")]
    UnsupportedProtocolVersion,
    #[error("Client identifier not valid")]
    ClientIdentifierNotValid,
    #[error("Server unavailable")]
    ServerUnavailable,
    #[error("Bad user name or password")]
    BadCredentials,
    #[error("Not authorized")]
    NotAuthorized,
    #[error("Malformed packet")]
    MalformedPacket,
    /// v5 中没有 v3/v4 对应项的原因码，原样保存数值
    #[error("Reason code {0:#04x}")]
    Reason(u8),
}

impl ErrorKind {
    /// 协议原因码 -> 错误类型
    /// 协议版本未定义的原因码一律视为 MalformedPacket
    pub fn from_reason_code(protocol: Protocol, code: u8) -> Self {
        match protocol {
            Protocol::V3 | Protocol::V4 => match code {
                0 => ErrorKind::Success,
                1 => ErrorKind::UnsupportedProtocolVersion,
                2 => ErrorKind::ClientIdentifierNotValid,
                3 => ErrorKind::ServerUnavailable,
                4 => ErrorKind::BadCredentials,
                5 => ErrorKind::NotAuthorized,
                _ => ErrorKind::MalformedPacket,
            },
            Protocol::V5 => match code {
                0x00 => ErrorKind::Success,
                0x81 => ErrorKind::MalformedPacket,
                0x84 => ErrorKind::UnsupportedProtocolVersion,
                0x85 => ErrorKind::ClientIdentifierNotValid,
                0x86 => ErrorKind::BadCredentials,
                0x87 => ErrorKind::NotAuthorized,
                0x88 => ErrorKind::ServerUnavailable,
                code if ConnectReasonCode::try_from(code).is_ok()
                    || AuthReasonCode::try_from(code).is_ok() =>
                {
                    ErrorKind::Reason(code)
                }
                _ => ErrorKind::MalformedPacket,
            },
        }
    }

    /// 错误类型 -> 协议原因码
    /// v3/v4 没有对应返回码的错误类型使用 ServerUnavailable(3)
    pub fn to_reason_code(self, protocol: Protocol) -> u8 {
        match protocol {
            Protocol::V3 | Protocol::V4 => match self {
                ErrorKind::Success => 0,
                ErrorKind::UnsupportedProtocolVersion => 1,
                ErrorKind::ClientIdentifierNotValid => 2,
                ErrorKind::ServerUnavailable => 3,
                ErrorKind::BadCredentials => 4,
                ErrorKind::NotAuthorized => 5,
                ErrorKind::MalformedPacket | ErrorKind::Reason(_) => 3,
            },
            Protocol::V5 => match self {
                ErrorKind::Success => 0x00,
                ErrorKind::MalformedPacket => 0x81,
                ErrorKind::UnsupportedProtocolVersion => 0x84,
                ErrorKind::ClientIdentifierNotValid => 0x85,
                ErrorKind::BadCredentials => 0x86,
                ErrorKind::NotAuthorized => 0x87,
                ErrorKind::ServerUnavailable => 0x88,
                ErrorKind::Reason(code) => code,
            },
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ErrorKind::Success)
    }
}

#[cfg(test)]
mod tests {
    use crate::network::packet::{v3, v4};

    use super::*;

    #[test]
    fn v3_v4_reason_code_round_trip() {
        for code in 0..=5u8 {
            v3::ConnectReturnCode::try_from(code).unwrap();
            v4::ConnectReturnCode::try_from(code).unwrap();
            for protocol in [Protocol::V3, Protocol::V4] {
                let kind = ErrorKind::from_reason_code(protocol, code);
                assert_eq!(kind.to_reason_code(protocol), code);
            }
        }
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V4, 2),
            ErrorKind::ClientIdentifierNotValid
        );
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V3, 4),
            ErrorKind::BadCredentials
        );
    }

    #[test]
    fn v5_reason_code_round_trip() {
        let mut defined = 0;
        for code in 0..=u8::MAX {
            let is_connack = ConnectReasonCode::try_from(code).is_ok();
            let is_auth = AuthReasonCode::try_from(code).is_ok();
            let kind = ErrorKind::from_reason_code(Protocol::V5, code);
            if is_connack || is_auth {
                defined += 1;
                assert_eq!(kind.to_reason_code(Protocol::V5), code, "code {code:#04x}");
            } else {
                assert_eq!(kind, ErrorKind::MalformedPacket, "code {code:#04x}");
            }
        }
        // 22 个 CONNACK 原因码 + 2 个 AUTH 独有的原因码
        assert_eq!(defined, 24);
    }

    #[test]
    fn v5_codes_share_kinds_with_v4() {
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V5, ConnectReasonCode::NotAuthorized as u8),
            ErrorKind::from_reason_code(Protocol::V4, v4::ConnectReturnCode::NotAuthorized as u8),
        );
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V5, ConnectReasonCode::Banned as u8),
            ErrorKind::Reason(0x8A)
        );
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V5, AuthReasonCode::ContinueAuthentication as u8),
            ErrorKind::Reason(0x18)
        );
    }

    #[test]
    fn undefined_codes_are_malformed() {
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V4, 6),
            ErrorKind::MalformedPacket
        );
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V3, 0x80),
            ErrorKind::MalformedPacket
        );
        assert_eq!(
            ErrorKind::from_reason_code(Protocol::V5, 0x01),
            ErrorKind::MalformedPacket
        );
        // v3/v4 没有 malformed 返回码
        assert_eq!(ErrorKind::MalformedPacket.to_reason_code(Protocol::V4), 3);
        assert_eq!(ErrorKind::Reason(0x8A).to_reason_code(Protocol::V3), 3);
    }
}
