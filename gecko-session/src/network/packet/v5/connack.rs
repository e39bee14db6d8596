use bytes::Bytes;

use crate::network::packet::Error;

use super::PropertyType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub code: ConnectReasonCode,
    pub properties: Option<ConnAckProperties>,
}

impl ConnAck {
    pub fn new(code: ConnectReasonCode, session_present: bool) -> Self {
        Self {
            session_present,
            code,
            properties: None,
        }
    }

    /// 获取属性集合，不存在时创建一个空集合
    pub fn properties_mut(&mut self) -> &mut ConnAckProperties {
        self.properties.get_or_insert_with(ConnAckProperties::default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReasonCode {
    Success = 0x00,
    UnspecifiedError = 0x80,
    MalformedPacket = 0x81,
    ProtocolError = 0x82,
    ImplementationSpecificError = 0x83,
    UnsupportedProtocolVersion = 0x84,
    ClientIdentifierNotValid = 0x85,
    BadUserNamePassword = 0x86,
    NotAuthorized = 0x87,
    ServerUnavailable = 0x88,
    ServerBusy = 0x89,
    Banned = 0x8A,
    BadAuthenticationMethod = 0x8C,
    TopicNameInvalid = 0x90,
    PacketTooLarge = 0x95,
    QuotaExceeded = 0x97,
    PayloadFormatInvalid = 0x99,
    RetainNotSupported = 0x9A,
    QoSNotSupported = 0x9B,
    UseAnotherServer = 0x9C,
    ServerMoved = 0x9D,
    ConnectionRateExceeded = 0x9F,
}

impl TryFrom<u8> for ConnectReasonCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let rc = match value {
            0x00 => Self::Success,
            0x80 => Self::UnspecifiedError,
            0x81 => Self::MalformedPacket,
            0x82 => Self::ProtocolError,
            0x83 => Self::ImplementationSpecificError,
            0x84 => Self::UnsupportedProtocolVersion,
            0x85 => Self::ClientIdentifierNotValid,
            0x86 => Self::BadUserNamePassword,
            0x87 => Self::NotAuthorized,
            0x88 => Self::ServerUnavailable,
            0x89 => Self::ServerBusy,
            0x8A => Self::Banned,
            0x8C => Self::BadAuthenticationMethod,
            0x90 => Self::TopicNameInvalid,
            0x95 => Self::PacketTooLarge,
            0x97 => Self::QuotaExceeded,
            0x99 => Self::PayloadFormatInvalid,
            0x9A => Self::RetainNotSupported,
            0x9B => Self::QoSNotSupported,
            0x9C => Self::UseAnotherServer,
            0x9D => Self::ServerMoved,
            0x9F => Self::ConnectionRateExceeded,
            other => return Err(Error::InvalidReasonCode(other)),
        };

        Ok(rc)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnAckProperties {
    pub session_expiry_interval: Option<u32>,
    pub receive_max: Option<u16>,
    pub max_qos: Option<u8>,
    pub retain_available: Option<u8>,
    pub max_packet_size: Option<u32>,
    pub assigned_client_identifier: Option<String>,
    pub topic_alias_max: Option<u16>,
    pub reason_string: Option<String>,
    pub user_properties: Vec<(String, String)>,
    pub wildcard_subscription_available: Option<u8>,
    pub subscription_identifiers_available: Option<u8>,
    pub shared_subscription_available: Option<u8>,
    pub server_keep_alive: Option<u16>,
    pub response_information: Option<String>,
    pub server_reference: Option<String>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Bytes>,
}

impl ConnAckProperties {
    /// 属性集合中是否已经带有某个属性
    pub fn has(&self, property: PropertyType) -> bool {
        match property {
            PropertyType::SessionExpiryInterval => self.session_expiry_interval.is_some(),
            PropertyType::ReceiveMaximum => self.receive_max.is_some(),
            PropertyType::MaximumQos => self.max_qos.is_some(),
            PropertyType::RetainAvailable => self.retain_available.is_some(),
            PropertyType::MaximumPacketSize => self.max_packet_size.is_some(),
            PropertyType::AssignedClientIdentifier => self.assigned_client_identifier.is_some(),
            PropertyType::TopicAliasMaximum => self.topic_alias_max.is_some(),
            PropertyType::ReasonString => self.reason_string.is_some(),
            PropertyType::UserProperty => !self.user_properties.is_empty(),
            PropertyType::WildcardSubscriptionAvailable => {
                self.wildcard_subscription_available.is_some()
            }
            PropertyType::SubscriptionIdentifierAvailable => {
                self.subscription_identifiers_available.is_some()
            }
            PropertyType::SharedSubscriptionAvailable => {
                self.shared_subscription_available.is_some()
            }
            PropertyType::ServerKeepAlive => self.server_keep_alive.is_some(),
            PropertyType::ResponseInformation => self.response_information.is_some(),
            PropertyType::ServerReference => self.server_reference.is_some(),
            PropertyType::AuthenticationMethod => self.authentication_method.is_some(),
            PropertyType::AuthenticationData => self.authentication_data.is_some(),
            // CONNACK 不携带其余属性
            _ => false,
        }
    }
}
