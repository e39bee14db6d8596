//! mqtt 服务端 connect 握手与会话准入
//!
//! 支持 v3.1 / v3.1.1 / v5 三个协议版本，负责：
//! * 校验 connect 报文（重复 connect、客户端 id 规则）
//! * 维护 client_id -> 连接 的会话注册表，处理会话接管
//! * 被接管或异常断开时发布遗嘱消息
//! * 生成 CONNACK/AUTH 回复并得出握手结果
//!
//! 报文编解码、订阅管理和消息路由由使用方实现，通过 [`Link`]、[`Fanout`]、[`Hook`] 接入

use async_trait::async_trait;

pub use broker::{Broker, DisconnectKind, Handshake};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use network::{packet, Connection, ConnectionId, EventLoop, EventQueue, Link, State};
pub use protocol::{AdmitOutcome, Registry, Response, ResponsePacket};

use network::packet::{v4::Login, v5};

pub mod broker;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;

#[cfg(test)]
mod mock;

/// 认证结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    Accepted,
    /// 用户名或密码错误
    BadCredentials,
    /// 无权限连接
    NotAuthorized,
}

impl Authentication {
    /// 认证失败时对应的错误类型
    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Authentication::Accepted => None,
            Authentication::BadCredentials => Some(ErrorKind::BadCredentials),
            Authentication::NotAuthorized => Some(ErrorKind::NotAuthorized),
        }
    }
}

/// mqtt事件发生时的回调，由用户实现
///
#[async_trait]
pub trait Hook: Send + Sync + 'static {
    /// 客户端认证
    async fn authenticate(&self, login: Option<&Login>) -> Authentication;
    /// 客户端上线
    async fn connected(&self, client_id: &str, session_present: bool);
    /// 客户端连接断开
    async fn disconnect(&self, client_id: &str);
}

pub struct HookNoop;

#[async_trait]
impl Hook for HookNoop {
    /// 客户端认证
    async fn authenticate(&self, _login: Option<&Login>) -> Authentication {
        Authentication::Accepted
    }
    /// 客户端上线
    async fn connected(&self, _client_id: &str, _session_present: bool) {}
    /// 客户端连接断开
    async fn disconnect(&self, _client_id: &str) {}
}

/// 消息分发，把消息投递给所有匹配的订阅者
#[async_trait]
pub trait Fanout: Send + Sync + 'static {
    /// origin 为发布者的 client_id，服务端发出的消息（遗嘱）为空字符串
    async fn multicast(&self, publish: v5::Publish, origin: &str);
}
