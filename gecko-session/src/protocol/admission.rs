use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::{
    error::ErrorKind,
    network::{packet::ConnectMessage, Connection},
    protocol::{AdmitOutcome, Registry, Response, ResponsePacket, WillDispatcher},
    Hook,
};

/// 一次 connect 握手的准入结果
#[derive(Debug)]
pub(crate) enum Admission {
    /// 拒绝，原因码已写入回复
    Rejected(ErrorKind),
    /// 连接已登记到注册表
    SessionReady {
        outcome: AdmitOutcome,
        session_present: bool,
        /// 被本连接接管的旧连接（已通知关闭）
        superseded: Option<Arc<Connection>>,
    },
    /// v5 扩展认证，回复原样返回
    Authenticating,
}

/// connect 报文准入
pub(crate) struct Admitter {
    registry: Arc<Registry>,
    will: WillDispatcher,
    /// 服务端分配 client_id 的前缀
    client_id_prefix: String,
}

impl Admitter {
    pub(crate) fn new(
        registry: Arc<Registry>,
        will: WillDispatcher,
        client_id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            will,
            client_id_prefix: client_id_prefix.into(),
        }
    }

    /// 按顺序执行：重复 connect 检查，认证，客户端 id 校验，会话接管
    /// 校验失败不返回错误，只修改回复的原因码和发送标记
    pub(crate) async fn admit<H: Hook>(
        &self,
        conn: &Arc<Connection>,
        mut connect: ConnectMessage,
        hook: &H,
        response: &mut Response,
    ) -> Admission {
        // 同一个连接上只能有一个 connect 报文生效，第二个 connect 视为协议错误，不回复
        if let Err(state) = conn.try_start() {
            warn!(
                "connection {} received connect in state {:?}, client_id: {}",
                conn.id(),
                state,
                connect.client_id()
            );
            response.set_error(ErrorKind::MalformedPacket);
            response.set_send_flag(false);
            return Admission::Rejected(ErrorKind::MalformedPacket);
        }

        // 扩展认证暂不处理
        if response.is_auth() {
            debug!(
                "connection {} starts extended authentication, method: {:?}",
                conn.id(),
                connect.authentication_method()
            );
            return Admission::Authenticating;
        }

        if let Some(kind) = hook.authenticate(connect.login()).await.error() {
            info!(
                "client {} authentication failed: {}",
                connect.client_id(),
                kind
            );
            response.set_error(kind);
            return Admission::Rejected(kind);
        }

        let clean_session = connect.clean_session();
        if connect.client_id().is_empty() {
            if !clean_session {
                info!(
                    "connection {} rejected: empty client id with persistent session",
                    conn.id()
                );
                response.set_error(ErrorKind::ClientIdentifierNotValid);
                return Admission::Rejected(ErrorKind::ClientIdentifierNotValid);
            }
            let client_id = self.assign_client_id(conn);
            debug!("connection {} assigned client id {}", conn.id(), client_id);
            if let ResponsePacket::V5(ack) = response.packet_mut() {
                ack.properties_mut().assigned_client_identifier = Some(client_id.clone());
            }
            connect.set_client_id(client_id);
        } else if connect.client_id().starts_with(&self.client_id_prefix) {
            // 服务端分配的 client_id 不能由客户端指定
            info!(
                "connection {} rejected: client id {} uses reserved prefix",
                conn.id(),
                connect.client_id()
            );
            response.set_error(ErrorKind::ClientIdentifierNotValid);
            return Admission::Rejected(ErrorKind::ClientIdentifierNotValid);
        }
        response.set_error(ErrorKind::Success);

        let client_id = connect.client_id().to_owned();
        if !conn.bind(connect) {
            error!("connection {} already bound to a connect packet", conn.id());
            response.set_error(ErrorKind::MalformedPacket);
            response.set_send_flag(false);
            return Admission::Rejected(ErrorKind::MalformedPacket);
        }

        let (outcome, superseded) = self.registry.admit(&client_id, conn.clone());
        if let Some(old) = &superseded {
            self.take_over(conn, old);
        }

        // clean session 总是不存在旧会话
        let session_present =
            !clean_session && matches!(outcome, AdmitOutcome::Replaced { persistent: true });
        response.set_session_present(session_present);

        info!(
            "client {} connected on connection {}, session present: {}",
            client_id,
            conn.id(),
            session_present
        );
        Admission::SessionReady {
            outcome,
            session_present,
            superseded,
        }
    }

    /// 接管旧连接：遗嘱消息放入新连接的事件队列，然后关闭旧连接
    fn take_over(&self, conn: &Arc<Connection>, old: &Arc<Connection>) {
        info!(
            "connection {} takes over client {} from connection {}",
            conn.id(),
            old.client_id().unwrap_or_default(),
            old.id()
        );
        // 旧连接同时异常断开时，由先取走遗嘱的一方发布
        if let (true, Some(old_connect)) = (old.take_will(), old.connect_message()) {
            if let Err(e) = self.will.dispatch(old_connect, conn.queue()) {
                error!(
                    "dispatch will message of connection {} error: {}",
                    old.id(),
                    e
                );
            }
        }
        old.stop();
    }

    /// 由连接 id 生成唯一的 client_id
    fn assign_client_id(&self, conn: &Connection) -> String {
        format!("{}{:016x}", self.client_id_prefix, conn.id())
    }
}
