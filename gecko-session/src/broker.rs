use std::{sync::Arc, time::Duration};

use log::{debug, info};

use crate::{
    config::Config,
    error::ErrorKind,
    network::{packet::ConnectMessage, Connection},
    protocol::{finalize, Admission, Admitter, Registry, Response, WillDispatcher},
    Fanout, Hook, HookNoop,
};

/// connect 握手的结果
#[derive(Debug)]
pub struct Handshake {
    /// 回复给客户端的报文，send_flag 为 false 时不发送
    pub response: Response,
    /// 被拒绝时为拒绝原因，否则为回复原因码对应的错误类型
    pub error: ErrorKind,
    /// 连接是否已登记到注册表
    pub accepted: bool,
    pub session_present: bool,
    /// 被本连接接管的旧连接，使用方可以从中迁移订阅等会话状态
    pub superseded: Option<Arc<Connection>>,
}

/// 连接断开的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// 客户端发送了 DISCONNECT，丢弃遗嘱消息
    Normal,
    /// 连接异常断开，发布遗嘱消息
    Abnormal,
}

/// 代表一个 mqtt 节点的会话管理
pub struct Broker<H: Hook = HookNoop> {
    cfg: Config,
    registry: Arc<Registry>,
    admitter: Admitter,
    will: WillDispatcher,
    hook: Arc<H>,
}

impl Broker<HookNoop> {
    pub fn new(cfg: Config, fanout: Arc<dyn Fanout>) -> Self {
        Self::with_hook(cfg, fanout, Arc::new(HookNoop))
    }
}

impl<H: Hook> Broker<H> {
    pub fn with_hook(cfg: Config, fanout: Arc<dyn Fanout>, hook: Arc<H>) -> Self {
        let registry = Arc::new(Registry::new(Duration::from_secs(
            cfg.session.expire_interval,
        )));
        let will = WillDispatcher::new(fanout);
        let admitter = Admitter::new(
            registry.clone(),
            will.clone(),
            cfg.broker.client_id_prefix.clone(),
        );
        Self {
            cfg,
            registry,
            admitter,
            will,
            hook,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn lookup(&self, client_id: &str) -> Option<Arc<Connection>> {
        self.registry.lookup(client_id)
    }

    /// 处理连接上收到的 connect 报文
    pub async fn connect(&self, conn: &Arc<Connection>, connect: ConnectMessage) -> Handshake {
        let mut response = Response::for_connect(&connect);
        let admission = self
            .admitter
            .admit(conn, connect, self.hook.as_ref(), &mut response)
            .await;
        let error = finalize(&mut response, self.cfg.broker.topic_alias_maximum);

        match admission {
            Admission::SessionReady {
                session_present,
                superseded,
                ..
            } => {
                if let Some(client_id) = conn.client_id() {
                    self.hook.connected(client_id, session_present).await;
                }
                Handshake {
                    response,
                    error,
                    accepted: true,
                    session_present,
                    superseded,
                }
            }
            Admission::Rejected(kind) => {
                debug!("connection {} handshake rejected: {}", conn.id(), kind);
                Handshake {
                    response,
                    error: kind,
                    accepted: false,
                    session_present: false,
                    superseded: None,
                }
            }
            Admission::Authenticating => Handshake {
                response,
                error,
                accepted: false,
                session_present: false,
                superseded: None,
            },
        }
    }

    /// 传输层关闭连接后调用
    pub async fn disconnect(&self, conn: &Arc<Connection>, kind: DisconnectKind) {
        conn.mark_stopped();

        let connect = match conn.connect_message() {
            Some(connect) => connect,
            None => return,
        };
        let owned = self.registry.release(conn);

        // 接管时未取走遗嘱（旧连接已不处于 started），由断开方处理
        if conn.take_will() && kind == DisconnectKind::Abnormal {
            self.will.publish(connect).await;
        }

        if !owned {
            debug!(
                "connection {} of client {} was taken over",
                conn.id(),
                connect.client_id()
            );
            return;
        }

        info!(
            "client {} disconnected ({:?}) on connection {}",
            connect.client_id(),
            kind,
            conn.id()
        );
        self.hook.disconnect(connect.client_id()).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::{
        mock::{self, MockFanout},
        network::packet::{
            v3, v4,
            v5::{self, ConnectReasonCode},
            QoS,
        },
        protocol::ResponsePacket,
        Authentication,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingHook {
        connected: Mutex<Vec<(String, bool)>>,
        disconnected: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Hook for RecordingHook {
        async fn authenticate(&self, login: Option<&v4::Login>) -> Authentication {
            match login {
                Some(login) if login.password == "bad" => Authentication::BadCredentials,
                _ => Authentication::Accepted,
            }
        }
        async fn connected(&self, client_id: &str, session_present: bool) {
            self.connected
                .lock()
                .unwrap()
                .push((client_id.to_owned(), session_present));
        }
        async fn disconnect(&self, client_id: &str) {
            self.disconnected.lock().unwrap().push(client_id.to_owned());
        }
    }

    fn broker() -> (Broker<RecordingHook>, Arc<MockFanout>, Arc<RecordingHook>) {
        let fanout = Arc::new(MockFanout::default());
        let hook = Arc::new(RecordingHook::default());
        let broker = Broker::with_hook(Config::default(), fanout.clone(), hook.clone());
        (broker, fanout, hook)
    }

    fn with_will(client_id: &str, clean_session: bool) -> ConnectMessage {
        let mut connect = v4::Connect::new(client_id, clean_session);
        connect.last_will = Some(v4::LastWill {
            topic: "t".into(),
            message: Bytes::from_static(b"p"),
            qos: QoS::AtLeastOnce,
            retain: false,
        });
        ConnectMessage::V4(connect)
    }

    #[tokio::test]
    async fn clean_then_persistent_takeover() {
        let (broker, fanout, hook) = broker();

        let (old_link, old, _old_loop) = mock::connection();
        let handshake = broker
            .connect(&old, ConnectMessage::V4(v4::Connect::new("c1", true)))
            .await;
        assert!(handshake.accepted);
        assert_eq!(handshake.error, ErrorKind::Success);
        assert!(!handshake.session_present);
        assert!(handshake.superseded.is_none());

        let (_, new, mut new_loop) = mock::connection();
        let handshake = broker
            .connect(&new, ConnectMessage::V4(v4::Connect::new("c1", false)))
            .await;
        assert!(handshake.accepted);
        assert!(!handshake.session_present);
        assert!(!handshake.response.session_present());
        assert!(Arc::ptr_eq(&handshake.superseded.unwrap(), &old));
        assert_eq!(old_link.stops(), 1);
        assert!(Arc::ptr_eq(&broker.lookup("c1").unwrap(), &new));

        // 旧连接没有遗嘱消息
        assert_eq!(new_loop.run_pending().await, 0);
        assert!(fanout.published().is_empty());
        assert_eq!(
            *hook.connected.lock().unwrap(),
            vec![("c1".to_owned(), false), ("c1".to_owned(), false)]
        );
    }

    #[tokio::test]
    async fn takeover_publishes_will_once() {
        let (broker, fanout, hook) = broker();

        let (_, old, _old_loop) = mock::connection();
        broker.connect(&old, with_will("c1", false)).await;

        let (_, new, mut new_loop) = mock::connection();
        let handshake = broker
            .connect(&new, ConnectMessage::V4(v4::Connect::new("c1", false)))
            .await;
        assert!(handshake.session_present);
        assert_eq!(new_loop.run_pending().await, 1);

        // 旧连接随后断开，不再重复发布遗嘱，也不触发下线回调
        broker.disconnect(&old, DisconnectKind::Abnormal).await;
        let published = fanout.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0.topic, "t");
        assert_eq!(published[0].0.payload, Bytes::from_static(b"p"));
        assert_eq!(published[0].1, "");
        assert!(hook.disconnected.lock().unwrap().is_empty());
        assert!(Arc::ptr_eq(&broker.lookup("c1").unwrap(), &new));
    }

    #[tokio::test]
    async fn will_survives_takeover_of_stopped_connection() {
        let (broker, fanout, hook) = broker();

        // 传输层已关闭旧连接，但 disconnect 尚未执行时新连接接管
        let (_, old, _old_loop) = mock::connection();
        broker.connect(&old, with_will("c1", false)).await;
        old.mark_stopped();

        let (_, new, mut new_loop) = mock::connection();
        let handshake = broker
            .connect(&new, ConnectMessage::V4(v4::Connect::new("c1", false)))
            .await;
        assert!(handshake.superseded.is_none());
        assert_eq!(new_loop.run_pending().await, 0);

        broker.disconnect(&old, DisconnectKind::Abnormal).await;
        let published = fanout.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0.topic, "t");
        assert_eq!(published[0].1, "");
        assert!(hook.disconnected.lock().unwrap().is_empty());

        // 重复的 disconnect 不会再次发布
        broker.disconnect(&old, DisconnectKind::Abnormal).await;
        assert_eq!(fanout.published().len(), 1);
    }

    #[tokio::test]
    async fn will_survives_takeover_of_stopping_connection() {
        let (broker, fanout, _) = broker();

        let (old_link, old, _old_loop) = mock::connection();
        broker.connect(&old, with_will("c1", true)).await;
        old.stop();

        let (_, new, mut new_loop) = mock::connection();
        broker
            .connect(&new, ConnectMessage::V4(v4::Connect::new("c1", true)))
            .await;
        assert_eq!(new_loop.run_pending().await, 0);
        assert_eq!(old_link.stops(), 1);

        broker.disconnect(&old, DisconnectKind::Abnormal).await;
        assert_eq!(fanout.published().len(), 1);
        assert!(Arc::ptr_eq(&broker.lookup("c1").unwrap(), &new));
    }

    #[tokio::test]
    async fn normal_disconnect_after_takeover_discards_will() {
        let (broker, fanout, _) = broker();

        let (_, old, _old_loop) = mock::connection();
        broker.connect(&old, with_will("c1", false)).await;
        old.mark_stopped();

        let (_, new, _new_loop) = mock::connection();
        broker
            .connect(&new, ConnectMessage::V4(v4::Connect::new("c1", false)))
            .await;
        broker.disconnect(&old, DisconnectKind::Normal).await;
        broker.disconnect(&old, DisconnectKind::Abnormal).await;
        assert!(fanout.published().is_empty());
    }

    #[tokio::test]
    async fn abnormal_disconnect_publishes_will() {
        let (broker, fanout, hook) = broker();
        let (_, conn, _event_loop) = mock::connection();
        broker.connect(&conn, with_will("c1", true)).await;

        broker.disconnect(&conn, DisconnectKind::Abnormal).await;
        assert_eq!(fanout.published().len(), 1);
        assert_eq!(conn.state(), crate::State::Stopped);
        assert!(broker.lookup("c1").is_none());
        assert_eq!(*hook.disconnected.lock().unwrap(), vec!["c1".to_owned()]);
    }

    #[tokio::test]
    async fn normal_disconnect_discards_will() {
        let (broker, fanout, hook) = broker();
        let (_, conn, _event_loop) = mock::connection();
        broker.connect(&conn, with_will("c1", false)).await;

        broker.disconnect(&conn, DisconnectKind::Normal).await;
        assert!(fanout.published().is_empty());
        // 持久会话保留
        assert!(broker.lookup("c1").is_some());
        assert_eq!(hook.disconnected.lock().unwrap().len(), 1);

        let (_, resumed, _resumed_loop) = mock::connection();
        let handshake = broker
            .connect(&resumed, ConnectMessage::V4(v4::Connect::new("c1", false)))
            .await;
        assert!(handshake.session_present);
        assert!(handshake.superseded.is_none());
    }

    #[tokio::test]
    async fn duplicate_connect_is_not_answered() {
        let (broker, _, hook) = broker();
        let (link, conn, _event_loop) = mock::connection();
        broker
            .connect(&conn, ConnectMessage::V3(v3::Connect::new("c1", true)))
            .await;

        let handshake = broker
            .connect(&conn, ConnectMessage::V3(v3::Connect::new("c2", true)))
            .await;
        assert!(!handshake.accepted);
        assert_eq!(handshake.error, ErrorKind::MalformedPacket);
        assert!(!handshake.response.send_flag());
        assert!(broker.lookup("c2").is_none());
        assert_eq!(link.stops(), 0);
        assert_eq!(hook.connected.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_persistent_client_id_is_rejected() {
        let (broker, _, hook) = broker();
        let (_, conn, _event_loop) = mock::connection();
        let handshake = broker
            .connect(&conn, ConnectMessage::V5(v5::Connect::new("", false)))
            .await;
        assert!(!handshake.accepted);
        assert_eq!(handshake.error, ErrorKind::ClientIdentifierNotValid);
        assert!(handshake.response.send_flag());
        assert_eq!(
            handshake.response.reason_code(),
            ConnectReasonCode::ClientIdentifierNotValid as u8
        );
        assert!(broker.registry().is_empty());
        assert!(hook.connected.lock().unwrap().is_empty());

        // 未被接受的连接断开时没有任何效果
        broker.disconnect(&conn, DisconnectKind::Abnormal).await;
        assert!(hook.disconnected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_credentials_are_reported() {
        let (broker, _, _) = broker();
        let (_, conn, _event_loop) = mock::connection();
        let mut connect = v4::Connect::new("c1", true);
        connect.login = Some(v4::Login {
            username: "user".into(),
            password: "bad".into(),
        });

        let handshake = broker.connect(&conn, ConnectMessage::V4(connect)).await;
        assert!(!handshake.accepted);
        assert_eq!(handshake.error, ErrorKind::BadCredentials);
        assert_eq!(
            handshake.response.reason_code(),
            v4::ConnectReturnCode::BadUserNamePassword as u8
        );
        assert!(broker.lookup("c1").is_none());
    }

    #[tokio::test]
    async fn v5_connack_gets_topic_alias_maximum() {
        let fanout = Arc::new(MockFanout::default());
        let cfg = Config::from_toml("[broker]\ntopic_alias_maximum = 10").unwrap();
        let broker = Broker::new(cfg, fanout);
        let (_, conn, _event_loop) = mock::connection();

        let handshake = broker
            .connect(&conn, ConnectMessage::V5(v5::Connect::new("", true)))
            .await;
        assert!(handshake.accepted);
        match handshake.response.packet() {
            ResponsePacket::V5(ack) => {
                let properties = ack.properties.as_ref().unwrap();
                assert_eq!(properties.topic_alias_max, Some(10));
                assert_eq!(
                    properties.assigned_client_identifier.as_deref(),
                    conn.client_id()
                );
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}
