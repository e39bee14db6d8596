use std::sync::Arc;

use log::debug;

use crate::{
    network::{
        self,
        packet::{v5, ConnectMessage, Will},
        EventQueue,
    },
    Fanout,
};

impl From<Will> for v5::Publish {
    fn from(will: Will) -> Self {
        v5::Publish::new(will.topic, will.payload, will.qos, will.retain)
    }
}

/// 遗嘱消息分发
/// 遗嘱消息由服务端发出，origin 为空字符串
#[derive(Clone)]
pub(crate) struct WillDispatcher {
    fanout: Arc<dyn Fanout>,
}

impl WillDispatcher {
    pub(crate) fn new(fanout: Arc<dyn Fanout>) -> Self {
        Self { fanout }
    }

    /// 把遗嘱消息的发布放入目标连接的事件队列
    /// 返回是否有遗嘱消息
    pub(crate) fn dispatch(
        &self,
        connect: &ConnectMessage,
        queue: &EventQueue,
    ) -> Result<bool, network::Error> {
        let publish: v5::Publish = match connect.will() {
            Some(will) => will.into(),
            None => return Ok(false),
        };

        debug!(
            "schedule will message of client {} on topic {}",
            connect.client_id(),
            publish.topic
        );
        let fanout = self.fanout.clone();
        queue.push(move || async move { fanout.multicast(publish, "").await })?;
        Ok(true)
    }

    /// 立即发布遗嘱消息
    pub(crate) async fn publish(&self, connect: &ConnectMessage) -> bool {
        match connect.will() {
            Some(will) => {
                debug!(
                    "publish will message of client {} on topic {}",
                    connect.client_id(),
                    will.topic
                );
                self.fanout.multicast(will.into(), "").await;
                true
            }
            None => false,
        }
    }
}
