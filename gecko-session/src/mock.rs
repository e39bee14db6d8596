//! 测试用的传输层和消息分发实现

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use crate::{
    network::{packet::v5, Connection, EventLoop, Link},
    Fanout,
};

/// 记录 stop 调用次数的连接
#[derive(Default)]
pub(crate) struct MockLink {
    stops: AtomicUsize,
}

impl MockLink {
    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Link for MockLink {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// 记录所有发布的消息
#[derive(Default)]
pub(crate) struct MockFanout {
    published: Mutex<Vec<(v5::Publish, String)>>,
}

impl MockFanout {
    pub(crate) fn published(&self) -> Vec<(v5::Publish, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fanout for MockFanout {
    async fn multicast(&self, publish: v5::Publish, origin: &str) {
        self.published
            .lock()
            .unwrap()
            .push((publish, origin.to_owned()));
    }
}

/// 新建一个已被传输层接受的连接
pub(crate) fn connection() -> (Arc<MockLink>, Arc<Connection>, EventLoop) {
    let link = Arc::new(MockLink::default());
    let (conn, event_loop) = Connection::new(link.clone());
    conn.start();
    (link, conn, event_loop)
}
