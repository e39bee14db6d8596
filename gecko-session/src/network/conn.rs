use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, OnceLock,
    },
};

use log::debug;

use super::{packet::ConnectMessage, Error, EventLoop, EventQueue};

/// 连接 id（服务端分配，进程内唯一）
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// 网络连接的生命周期
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initial = 0,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => State::Initial,
            1 => State::Starting,
            2 => State::Started,
            3 => State::Stopping,
            _ => State::Stopped,
        }
    }
}

/// 传输层连接，由传输层实现
pub trait Link: Send + Sync + 'static {
    /// 开始异步关闭连接，不等待关闭完成
    fn stop(&self);
}

/// 代表一个客户端连接（会话）
/// 由注册表和传输层共同持有
pub struct Connection {
    id: ConnectionId,
    /// 生命周期，使用 CAS 切换，不依赖注册表的锁
    state: AtomicU8,
    /// 最近一次被接受的 connect 报文，首次 connect 通过校验后写入
    connect: OnceLock<ConnectMessage>,
    /// 遗嘱消息尚未被发布或丢弃
    will_pending: AtomicBool,
    link: Arc<dyn Link>,
    queue: EventQueue,
}

impl Connection {
    pub fn new(link: Arc<dyn Link>) -> (Arc<Self>, EventLoop) {
        let (queue, event_loop) = EventQueue::new();
        let conn = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            state: AtomicU8::new(State::Initial as u8),
            connect: OnceLock::new(),
            will_pending: AtomicBool::new(false),
            link,
            queue,
        });
        (conn, event_loop)
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state.load(Ordering::Acquire).into()
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.state() == State::Started
    }

    /// 传输层接受连接后调用
    pub fn start(&self) -> bool {
        self.transition(State::Initial, State::Starting)
    }

    /// connect 报文处理入口调用
    /// 只有一个 connect 能够把连接切换到 started，已经 started（或正在关闭）时返回当前状态
    pub(crate) fn try_start(&self) -> Result<(), State> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                match State::from(s) {
                    State::Initial | State::Starting => Some(State::Started as u8),
                    _ => None,
                }
            })
            .map(|_| ())
            .map_err(State::from)
    }

    fn transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 关闭连接，只通知传输层开始关闭，不等待
    /// 重复调用只生效一次
    pub fn stop(&self) -> bool {
        let stopped = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                match State::from(s) {
                    State::Stopping | State::Stopped => None,
                    _ => Some(State::Stopping as u8),
                }
            })
            .is_ok();

        if stopped {
            debug!("stop connection {}", self.id);
            self.link.stop();
        }
        stopped
    }

    /// 传输层完成关闭后调用
    pub fn mark_stopped(&self) {
        self.state.store(State::Stopped as u8, Ordering::Release);
    }

    /// 客户端 id，connect 被接受前为 None
    pub fn client_id(&self) -> Option<&str> {
        self.connect.get().map(|c| c.client_id())
    }

    pub fn connect_message(&self) -> Option<&ConnectMessage> {
        self.connect.get()
    }

    /// 是否为持久会话（clean session = false）
    pub fn is_persistent(&self) -> bool {
        self.connect
            .get()
            .map(|c| !c.clean_session())
            .unwrap_or(false)
    }

    /// 保存通过校验的 connect 报文，只能写入一次
    pub(crate) fn bind(&self, connect: ConnectMessage) -> bool {
        let has_will = connect.will().is_some();
        if self.connect.set(connect).is_err() {
            return false;
        }
        self.will_pending.store(has_will, Ordering::Release);
        true
    }

    /// 取走遗嘱消息的处理权
    /// 接管和断开都会调用，只有一方拿到 true，由它负责发布或丢弃遗嘱
    pub(crate) fn take_will(&self) -> bool {
        self.will_pending.swap(false, Ordering::AcqRel)
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// 在本连接的事件队列上执行一个任务
    pub fn push_task<F, Fut>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.queue.push(f)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("client_id", &self.client_id())
            .finish()
    }
}
