use std::future::Future;

use futures::{future::BoxFuture, FutureExt};
use log::debug;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::Error;

/// 队列中的一个任务
pub type Task = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// 连接的事件队列，任务严格按照入队顺序执行
/// 其他连接对本连接的影响只能通过入队任务完成
#[derive(Clone)]
pub struct EventQueue {
    tx: UnboundedSender<Task>,
}

impl EventQueue {
    pub fn new() -> (Self, EventLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventLoop { rx })
    }

    /// 入队，不等待执行
    pub fn push<F, Fut>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: Task = Box::new(move || f().boxed());
        self.tx.send(task).map_err(|_| Error::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 事件队列的消费端，由传输层持有并驱动
pub struct EventLoop {
    rx: UnboundedReceiver<Task>,
}

impl EventLoop {
    /// 开启事件循环，所有发送端释放后退出
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task().await;
        }
        debug!("event loop exit");
    }

    /// 执行当前已入队的任务，返回执行的任务数
    pub async fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(task) = self.rx.try_recv() {
            task().await;
            count += 1;
        }
        count
    }
}
