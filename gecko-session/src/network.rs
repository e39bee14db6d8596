//! 网络层
//! 连接实体和每个连接私有的有序任务队列，不包含任何协议相关逻辑

pub use conn::{Connection, ConnectionId, Link, State};
pub use queue::{EventLoop, EventQueue, Task};

mod conn;
pub mod packet;
mod queue;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Event queue closed")]
    QueueClosed,
}
