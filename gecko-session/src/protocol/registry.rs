use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use log::debug;

use crate::network::{Connection, ConnectionId};

/// admit 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// 注册表中没有该客户端
    Fresh,
    /// 替换了已有的条目
    /// persistent 表示旧条目是否保存着可以恢复的会话（clean session = false）
    Replaced { persistent: bool },
}

struct Inner {
    /// key = client_id
    sessions: HashMap<String, Arc<Connection>>,
    /// 已经断开的持久会话，等待超时移除 (client_id, connection_id, push_to_queue_time)
    ineffective_sessions: VecDeque<(String, ConnectionId, Instant)>,
}

/// 会话注册表：client_id -> 拥有该身份的连接
/// 同一个 client_id 任何时刻最多只有一个条目
/// 所有修改都在同一把锁内完成，锁内只做 map 操作
pub struct Registry {
    inner: Mutex<Inner>,
    /// 持久会话断开后保留的时长
    expire_interval: Duration,
}

impl Registry {
    pub fn new(expire_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                ineffective_sessions: VecDeque::new(),
            }),
            expire_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lookup(&self, client_id: &str) -> Option<Arc<Connection>> {
        self.lock().sessions.get(client_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把连接登记到 client_id 下
    ///
    /// * 没有旧条目：插入，返回 Fresh
    /// * 旧条目未处于 started：替换，不返回旧连接
    /// * 旧条目处于 started：替换，并返回旧连接
    ///
    /// 替换和取出旧连接是同一个原子操作。旧连接的关闭和遗嘱消息由调用方在锁外处理
    pub fn admit(
        &self,
        client_id: &str,
        conn: Arc<Connection>,
    ) -> (AdmitOutcome, Option<Arc<Connection>>) {
        let mut inner = self.lock();
        // 从待清理队列中移除当前会话
        inner
            .ineffective_sessions
            .retain(|(c, _, _)| c != client_id);
        self.purge_expired(&mut inner, Instant::now());

        match inner.sessions.insert(client_id.to_owned(), conn) {
            None => {
                debug!("registry: new session {}", client_id);
                (AdmitOutcome::Fresh, None)
            }
            Some(old) => {
                let outcome = AdmitOutcome::Replaced {
                    persistent: old.is_persistent(),
                };
                if old.is_started() {
                    debug!(
                        "registry: session {} taken from live connection {}",
                        client_id,
                        old.id()
                    );
                    (outcome, Some(old))
                } else {
                    debug!("registry: session {} replaced", client_id);
                    (outcome, None)
                }
            }
        }
    }

    /// 连接断开时调用
    /// 连接仍拥有注册表条目时：clean session 直接移除，持久会话放入待清理队列
    /// 返回连接是否仍拥有条目（被接管的连接返回 false）
    pub fn release(&self, conn: &Arc<Connection>) -> bool {
        let client_id = match conn.client_id() {
            Some(client_id) => client_id,
            None => return false,
        };

        let mut inner = self.lock();
        match inner.sessions.get(client_id) {
            Some(current) if Arc::ptr_eq(current, conn) => {}
            _ => return false,
        }

        if conn.is_persistent() {
            inner
                .ineffective_sessions
                .push_back((client_id.to_owned(), conn.id(), Instant::now()));
        } else {
            inner.sessions.remove(client_id);
            debug!("registry: clean session {} removed", client_id);
        }
        true
    }

    /// 清理超时的持久会话
    fn purge_expired(&self, inner: &mut Inner, now: Instant) {
        while let Some((client_id, id, ineffected_at)) = inner.ineffective_sessions.pop_front() {
            // 没到超时时间，退出
            if now.duration_since(ineffected_at) < self.expire_interval {
                inner
                    .ineffective_sessions
                    .push_front((client_id, id, ineffected_at));
                break;
            }
            // 超时的，删除（期间被新连接占用的条目保留）
            if matches!(inner.sessions.get(&client_id), Some(c) if c.id() == id) {
                inner.sessions.remove(&client_id);
                debug!("registry: persistent session {} expired", client_id);
            }
        }
    }
}
