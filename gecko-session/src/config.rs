use tokio::{fs, io::AsyncReadExt};

use crate::error::Result;

const DEFAULT_TOPIC_ALIAS_MAXIMUM: u16 = 65535;
const DEFAULT_CLIENT_ID_PREFIX: &str = "gecko-";
const DEFAULT_SESSION_EXPIRE_INTERVAL: u64 = 3600;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: Broker,
    #[serde(default)]
    pub session: Session,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Broker {
    /// v5 CONNACK 默认携带的主题别名最大值
    #[serde(default = "default_topic_alias_maximum")]
    pub topic_alias_maximum: u16,
    /// 服务端分配的客户端 id 前缀
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

impl Default for Broker {
    fn default() -> Self {
        Self {
            topic_alias_maximum: DEFAULT_TOPIC_ALIAS_MAXIMUM,
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.into(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Session {
    /// 持久会话断开后保留的时长（秒）
    #[serde(default = "default_expire_interval")]
    pub expire_interval: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            expire_interval: DEFAULT_SESSION_EXPIRE_INTERVAL,
        }
    }
}

fn default_topic_alias_maximum() -> u16 {
    DEFAULT_TOPIC_ALIAS_MAXIMUM
}

fn default_client_id_prefix() -> String {
    DEFAULT_CLIENT_ID_PREFIX.into()
}

fn default_expire_interval() -> u64 {
    DEFAULT_SESSION_EXPIRE_INTERVAL
}

impl Config {
    pub async fn from_path(path: &str) -> Result<Self> {
        let mut file = fs::File::open(path).await?;
        let mut s = String::new();
        file.read_to_string(&mut s).await?;

        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(s)?)
    }
}
