//! 3.1.1 协议版本报文

pub use connack::*;
pub use connect::*;

pub mod connack;
pub mod connect;
