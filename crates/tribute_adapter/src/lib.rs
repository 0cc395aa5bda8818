#![forbid(unsafe_code)]

pub mod config;
pub mod proxy;
pub mod server;

pub use config::{ConfigError, ProxyConfig};
pub use proxy::{ForwardingProxy, ProxyError, UpstreamReply};
pub use server::build_router;
