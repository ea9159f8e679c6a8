pub mod http;
pub mod link;
pub mod traits;
pub mod websocket;

pub use http::HttpFallback;
pub use link::{wait_for_link, AssumeLinkUp, SysfsLink};
pub use traits::{DeliveryResult, FallbackPublisher, LinkMonitor, PersistentChannel};
