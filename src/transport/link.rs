//! Network link monitoring
//!
//! Association with the access point is owned by the platform network
//! manager. The agent only needs to know whether the link is up before
//! attempting a fallback request.

use super::traits::LinkMonitor;
use crate::clock::Clock;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Reads `/sys/class/net/<iface>/operstate`
#[derive(Debug, Clone)]
pub struct SysfsLink {
    operstate_path: PathBuf,
}

impl SysfsLink {
    /// Monitor a named interface such as `wlan0`
    pub fn new(interface: &str) -> Self {
        Self::with_path(PathBuf::from("/sys/class/net").join(interface).join("operstate"))
    }

    /// Monitor an explicit operstate file
    pub fn with_path(operstate_path: impl Into<PathBuf>) -> Self {
        Self {
            operstate_path: operstate_path.into(),
        }
    }
}

#[async_trait]
impl LinkMonitor for SysfsLink {
    async fn is_link_up(&self) -> bool {
        match tokio::fs::read_to_string(&self.operstate_path).await {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!("[LINK] {}: {}", self.operstate_path.display(), e);
                false
            }
        }
    }
}

/// For hosts without a dedicated interface to watch
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeLinkUp;

#[async_trait]
impl LinkMonitor for AssumeLinkUp {
    async fn is_link_up(&self) -> bool {
        true
    }
}

/// Block until the link is up, polling at a fixed interval
///
/// Returns the number of polls that found the link down.
pub async fn wait_for_link(link: &dyn LinkMonitor, clock: &dyn Clock, poll: Duration) -> u32 {
    let mut waited = 0;
    while !link.is_link_up().await {
        if waited == 0 {
            info!("[LINK] Waiting for network link...");
        }
        waited += 1;
        clock.sleep(poll).await;
    }
    info!("[LINK] Network link up");
    waited
}
