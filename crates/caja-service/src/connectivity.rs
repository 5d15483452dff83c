//! Online/offline flag checked before a sale is confirmed.
//!
//! The host application flips it from its own network monitoring; the
//! services only read it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Connectivity {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            if online {
                info!("Terminal back online");
            } else {
                warn!("Terminal went offline");
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn ensure_online(&self) -> ServiceResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ServiceError::NetworkOffline)
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::new(true)
    }
}
