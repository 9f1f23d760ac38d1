use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::models::signal::ScanSnapshot;

#[derive(Debug)]
pub struct ScanStateInner {
    /// `None` until the first scan completes
    pub latest: RwLock<Option<ScanSnapshot>>,
    pub broadcaster: broadcast::Sender<ScanSnapshot>,
}

pub type SharedScanState = Arc<ScanStateInner>;

pub fn new_scan_state() -> SharedScanState {
    let (broadcaster, _receiver) = broadcast::channel(16);
    Arc::new(ScanStateInner {
        latest: RwLock::new(None),
        broadcaster,
    })
}

impl ScanStateInner {
    /// Store the snapshot and notify stream subscribers
    pub async fn publish(&self, snapshot: ScanSnapshot) {
        *self.latest.write().await = Some(snapshot.clone());
        let _ = self.broadcaster.send(snapshot);
    }
}
