use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events pushed over the SSE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// A cycle finished; dashboards should refetch everything.
    CycleCompleted,
    /// Insight statuses changed outside a cycle.
    InsightsUpdated,
}

impl ServerEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerEvent::CycleCompleted => "cycle_completed",
            ServerEvent::InsightsUpdated => "insights_updated",
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    /// One cycle at a time: concurrent triggers race on this flag and the
    /// losers get 409.
    pub cycle_busy: Arc<AtomicBool>,
    pub event_tx: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub fn new(root: PathBuf) -> Self {
        let (tx, _) = broadcast::channel(64);
        let state = Self {
            root,
            cycle_busy: Arc::new(AtomicBool::new(false)),
            event_tx: tx.clone(),
        };

        // Watch .steward/insights.yaml mtime and broadcast when it changes.
        // This catches CLI-side resolves as well as server-side ones.
        // Guard: only spawn if inside a Tokio runtime (skipped in sync unit tests).
        if tokio::runtime::Handle::try_current().is_ok() {
            let insights_file = steward_core::paths::insights_path(&state.root);
            tokio::spawn(async move {
                let mut last_mtime = None::<std::time::SystemTime>;
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(800)).await;
                    if let Ok(meta) = tokio::fs::metadata(&insights_file).await {
                        if let Ok(mtime) = meta.modified() {
                            if last_mtime != Some(mtime) {
                                last_mtime = Some(mtime);
                                let _ = tx.send(ServerEvent::InsightsUpdated);
                            }
                        }
                    }
                }
            });
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_stores_root() {
        let state = AppState::new(std::path::PathBuf::from("/tmp/test"));
        assert_eq!(state.root, std::path::PathBuf::from("/tmp/test"));
        assert!(!state.cycle_busy.load(std::sync::atomic::Ordering::SeqCst));
    }
}
