//! The per-user event loop around a [`QuadView`].
//!
//! All scene mutation happens on the task that drives the session. Item
//! loads are spawned: they wait out the load debounce, fetch and decode on
//! the blocking pool, and hand their outcome back through a channel that
//! [`Session::process_next`] drains. Gesture flushes come back the same way
//! from the keyed [`Debouncer`].

use crate::asset_store::{AssetItem, AssetStore, DataId};
use crate::config::ViewerConfig;
use crate::debounce::Debouncer;
use crate::enums::Orientation;
use crate::loader::{DecoderRegistry, LoadError, LoadedData, load_item};
use crate::presets::PresetCatalog;
use crate::quad_view::{FlushKey, FlushRequest, Gesture, QuadView};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use web_time::Instant;

type LoadOutcome = (DataId, u64, Result<LoadedData, LoadError>);

/// What a call to [`Session::process_next`] handled
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Loaded(DataId),
    LoadFailed { id: DataId, message: String },
    Flushed(FlushKey),
    /// A superseded timer or the outcome of a load nobody waits for anymore
    Stale,
}

pub struct Session {
    scene: QuadView,
    store: Arc<dyn AssetStore>,
    decoders: Arc<DecoderRegistry>,
    config: ViewerConfig,
    displayed: Vec<DataId>,
    last_toggle: HashMap<DataId, Instant>,
    next_load: u64,
    loads: HashMap<DataId, (u64, JoinHandle<()>)>,
    load_tx: UnboundedSender<LoadOutcome>,
    load_rx: UnboundedReceiver<LoadOutcome>,
    debouncer: Debouncer<FlushKey>,
    flush_rx: UnboundedReceiver<(FlushKey, u64)>,
}

impl Session {
    pub fn new(
        presets: Arc<PresetCatalog>,
        store: Arc<dyn AssetStore>,
        decoders: Arc<DecoderRegistry>,
        config: ViewerConfig,
    ) -> Self {
        let scene = QuadView::new(presets, config.scene_settings());
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        let (debouncer, flush_rx) = Debouncer::new(config.flush_debounce());
        Self {
            scene,
            store,
            decoders,
            config,
            displayed: Vec::new(),
            last_toggle: HashMap::new(),
            next_load: 0,
            loads: HashMap::new(),
            load_tx,
            load_rx,
            debouncer,
            flush_rx,
        }
    }

    pub fn scene(&self) -> &QuadView {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut QuadView {
        &mut self.scene
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Items currently selected, in selection order
    pub fn displayed(&self) -> &[DataId] {
        &self.displayed
    }

    pub fn is_loading(&self, id: &DataId) -> bool {
        self.loads.contains_key(id)
    }

    /// Nothing loading and no flush pending
    pub fn is_idle(&self) -> bool {
        self.loads.is_empty() && self.debouncer.is_idle()
    }

    /// Selects `item`, or deselects it if it is displayed. Toggles of the
    /// same item closer together than the selection guard are ignored.
    pub fn toggle_item(&mut self, item: &AssetItem) -> bool {
        let now = Instant::now();
        let guard = self.config.selection_guard();
        self.last_toggle
            .retain(|_, last| now.duration_since(*last) < guard);
        if self.last_toggle.contains_key(&item.id) {
            debug!("Ignoring repeated toggle of {}", item.id);
            return false;
        }
        self.last_toggle.insert(item.id.clone(), now);
        info!("Toggling {}", item.id);

        if self.displayed.contains(&item.id) {
            self.deselect_item(&item.id)
        } else {
            self.select_item(item)
        }
    }

    /// Adds `item` to the scene and spawns its load.
    pub fn select_item(&mut self, item: &AssetItem) -> bool {
        if !self.scene.select(item) {
            return false;
        }
        self.displayed.push(item.id.clone());

        self.next_load += 1;
        let generation = self.next_load;
        let store = self.store.clone();
        let decoders = self.decoders.clone();
        let tx = self.load_tx.clone();
        let wait = self.config.load_debounce();
        let item = item.clone();
        let id = item.id.clone();
        debug!("Creating load task for {}", id);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let id = item.id.clone();
            let result =
                tokio::task::spawn_blocking(move || load_item(store.as_ref(), &decoders, &item))
                    .await
                    .unwrap_or_else(|e| Err(LoadError::Task(e.to_string())));
            // The session may be gone by now.
            let _ = tx.send((id, generation, result));
        });
        self.loads.insert(id, (generation, handle));
        true
    }

    /// Removes `id` from the scene, abandoning its load if still running.
    pub fn deselect_item(&mut self, id: &DataId) -> bool {
        if let Some((_, handle)) = self.loads.remove(id) {
            handle.abort();
        }
        let was_displayed = self.displayed.contains(id);
        self.displayed.retain(|d| d != id);
        self.scene.remove(id) || was_displayed
    }

    pub fn clear(&mut self) {
        for (_, (_, handle)) in self.loads.drain() {
            handle.abort();
        }
        self.debouncer.cancel(&FlushKey::Cursor);
        self.debouncer.cancel(&FlushKey::WindowLevel);
        self.displayed.clear();
        self.last_toggle.clear();
        self.scene.clear();
    }

    /// Forwards a gesture and arms or drops its flush timer.
    pub fn gesture(&mut self, orientation: Orientation, gesture: Gesture) -> FlushRequest {
        let request = self.scene.gesture(orientation, gesture);
        match request {
            FlushRequest::Debounce(key) => self.debouncer.schedule(key),
            FlushRequest::Flushed(key) => {
                self.debouncer.cancel(&key);
            }
            FlushRequest::None => {}
        }
        request
    }

    pub fn set_slice(&mut self, orientation: Orientation, index: usize) -> bool {
        self.scene.set_slice(orientation, index)
    }

    /// Waits for the next load outcome or fired flush timer and applies it.
    /// Returns `None` right away when nothing is loading and no flush is
    /// pending.
    pub async fn process_next(&mut self) -> Option<SessionEvent> {
        if self.is_idle() {
            return None;
        }
        let event = tokio::select! {
            Some((id, generation, result)) = self.load_rx.recv() => {
                self.apply_load(id, generation, result)
            }
            Some((key, generation)) = self.flush_rx.recv() => {
                if self.debouncer.accept(&key, generation) {
                    self.scene.flush(key);
                    SessionEvent::Flushed(key)
                } else {
                    SessionEvent::Stale
                }
            }
            else => SessionEvent::Stale,
        };
        Some(event)
    }

    /// Processes events until nothing is loading and no flush is pending.
    pub async fn run_until_idle(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.process_next().await {
            events.push(event);
        }
        events
    }

    fn apply_load(
        &mut self,
        id: DataId,
        generation: u64,
        result: Result<LoadedData, LoadError>,
    ) -> SessionEvent {
        match self.loads.get(&id) {
            Some((current, _)) if *current == generation => {
                self.loads.remove(&id);
            }
            _ => {
                debug!("Dropping stale load of {}", id);
                return SessionEvent::Stale;
            }
        }

        match result {
            Ok(data) => {
                self.scene.complete_load(&id, Ok(data));
                SessionEvent::Loaded(id)
            }
            Err(e) => {
                warn!("Deselecting {} after failed load", id);
                let message = e.to_string();
                self.displayed.retain(|d| d != &id);
                self.scene.complete_load(&id, Err(e));
                SessionEvent::LoadFailed { id, message }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.loads.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::LocalAssetStore;
    use tempfile::tempdir;

    fn session(root: &std::path::Path, selection_guard_ms: u64) -> Session {
        let mut config = ViewerConfig::default();
        config.loading.selection_guard_ms = selection_guard_ms;
        Session::new(
            Arc::new(PresetCatalog::builtin().unwrap()),
            Arc::new(LocalAssetStore::new(root)),
            Arc::new(DecoderRegistry::default()),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_toggle_guards_are_dropped() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path(), 0);
        for id in ["a", "b", "c"] {
            session.toggle_item(&AssetItem::new(id, id));
        }
        assert_eq!(session.last_toggle.len(), 1);
        assert!(session.last_toggle.contains_key(&DataId::from("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_forgets_toggle_guards() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path(), 60_000);
        session.toggle_item(&AssetItem::new("a", "a"));
        session.toggle_item(&AssetItem::new("b", "b"));
        assert_eq!(session.last_toggle.len(), 2);
        session.clear();
        assert!(session.last_toggle.is_empty());
    }
}
