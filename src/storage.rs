// Cross-tab storage adapter.
//
// The engine never assumes it is updating the visible tab: a long sequence
// run keeps writing after the user switches away. Writes targeting the
// active tab mutate live state directly; writes targeting any other tab land
// in a background snapshot that is adopted when that tab becomes active.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::cache::FrameCache;
use crate::error::EngineError;
use crate::models::schema::Graph;

struct TabState {
    name: String,
    graph: Graph,
    cache: FrameCache,
}

struct StoreInner {
    active_tab_id: String,
    /// State the UI currently renders.
    live: TabState,
    /// Snapshots for tabs that are not visible, keyed by tab id.
    background: HashMap<String, TabState>,
}

pub struct TabStore {
    inner: Mutex<StoreInner>,
}

impl TabStore {
    pub fn new(active_tab_id: impl Into<String>, tab_name: impl Into<String>, graph: Graph) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                active_tab_id: active_tab_id.into(),
                live: TabState {
                    name: tab_name.into(),
                    graph,
                    cache: FrameCache::new(),
                },
                background: HashMap::new(),
            }),
        }
    }

    pub fn active_tab_id(&self) -> String {
        self.lock().active_tab_id.clone()
    }

    pub fn tab_name(&self, tab_id: &str) -> Option<String> {
        let inner = self.lock();
        if inner.active_tab_id == tab_id {
            return Some(inner.live.name.clone());
        }
        inner.background.get(tab_id).map(|t| t.name.clone())
    }

    /// Register a non-visible tab with its graph snapshot.
    pub fn register_background_tab(
        &self,
        tab_id: impl Into<String>,
        tab_name: impl Into<String>,
        graph: Graph,
    ) {
        self.lock().background.insert(
            tab_id.into(),
            TabState {
                name: tab_name.into(),
                graph,
                cache: FrameCache::new(),
            },
        );
    }

    /// Make `tab_id` the visible tab, adopting its background snapshot. The
    /// previously visible tab is stashed as a background snapshot.
    pub fn activate_tab(&self, tab_id: &str) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.active_tab_id == tab_id {
            return Ok(());
        }
        let adopted = inner
            .background
            .remove(tab_id)
            .ok_or_else(|| EngineError::Validation(format!("Unknown tab '{}'", tab_id)))?;
        let previous_id = std::mem::replace(&mut inner.active_tab_id, tab_id.to_string());
        let previous = std::mem::replace(&mut inner.live, adopted);
        inner.background.insert(previous_id, previous);
        Ok(())
    }

    /// Apply `updater` to one node's value in whichever state holds the tab,
    /// optionally writing one full-size asset into that tab's cache in the
    /// same step.
    pub fn update_node(
        &self,
        tab_id: &str,
        node_id: &str,
        updater: impl FnOnce(&str) -> Result<String, EngineError>,
        cache_update: Option<(u32, String)>,
    ) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let tab = tab_mut(&mut inner, tab_id)?;
        let node = tab
            .graph
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| {
                EngineError::Validation(format!("Node '{}' not found in tab '{}'", node_id, tab_id))
            })?;
        node.value = updater(&node.value)?;
        if let Some((offset, data_url)) = cache_update {
            tab.cache.set_full_size_image(node_id, offset, data_url);
        }
        Ok(())
    }

    /// Write one full-size asset without touching the node value.
    pub fn write_cache(
        &self,
        tab_id: &str,
        node_id: &str,
        offset: u32,
        data_url: String,
    ) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let tab = tab_mut(&mut inner, tab_id)?;
        tab.cache.set_full_size_image(node_id, offset, data_url);
        Ok(())
    }

    pub fn full_size_image(&self, tab_id: &str, node_id: &str, offset: u32) -> Option<String> {
        let inner = self.lock();
        let tab = tab_ref(&inner, tab_id)?;
        tab.cache
            .get_full_size_image(node_id, offset)
            .map(str::to_string)
    }

    pub fn node_value(&self, tab_id: &str, node_id: &str) -> Option<String> {
        let inner = self.lock();
        let tab = tab_ref(&inner, tab_id)?;
        tab.graph
            .nodes
            .iter()
            .find(|n| n.id == node_id)
            .map(|n| n.value.clone())
    }

    pub fn graph_snapshot(&self, tab_id: &str) -> Option<Graph> {
        let inner = self.lock();
        tab_ref(&inner, tab_id).map(|t| t.graph.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("tab store poisoned")
    }
}

fn tab_mut<'a>(inner: &'a mut StoreInner, tab_id: &str) -> Result<&'a mut TabState, EngineError> {
    if inner.active_tab_id == tab_id {
        Ok(&mut inner.live)
    } else {
        inner
            .background
            .get_mut(tab_id)
            .ok_or_else(|| EngineError::Validation(format!("Unknown tab '{}'", tab_id)))
    }
}

fn tab_ref<'a>(inner: &'a StoreInner, tab_id: &str) -> Option<&'a TabState> {
    if inner.active_tab_id == tab_id {
        Some(&inner.live)
    } else {
        inner.background.get(tab_id)
    }
}

/// Cache writer scoped to one node, handed to processors as the side channel
/// for full-resolution outputs.
pub struct CacheSink<'a> {
    store: &'a TabStore,
    tab_id: String,
    node_id: String,
}

impl<'a> CacheSink<'a> {
    pub fn new(store: &'a TabStore, tab_id: &str, node_id: &str) -> Self {
        Self {
            store,
            tab_id: tab_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    pub fn save_full_size(&self, offset: u32, data_url: &str) -> Result<(), EngineError> {
        self.store
            .write_cache(&self.tab_id, &self.node_id, offset, data_url.to_string())
    }
}
