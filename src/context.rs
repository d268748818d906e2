use log::info;
use std::sync::Arc;

use crate::api::routes::ServerState;
use crate::config::BackendConfig;
use crate::editor::RecordEditor;
use crate::error::Result;
use crate::model::{Behavior, Entity, Module};
use crate::store::{HttpBackend, RecordBackend, RecordListStore};

/// Backend endpoints for every record kind.
pub struct Backends {
    pub entities: Arc<dyn RecordBackend<Entity>>,
    pub modules: Arc<dyn RecordBackend<Module>>,
    pub behaviors: Arc<dyn RecordBackend<Behavior>>,
}

impl Backends {
    /// Talk to the collections of an in-process reference server directly.
    pub fn in_memory(state: &ServerState) -> Self {
        Self {
            entities: state.entities.clone(),
            modules: state.modules.clone(),
            behaviors: state.behaviors.clone(),
        }
    }

    pub fn http(config: &BackendConfig) -> anyhow::Result<Self> {
        Ok(Self {
            entities: Arc::new(HttpBackend::<Entity>::new(config)?),
            modules: Arc::new(HttpBackend::<Module>::new(config)?),
            behaviors: Arc::new(HttpBackend::<Behavior>::new(config)?),
        })
    }
}

/// Owns one list store and one current-record editor per record kind.
///
/// Every editor resolves its relationship field against the module store.
pub struct AppContext {
    pub entities: Arc<RecordListStore<Entity>>,
    pub modules: Arc<RecordListStore<Module>>,
    pub behaviors: Arc<RecordListStore<Behavior>>,
    pub entity_editor: RecordEditor<Entity>,
    pub module_editor: RecordEditor<Module>,
    pub behavior_editor: RecordEditor<Behavior>,
}

impl AppContext {
    pub fn new(backends: Backends) -> Self {
        let entities = Arc::new(RecordListStore::new(backends.entities));
        let modules = Arc::new(RecordListStore::new(backends.modules));
        let behaviors = Arc::new(RecordListStore::new(backends.behaviors));

        Self {
            entity_editor: RecordEditor::with_references(entities.clone(), modules.clone()),
            module_editor: RecordEditor::with_references(modules.clone(), modules.clone()),
            behavior_editor: RecordEditor::with_references(behaviors.clone(), modules.clone()),
            entities,
            modules,
            behaviors,
        }
    }

    /// Load every collection. Fails with the first load error.
    pub async fn init(&self) -> Result<()> {
        tokio::try_join!(self.modules.load(), self.entities.load(), self.behaviors.load())?;
        info!(
            "Context ready: {} entities, {} modules, {} behaviors",
            self.entities.len(),
            self.modules.len(),
            self.behaviors.len()
        );
        Ok(())
    }

    /// Close every editing session and empty the stores.
    pub fn dispose(&self) {
        self.entity_editor.select(None);
        self.module_editor.select(None);
        self.behavior_editor.select(None);
        self.entities.clear();
        self.modules.clear();
        self.behaviors.clear();
        info!("Context disposed");
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.entities.has_unsaved_changes()
            || self.modules.has_unsaved_changes()
            || self.behaviors.has_unsaved_changes()
            || self.entity_editor.is_dirty()
            || self.module_editor.is_dirty()
            || self.behavior_editor.is_dirty()
    }
}
