use log::{info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::editor::commands::EditorCommand;
use crate::editor::state::EditorState;
use crate::error::{CoreError, Result};
use crate::logic::translate::{self, RecordRef, ReferenceValidation};
use crate::logic::AttributeChanges;
use crate::model::{Attribute, EditableRecord, Id, StableId};
use crate::store::{RecordListStore, ReferenceSource};

/// Read-only selector bundle handed to presentation code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView<R> {
    pub selected_id: Option<StableId>,
    pub original_record: Option<R>,
    pub editing_record: Option<R>,
    pub is_dirty: bool,
    pub is_saving: bool,
    pub error: Option<String>,
}

/// Current-record editor bound to the list store that owns its records.
///
/// The working copy only reaches the list store through [`RecordEditor::save_changes`].
/// When wired to a reference source, relationship fields may hold stable ids
/// of the related kind; they are translated to business keys on save.
pub struct RecordEditor<R: EditableRecord> {
    store: Arc<RecordListStore<R>>,
    references: Option<Arc<dyn ReferenceSource>>,
    state: RwLock<EditorState<R>>,
}

impl<R: EditableRecord> RecordEditor<R> {
    pub fn new(store: Arc<RecordListStore<R>>) -> Self {
        Self {
            store,
            references: None,
            state: RwLock::new(EditorState::default()),
        }
    }

    pub fn with_references(store: Arc<RecordListStore<R>>, references: Arc<dyn ReferenceSource>) -> Self {
        Self {
            store,
            references: Some(references),
            state: RwLock::new(EditorState::default()),
        }
    }

    pub fn store(&self) -> &Arc<RecordListStore<R>> {
        &self.store
    }

    fn refs(&self) -> Option<Vec<RecordRef>> {
        self.references.as_ref().map(|source| source.references())
    }

    /// Apply a synchronous command to the session.
    pub fn dispatch(&self, command: EditorCommand<R>) -> Result<()> {
        let refs = self.refs();
        self.state.write().apply(command, refs.as_deref())
    }

    pub fn select(&self, record: Option<R>) {
        self.state.write().select(record);
    }

    /// Select a record of the owning list store by stable id.
    pub fn select_by_id(&self, stable_id: StableId) -> Result<()> {
        let record = self
            .store
            .get(stable_id)
            .ok_or(CoreError::RecordNotFound(stable_id))?;
        self.select(Some(record));
        Ok(())
    }

    pub fn update_property(&self, path: &str, value: Value) -> Result<()> {
        self.dispatch(EditorCommand::update_property(path, value))
    }

    pub fn update_attribute_property(&self, attribute: StableId, field: &str, value: Value) -> Result<()> {
        self.dispatch(EditorCommand::update_attribute(attribute, field, value))
    }

    /// Append a sub-record and return its stable id.
    pub fn add_attribute(&self, attribute: Attribute) -> Result<StableId> {
        let refs = self.refs();
        self.state.write().add_attribute(attribute, refs.as_deref())
    }

    pub fn remove_attribute(&self, attribute: StableId) -> Result<()> {
        self.dispatch(EditorCommand::RemoveAttribute(attribute))
    }

    pub fn revert_attribute(&self, attribute: StableId) -> Result<()> {
        self.dispatch(EditorCommand::RevertAttribute(attribute))
    }

    pub fn reset_changes(&self) {
        self.state.write().reset_changes();
    }

    /// Persist the working copy through the list store.
    ///
    /// The response is applied only if the record is still selected and still
    /// in the list store; a record deleted mid-save is never brought back into
    /// the session.
    pub async fn save_changes(&self) -> Result<R> {
        let refs = self.refs();
        let ticket = self.state.write().begin_save(refs.as_deref())?;
        let pending = self.unacknowledged(ticket.payload.relationships().unwrap_or_default());
        if !pending.is_empty() {
            warn!(
                "Saving {} '{}' with references the backend has not acknowledged yet: {:?}",
                R::KIND,
                ticket.payload.business_key(),
                pending
            );
        }

        let result = self.store.save(ticket.payload.clone()).await;

        let mut state = self.state.write();
        if result.is_ok() && self.store.get(ticket.stable_id).is_none() {
            warn!(
                "{} {} was deleted while saving, closing the session",
                R::KIND,
                ticket.stable_id
            );
            state.abandon_save(&ticket);
            if state.selected_id == Some(ticket.stable_id) {
                state.select(None);
            }
            return result;
        }
        state.finish_save(ticket, result, refs.as_deref())
    }

    /// Re-fetch a record from the backend.
    ///
    /// If it is the selected record, both the snapshot and the working copy
    /// are replaced and sub-records keep their stable ids.
    pub async fn refresh(&self, key: &str) -> Result<R> {
        let fresh = self.store.refresh_one(key).await?;
        if self.state.write().apply_refresh(fresh.clone()) {
            info!("Refreshed selected {} '{}'", R::KIND, key);
        }
        Ok(fresh)
    }

    /// Delete the selected record from the list store and close the session.
    pub async fn delete_selected(&self) -> Result<()> {
        let stable_id = self.state.read().selected_id.ok_or(CoreError::NoSelection)?;
        match self.store.delete(stable_id).await {
            Ok(()) => {}
            // Never added to the store, so there is nothing to delete remotely.
            Err(CoreError::RecordNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let mut state = self.state.write();
        if state.selected_id == Some(stable_id) {
            state.select(None);
        }
        Ok(())
    }

    pub fn view(&self) -> EditorView<R> {
        let state = self.state.read();
        EditorView {
            selected_id: state.selected_id,
            original_record: state.original.clone(),
            editing_record: state.editing.clone(),
            is_dirty: state.is_dirty,
            is_saving: state.is_saving,
            error: state.error.clone(),
        }
    }

    pub fn selected_id(&self) -> Option<StableId> {
        self.state.read().selected_id
    }

    pub fn original(&self) -> Option<R> {
        self.state.read().original.clone()
    }

    pub fn editing(&self) -> Option<R> {
        self.state.read().editing.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().is_dirty
    }

    pub fn is_saving(&self) -> bool {
        self.state.read().is_saving
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn attribute_changes(&self) -> Option<AttributeChanges> {
        self.state.read().attribute_changes()
    }

    /// The working copy's relationship field in stable-id space, for
    /// selectors that display live identities of the related kind.
    pub fn relationship_view(&self) -> Option<Vec<Id>> {
        let state = self.state.read();
        let keys = state.editing.as_ref()?.relationships()?;
        match self.refs() {
            Some(refs) => Some(translate::to_stable_ids(keys, &refs)),
            None => Some(keys.to_vec()),
        }
    }

    /// Relationship targets of the working copy whose current key differs
    /// from the one the backend last acknowledged, such as a referenced
    /// record renamed but not saved yet.
    pub fn unacknowledged_references(&self) -> Vec<Id> {
        let refs = self.refs().unwrap_or_default();
        let keys = {
            let state = self.state.read();
            match state.editing.as_ref().and_then(|editing| editing.relationships()) {
                Some(keys) => translate::to_business_keys(keys, &refs),
                None => return Vec::new(),
            }
        };
        self.unacknowledged(&keys)
    }

    fn unacknowledged(&self, keys: &[Id]) -> Vec<Id> {
        let Some(acknowledged) = self
            .references
            .as_ref()
            .and_then(|source| source.acknowledged_keys())
        else {
            return Vec::new();
        };
        keys.iter()
            .filter(|key| !acknowledged.contains(key))
            .cloned()
            .collect()
    }

    /// Partition the working copy's relationship references into resolvable
    /// and unresolvable ones. `None` without a selection or reference source.
    pub fn validate_relationships(&self) -> Option<ReferenceValidation> {
        let refs = self.refs()?;
        let state = self.state.read();
        let editing = state.editing.as_ref()?;
        let keys = editing.relationships().unwrap_or_default();
        Some(translate::validate(keys, &refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeType, Entity, Identified, Module, RecordStatus};
    use crate::store::memory::{BackendCall, InMemoryBackend};
    use serde_json::json;

    struct Fixture {
        backend: Arc<InMemoryBackend<Entity>>,
        store: Arc<RecordListStore<Entity>>,
        modules: Arc<RecordListStore<Module>>,
        editor: RecordEditor<Entity>,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(InMemoryBackend::with_records(vec![
            Entity::new("vehicle", "Vehicle")
                .with_attribute(Attribute::new("speed", AttributeType::Float))
                .with_modules(["physics"]),
            Entity::new("slope", "Slope"),
        ]));
        let module_backend = Arc::new(InMemoryBackend::with_records(vec![
            Module::new("physics", "Physics"),
            Module::new("render", "Render"),
        ]));

        let store = Arc::new(RecordListStore::new(backend.clone()));
        let modules = Arc::new(RecordListStore::new(module_backend));
        store.load().await.unwrap();
        modules.load().await.unwrap();
        backend.clear_calls();

        let editor = RecordEditor::with_references(store.clone(), modules.clone());
        Fixture {
            backend,
            store,
            modules,
            editor,
        }
    }

    fn stable_id_of<R: EditableRecord>(store: &RecordListStore<R>, key: &str) -> StableId {
        store.find_by_business_key(key).unwrap().stable_id().unwrap()
    }

    #[tokio::test]
    async fn test_rename_and_save_scenario() {
        let f = fixture().await;
        let vehicle = stable_id_of(&f.store, "vehicle");

        f.editor.select_by_id(vehicle).unwrap();
        f.editor.update_property("name", json!("Car")).unwrap();
        assert!(f.editor.is_dirty());

        f.editor.reset_changes();
        assert_eq!(f.editor.editing().unwrap().base.name, "Vehicle");
        assert!(!f.editor.is_dirty());
        assert_eq!(f.editor.editing(), f.editor.original());

        f.editor.update_property("id", json!("car")).unwrap();
        let saved = f.editor.save_changes().await.unwrap();

        assert_eq!(
            f.backend.calls(),
            vec![BackendCall::Update {
                previous_key: "vehicle".to_string(),
                key: "car".to_string()
            }]
        );
        assert_eq!(saved.base.id, "car");
        assert_eq!(f.editor.selected_id(), Some(vehicle));
        assert_eq!(f.editor.editing().unwrap().base.id, "car");
        assert!(!f.editor.is_dirty());
        assert!(!f.editor.is_saving());
        assert_eq!(stable_id_of(&f.store, "car"), vehicle);
    }

    #[tokio::test]
    async fn test_editing_does_not_touch_the_list() {
        let f = fixture().await;
        let vehicle = stable_id_of(&f.store, "vehicle");
        f.editor.select_by_id(vehicle).unwrap();
        f.editor.update_property("name", json!("Car")).unwrap();

        assert_eq!(f.store.get(vehicle).unwrap().base.name, "Vehicle");
        assert!(!f.store.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_list_reload_keeps_edits() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        f.editor.update_property("description", json!("draft")).unwrap();

        f.store.load().await.unwrap();
        assert!(f.editor.is_dirty());
        assert_eq!(
            f.editor.editing().unwrap().base.description.as_deref(),
            Some("draft")
        );
    }

    #[tokio::test]
    async fn test_failed_create_never_reaches_the_list() {
        let f = fixture().await;
        f.editor.select(Some(Entity::new("tree", "Tree")));

        f.backend.fail_next("offline");
        assert!(f.editor.save_changes().await.is_err());
        f.editor.reset_changes();
        f.editor.select(None);

        assert_eq!(f.store.len(), 2);
        assert!(f.store.find_by_business_key("tree").is_none());
        assert!(!f.store.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_work() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        f.editor.update_property("name", json!("Car")).unwrap();

        f.backend.fail_next("offline");
        let err = f.editor.save_changes().await.unwrap_err();
        assert!(matches!(err, CoreError::Persistence { .. }));

        let view = f.editor.view();
        assert!(view.is_dirty);
        assert!(!view.is_saving);
        assert!(view.error.unwrap().contains("offline"));
        assert_eq!(view.editing_record.unwrap().base.name, "Car");
        assert_eq!(f.store.find_by_business_key("vehicle").unwrap().base.name, "Vehicle");
    }

    #[tokio::test]
    async fn test_validation_error_blocks_save() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        f.editor.update_property("id", json!("slope")).unwrap();

        let err = f.editor.save_changes().await.unwrap_err();
        assert!(err.is_validation());
        assert!(f.backend.calls().is_empty());
        assert!(f.editor.is_dirty());
    }

    #[tokio::test]
    async fn test_save_without_selection() {
        let f = fixture().await;
        assert!(matches!(
            f.editor.save_changes().await,
            Err(CoreError::NoSelection)
        ));
    }

    #[tokio::test]
    async fn test_relationships_saved_as_business_keys() {
        let f = fixture().await;
        let vehicle = stable_id_of(&f.store, "vehicle");
        let physics = stable_id_of(&f.modules, "physics");
        let render = stable_id_of(&f.modules, "render");
        f.editor.select_by_id(vehicle).unwrap();

        assert_eq!(f.editor.relationship_view(), Some(vec![physics.to_string()]));

        // A selector working in stable-id space writes ids back
        f.editor
            .update_property("modules", json!([physics.to_string()]))
            .unwrap();
        assert!(!f.editor.is_dirty());

        f.editor
            .update_property("modules", json!([physics.to_string(), render.to_string()]))
            .unwrap();
        assert!(f.editor.is_dirty());
        assert!(f.editor.validate_relationships().unwrap().is_clean());

        f.editor.save_changes().await.unwrap();
        let stored = f.backend.find("vehicle").unwrap();
        assert_eq!(
            stored.modules,
            Some(vec!["physics".to_string(), "render".to_string()])
        );
        assert!(!f.editor.is_dirty());
    }

    #[tokio::test]
    async fn test_unsaved_module_rename_resolves() {
        let f = fixture().await;
        let physics = stable_id_of(&f.modules, "physics");
        f.modules.update_field(physics, "id", json!("dynamics")).unwrap();

        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        let check = f.editor.validate_relationships().unwrap();
        assert_eq!(check.invalid, vec!["physics".to_string()]);

        f.editor
            .update_property("modules", json!([physics.to_string(), "ghost"]))
            .unwrap();
        let check = f.editor.validate_relationships().unwrap();
        assert_eq!(check.invalid, vec!["ghost".to_string()]);
        assert_eq!(f.editor.unacknowledged_references(), vec!["dynamics".to_string()]);

        f.editor.save_changes().await.unwrap();
        assert_eq!(
            f.backend.find("vehicle").unwrap().modules,
            Some(vec!["dynamics".to_string()])
        );
    }

    #[tokio::test]
    async fn test_new_record_is_created() {
        let f = fixture().await;
        let new_id = f.store.add_new(Entity::new("tree", "Tree"));
        f.editor.select_by_id(new_id).unwrap();
        f.editor
            .add_attribute(Attribute::new("height", AttributeType::Float))
            .unwrap();

        f.editor.save_changes().await.unwrap();
        assert_eq!(f.backend.calls(), vec![BackendCall::Create("tree".to_string())]);
        let saved = f.store.get(new_id).unwrap();
        assert_eq!(saved.meta().status, RecordStatus::Saved);
        assert_eq!(saved.attributes.len(), 1);
        assert_eq!(f.editor.editing().unwrap().meta().status, RecordStatus::Saved);
    }

    #[tokio::test]
    async fn test_attribute_ids_survive_save() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        let speed = f.editor.editing().unwrap().attributes[0].stable_id().unwrap();

        f.editor
            .update_attribute_property(speed, "description", json!("m/s"))
            .unwrap();
        assert_eq!(f.editor.attribute_changes().unwrap().modified, vec![speed]);

        f.editor.save_changes().await.unwrap();
        let editing = f.editor.editing().unwrap();
        assert_eq!(editing.attributes[0].stable_id(), Some(speed));
        assert_eq!(editing.attributes[0].meta.status, RecordStatus::Saved);
        assert!(f.editor.attribute_changes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_session() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        let speed = f.editor.editing().unwrap().attributes[0].stable_id();
        f.editor.update_property("name", json!("Car")).unwrap();

        // Server-side change, e.g. a derived attribute list
        let mut server = f.backend.find("vehicle").unwrap();
        server
            .attributes
            .push(Attribute::new("fuel", AttributeType::Float));
        f.backend.replace("vehicle", server).unwrap();

        let fresh = f.editor.refresh("vehicle").await.unwrap();
        assert_eq!(fresh.attributes.len(), 2);

        let editing = f.editor.editing().unwrap();
        assert_eq!(editing.base.name, "Vehicle");
        assert_eq!(editing.attributes[0].stable_id(), speed);
        assert!(editing.attributes[1].stable_id().is_some());
        assert!(!f.editor.is_dirty());
    }

    #[tokio::test]
    async fn test_refresh_of_other_record_keeps_session() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "vehicle")).unwrap();
        f.editor.update_property("name", json!("Car")).unwrap();

        f.editor.refresh("slope").await.unwrap();
        assert!(f.editor.is_dirty());
        assert_eq!(f.editor.editing().unwrap().base.id, "vehicle");
    }

    #[tokio::test]
    async fn test_delete_selected() {
        let f = fixture().await;
        let slope = stable_id_of(&f.store, "slope");
        f.editor.select_by_id(slope).unwrap();

        f.editor.delete_selected().await.unwrap();
        assert_eq!(f.backend.calls(), vec![BackendCall::Delete("slope".to_string())]);
        assert!(f.store.get(slope).is_none());
        assert_eq!(f.editor.view().selected_id, None);
    }

    #[tokio::test]
    async fn test_abandoned_save_releases_session() {
        let f = fixture().await;
        let new_id = f.store.add_new(Entity::new("tree", "Tree"));
        f.editor.select_by_id(new_id).unwrap();
        f.editor.update_property("name", json!("Oak")).unwrap();

        let ticket = f.editor.state.write().begin_save(None).unwrap();
        f.store.reset_changes(new_id).unwrap();
        f.editor.state.write().abandon_save(&ticket);
        assert!(!f.editor.is_saving());
        assert!(f.store.get(new_id).is_none());
    }

    #[tokio::test]
    async fn test_view_serializes_camel_case() {
        let f = fixture().await;
        f.editor.select_by_id(stable_id_of(&f.store, "slope")).unwrap();
        let view = serde_json::to_value(f.editor.view()).unwrap();
        assert_eq!(view["isDirty"], json!(false));
        assert_eq!(view["editingRecord"]["id"], json!("slope"));
        assert!(view["editingRecord"].get("stableId").is_none());
    }
}
