use log::{debug, warn};
use serde_json::Value;

use crate::editor::commands::EditorCommand;
use crate::error::{CoreError, Result};
use crate::logic::identity::{assign, assign_all, restamp_children};
use crate::logic::translate::{self, RecordRef};
use crate::logic::{attribute_changes, canonical, is_dirty, AttributeChanges};
use crate::model::{Attribute, AttributeField, EditableRecord, RecordStatus, StableId};

/// Focus-editing session for a single record.
///
/// `original` is the snapshot taken at selection time and is only replaced by
/// a successful save or a refresh. Every mutation goes to `editing` and is
/// followed by a dirty recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState<R> {
    pub selected_id: Option<StableId>,
    pub original: Option<R>,
    pub editing: Option<R>,
    pub is_dirty: bool,
    pub is_saving: bool,
    pub error: Option<String>,
}

impl<R> Default for EditorState<R> {
    fn default() -> Self {
        Self {
            selected_id: None,
            original: None,
            editing: None,
            is_dirty: false,
            is_saving: false,
            error: None,
        }
    }
}

/// An in-flight save, handed out by [`EditorState::begin_save`].
#[derive(Debug, Clone)]
pub struct SaveTicket<R> {
    pub stable_id: StableId,
    /// The working copy as it was when the save started.
    pub submitted: R,
    /// What is sent to the store: relationships translated to business keys.
    pub payload: R,
}

impl<R: EditableRecord> EditorState<R> {
    /// Apply one command. `refs` are the identity pairs of the relationship
    /// target collection, used to compare relationship fields.
    pub fn apply(&mut self, command: EditorCommand<R>, refs: Option<&[RecordRef]>) -> Result<()> {
        debug!("{} editor: {}", R::KIND, command.name());
        match command {
            EditorCommand::Select(record) => {
                self.select(record);
                Ok(())
            }
            EditorCommand::UpdateProperty { path, value } => self.update_property(&path, value, refs),
            EditorCommand::UpdateAttributeProperty {
                attribute,
                field,
                value,
            } => self.update_attribute_property(attribute, &field, value, refs),
            EditorCommand::AddAttribute(attribute) => self.add_attribute(attribute, refs).map(|_| ()),
            EditorCommand::RemoveAttribute(attribute) => self.remove_attribute(attribute, refs),
            EditorCommand::RevertAttribute(attribute) => self.revert_attribute(attribute, refs),
            EditorCommand::ResetChanges => {
                self.reset_changes();
                Ok(())
            }
        }
    }

    /// Focus `record`. Re-selecting the current record keeps the edits.
    pub fn select(&mut self, record: Option<R>) {
        let Some(mut record) = record else {
            *self = Self::default();
            return;
        };

        let stable_id = assign_all(&mut record);
        if self.selected_id == Some(stable_id) {
            return;
        }

        *self = Self {
            selected_id: Some(stable_id),
            original: Some(record.clone()),
            editing: Some(record),
            ..Self::default()
        };
    }

    fn editing_mut(&mut self) -> Result<&mut R> {
        self.editing.as_mut().ok_or(CoreError::NoSelection)
    }

    pub fn update_property(&mut self, path: &str, value: Value, refs: Option<&[RecordRef]>) -> Result<()> {
        let editing = self.editing_mut()?;
        crate::model::apply_property(editing, path, value)?;
        editing.refresh_derived();
        self.recompute(refs);
        Ok(())
    }

    pub fn update_attribute_property(
        &mut self,
        attribute: StableId,
        field: &str,
        value: Value,
        refs: Option<&[RecordRef]>,
    ) -> Result<()> {
        let field: AttributeField = field.parse()?;
        let editing = self.editing_mut()?;
        let prefix = editing.attribute_prefix().map(str::to_string);
        let child = editing
            .find_child_mut(attribute)
            .ok_or(CoreError::AttributeNotFound(attribute))?;

        child.apply(field, value, prefix.as_deref())?;
        if child.meta.status == RecordStatus::Saved {
            child.meta.status = RecordStatus::Dirty;
        }
        self.recompute(refs);
        Ok(())
    }

    /// Append a sub-record, namespaced under the record's prefix if it has one.
    pub fn add_attribute(&mut self, mut attribute: Attribute, refs: Option<&[RecordRef]>) -> Result<StableId> {
        let editing = self.editing_mut()?;
        let stable_id = assign(&mut attribute);
        attribute.meta.status = RecordStatus::New;
        attribute.adopt_prefix(editing.attribute_prefix());
        editing.children_mut().push(attribute);
        self.recompute(refs);
        Ok(stable_id)
    }

    /// Remove a sub-record. An unknown id is logged and otherwise ignored.
    pub fn remove_attribute(&mut self, attribute: StableId, refs: Option<&[RecordRef]>) -> Result<()> {
        let editing = self.editing_mut()?;
        let position = editing
            .children()
            .iter()
            .position(|child| child.meta.stable_id == Some(attribute));
        match position {
            Some(position) => {
                editing.children_mut().remove(position);
                self.recompute(refs);
            }
            None => warn!("{} editor: no attribute {} to remove", R::KIND, attribute),
        }
        Ok(())
    }

    /// Put one sub-record back the way the snapshot has it. A sub-record added
    /// in this session is removed.
    pub fn revert_attribute(&mut self, attribute: StableId, refs: Option<&[RecordRef]>) -> Result<()> {
        let saved = self
            .original
            .as_ref()
            .and_then(|original| original.find_child(attribute))
            .cloned();
        let editing = self.editing_mut()?;
        let position = editing
            .children()
            .iter()
            .position(|child| child.meta.stable_id == Some(attribute));

        match (saved, position) {
            (Some(saved), Some(position)) => editing.children_mut()[position] = saved,
            (Some(saved), None) => editing.children_mut().push(saved),
            (None, Some(position)) => {
                editing.children_mut().remove(position);
            }
            (None, None) => {
                warn!("{} editor: no attribute {} to revert", R::KIND, attribute);
                return Ok(());
            }
        }
        self.recompute(refs);
        Ok(())
    }

    pub fn reset_changes(&mut self) {
        if self.original.is_some() {
            self.editing = self.original.clone();
        }
        self.is_dirty = false;
    }

    /// Recompute `is_dirty`, and keep the working copy's status in line with it.
    pub fn recompute(&mut self, refs: Option<&[RecordRef]>) {
        let dirty = match (&self.original, &self.editing) {
            (Some(original), Some(editing)) => is_dirty(original, editing, refs),
            _ => false,
        };
        self.is_dirty = dirty;

        if let Some(editing) = self.editing.as_mut() {
            if !editing.meta().is_new() {
                editing.meta_mut().status = if dirty {
                    RecordStatus::Dirty
                } else {
                    RecordStatus::Saved
                };
            }
        }
    }

    pub fn attribute_changes(&self) -> Option<AttributeChanges> {
        match (&self.original, &self.editing) {
            (Some(original), Some(editing)) => Some(attribute_changes(original, editing)),
            _ => None,
        }
    }

    /// Start a save: mark the session as saving and build the payload.
    ///
    /// Relationship references are translated to business keys here, so the
    /// store never sees stable ids. Unresolvable references are logged and
    /// dropped from the payload.
    pub fn begin_save(&mut self, refs: Option<&[RecordRef]>) -> Result<SaveTicket<R>> {
        if self.is_saving {
            return Err(CoreError::SaveInProgress);
        }
        let (Some(stable_id), Some(editing)) = (self.selected_id, self.editing.as_ref()) else {
            return Err(CoreError::NoSelection);
        };

        let submitted = editing.clone();
        let mut payload = editing.clone();
        if let (Some(refs), Some(keys)) = (refs, editing.relationships()) {
            let check = translate::validate(keys, refs);
            if !check.is_clean() {
                warn!(
                    "{} '{}' references unknown {} records: {:?}",
                    R::KIND,
                    editing.business_key(),
                    R::KIND.relationship_target(),
                    check.invalid
                );
            }
            *payload.relationships_mut() = Some(translate::to_business_keys(keys, refs));
        }

        self.is_saving = true;
        self.error = None;
        Ok(SaveTicket {
            stable_id,
            submitted,
            payload,
        })
    }

    /// Complete a save started with [`EditorState::begin_save`].
    ///
    /// A response for a record that is no longer selected is ignored. On
    /// success the saved form becomes the snapshot; the working copy is replaced
    /// too unless it was edited while the save was in flight. On failure the
    /// working copy is left alone and the error is kept.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket<R>,
        result: Result<R>,
        refs: Option<&[RecordRef]>,
    ) -> Result<R> {
        if self.selected_id != Some(ticket.stable_id) {
            warn!(
                "{} editor: ignoring save response for {}, it is no longer selected",
                R::KIND,
                ticket.stable_id
            );
            return result;
        }
        self.is_saving = false;

        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        let untouched = self
            .editing
            .as_ref()
            .map_or(true, |editing| canonical(editing, refs) == canonical(&ticket.submitted, refs));
        if untouched {
            self.editing = Some(saved.clone());
        } else if let Some(editing) = self.editing.as_mut() {
            debug!("{} editor: keeping edits made during save", R::KIND);
            editing.meta_mut().status = RecordStatus::Dirty;
            restamp_children(saved.children(), editing.children_mut());
        }
        self.original = Some(saved.clone());
        self.error = None;
        self.recompute(refs);
        Ok(saved)
    }

    /// Drop an in-flight save without touching the session's records.
    pub fn abandon_save(&mut self, ticket: &SaveTicket<R>) {
        if self.selected_id == Some(ticket.stable_id) {
            self.is_saving = false;
        }
    }

    /// Replace the session with a freshly fetched form of the selected record.
    ///
    /// Sub-records keep the stable ids of the working copy's sub-records with
    /// the same business key. Returns false, leaving the session alone, when
    /// `fresh` is not the selected record.
    pub fn apply_refresh(&mut self, mut fresh: R) -> bool {
        if fresh.stable_id().is_none() || fresh.stable_id() != self.selected_id {
            debug!("{} editor: refreshed record is not selected", R::KIND);
            return false;
        }

        if let Some(editing) = self.editing.as_ref() {
            let known: Vec<Attribute> = fresh.children().to_vec();
            for child in fresh.children_mut() {
                child.meta.stable_id = None;
            }
            restamp_children(editing.children(), fresh.children_mut());
            restamp_children(&known, fresh.children_mut());
        }
        assign_all(&mut fresh);

        self.original = Some(fresh.clone());
        self.editing = Some(fresh);
        self.is_dirty = false;
        self.error = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeType, Entity, Identified, Module};
    use serde_json::json;

    fn vehicle() -> Entity {
        let mut entity = Entity::new("vehicle", "Vehicle")
            .with_attribute(Attribute::new("speed", AttributeType::Float))
            .with_modules(["physics"]);
        entity.base.meta.status = RecordStatus::Saved;
        entity.attributes[0].meta.status = RecordStatus::Saved;
        assign_all(&mut entity);
        entity
    }

    fn selected(record: Entity) -> EditorState<Entity> {
        let mut state = EditorState::default();
        state.select(Some(record));
        state
    }

    #[test]
    fn test_select_clones_into_original_and_editing() {
        let record = vehicle();
        let state = selected(record.clone());

        assert_eq!(state.selected_id, record.stable_id());
        assert_eq!(state.original.as_ref(), Some(&record));
        assert_eq!(state.editing.as_ref(), Some(&record));
        assert!(!state.is_dirty);
    }

    #[test]
    fn test_reselect_keeps_edits() {
        let record = vehicle();
        let mut state = selected(record.clone());
        state.update_property("name", json!("Car"), None).unwrap();

        state.select(Some(record));
        assert!(state.is_dirty);
        assert_eq!(state.editing.as_ref().unwrap().base.name, "Car");
    }

    #[test]
    fn test_select_none_clears() {
        let mut state = selected(vehicle());
        state.select(None);
        assert_eq!(state, EditorState::default());
    }

    #[test]
    fn test_dirty_symmetry() {
        let original = vehicle();
        let mut state = selected(original.clone());

        state.update_property("description", json!("Moves things"), None).unwrap();
        assert!(state.is_dirty);
        assert_eq!(state.original.as_ref(), Some(&original));
        assert_eq!(state.editing.as_ref().unwrap().meta().status, RecordStatus::Dirty);

        state.reset_changes();
        assert!(!state.is_dirty);
        assert_eq!(state.editing, state.original);
    }

    #[test]
    fn test_edit_back_to_original_is_clean() {
        let mut state = selected(vehicle());
        state.update_property("name", json!("Car"), None).unwrap();
        state.update_property("name", json!("Vehicle"), None).unwrap();
        assert!(!state.is_dirty);
        assert_eq!(state.editing.as_ref().unwrap().meta().status, RecordStatus::Saved);
    }

    #[test]
    fn test_failed_mutation_leaves_state() {
        let mut state = selected(vehicle());
        let before = state.clone();
        assert!(state.update_property("name", json!(1), None).is_err());
        assert_eq!(state, before);

        let ghost = StableId::generate();
        assert!(matches!(
            state.update_attribute_property(ghost, "description", json!("x"), None),
            Err(CoreError::AttributeNotFound(_))
        ));
        assert!(matches!(
            state.update_attribute_property(ghost, "colour", json!("x"), None),
            Err(CoreError::UnknownField(_))
        ));
    }

    #[test]
    fn test_mutations_without_selection() {
        let mut state: EditorState<Entity> = EditorState::default();
        assert!(matches!(
            state.update_property("name", json!("x"), None),
            Err(CoreError::NoSelection)
        ));
        assert!(matches!(state.begin_save(None), Err(CoreError::NoSelection)));
    }

    #[test]
    fn test_attribute_edit_marks_sub_record_dirty() {
        let mut state = selected(vehicle());
        let speed = state.editing.as_ref().unwrap().attributes[0].meta.stable_id.unwrap();

        state
            .update_attribute_property(speed, "default", json!(12.5), None)
            .unwrap();
        let attr = &state.editing.as_ref().unwrap().attributes[0];
        assert_eq!(attr.default, Some(json!(12.5)));
        assert_eq!(attr.meta.status, RecordStatus::Dirty);
        assert!(state.is_dirty);
        assert_eq!(state.attribute_changes().unwrap().modified, vec![speed]);
    }

    #[test]
    fn test_add_and_remove_attribute() {
        let mut state = selected(vehicle());
        let added = state
            .add_attribute(Attribute::new("fuel", AttributeType::Float), None)
            .unwrap();
        assert!(state.is_dirty);
        let attr = state.editing.as_ref().unwrap().find_child(added).unwrap();
        assert_eq!(attr.meta.status, RecordStatus::New);

        state.remove_attribute(added, None).unwrap();
        assert!(!state.is_dirty);

        // Removing twice is a no-op
        state.remove_attribute(added, None).unwrap();
        assert_eq!(state.editing.as_ref().unwrap().attributes.len(), 1);
    }

    #[test]
    fn test_module_attribute_gets_namespaced() {
        let mut module = Module::new("physics", "Physics");
        assign_all(&mut module);
        let mut state = EditorState::default();
        state.select(Some(module));

        let id = state
            .add_attribute(Attribute::new("mass", AttributeType::Float), None)
            .unwrap();
        let attr = state.editing.as_ref().unwrap().find_child(id).unwrap();
        assert_eq!(attr.id, "physics/mass");
        assert_eq!(attr.display_id, "mass");

        state
            .update_attribute_property(id, "displayId", json!("weight"), None)
            .unwrap();
        assert_eq!(state.editing.as_ref().unwrap().attributes[0].id, "physics/weight");
    }

    #[test]
    fn test_module_attribute_id_edit_stays_namespaced() {
        let mut module = Module::new("physics", "Physics")
            .with_attribute(Attribute::new("mass", AttributeType::Float));
        assign_all(&mut module);
        let mut state = EditorState::default();
        state.select(Some(module));
        let mass = state.editing.as_ref().unwrap().attributes[0].meta.stable_id.unwrap();

        state.update_attribute_property(mass, "id", json!("weight"), None).unwrap();
        let attr = &state.editing.as_ref().unwrap().attributes[0];
        assert_eq!(attr.id, "physics/weight");
        assert_eq!(attr.display_id, "weight");

        state
            .update_attribute_property(mass, "id", json!("physics/inertia"), None)
            .unwrap();
        let attr = &state.editing.as_ref().unwrap().attributes[0];
        assert_eq!(attr.id, "physics/inertia");
        assert_eq!(attr.display_id, "inertia");

        let ticket = state.begin_save(None).unwrap();
        assert_eq!(ticket.payload.attributes[0].id, "physics/inertia");
    }

    #[test]
    fn test_revert_attribute() {
        let mut state = selected(vehicle());
        let speed = state.editing.as_ref().unwrap().attributes[0].meta.stable_id.unwrap();

        state.update_attribute_property(speed, "type", json!("int"), None).unwrap();
        state.revert_attribute(speed, None).unwrap();
        assert!(!state.is_dirty);

        state.remove_attribute(speed, None).unwrap();
        assert!(state.is_dirty);
        state.revert_attribute(speed, None).unwrap();
        assert!(!state.is_dirty);

        let added = state
            .add_attribute(Attribute::new("fuel", AttributeType::Float), None)
            .unwrap();
        state.revert_attribute(added, None).unwrap();
        assert!(!state.is_dirty);
        assert!(state.editing.as_ref().unwrap().find_child(added).is_none());
    }

    #[test]
    fn test_commands_dispatch() {
        let mut state = EditorState::default();
        state
            .apply(EditorCommand::Select(Some(vehicle())), None)
            .unwrap();
        state
            .apply(EditorCommand::update_property("name", json!("Car")), None)
            .unwrap();
        assert!(state.is_dirty);
        state.apply(EditorCommand::ResetChanges, None).unwrap();
        assert!(!state.is_dirty);
    }

    #[test]
    fn test_begin_save_translates_relationships() {
        let physics = RecordRef {
            stable_id: StableId::generate(),
            business_key: "physics".to_string(),
        };
        let refs = vec![physics.clone()];
        let mut state = selected(vehicle());
        state
            .update_property("modules", json!([physics.stable_id.to_string()]), Some(refs.as_slice()))
            .unwrap();
        assert!(!state.is_dirty);

        state
            .update_property(
                "modules",
                json!([physics.stable_id.to_string(), "ghost"]),
                Some(refs.as_slice()),
            )
            .unwrap();
        assert!(state.is_dirty);

        let ticket = state.begin_save(Some(refs.as_slice())).unwrap();
        assert!(state.is_saving);
        assert_eq!(ticket.payload.modules, Some(vec!["physics".to_string()]));
        assert!(matches!(state.begin_save(Some(refs.as_slice())), Err(CoreError::SaveInProgress)));
    }

    #[test]
    fn test_finish_save_replaces_snapshot() {
        let mut state = selected(vehicle());
        state.update_property("id", json!("car"), None).unwrap();
        let ticket = state.begin_save(None).unwrap();
        let saved = ticket.payload.clone();

        state.finish_save(ticket, Ok(saved), None).unwrap();
        assert!(!state.is_saving);
        assert!(!state.is_dirty);
        assert_eq!(state.original.as_ref().unwrap().base.id, "car");
        assert_eq!(state.editing.as_ref().unwrap().base.id, "car");
    }

    #[test]
    fn test_edits_during_save_survive() {
        let mut state = selected(vehicle());
        state.update_property("name", json!("Car"), None).unwrap();
        let ticket = state.begin_save(None).unwrap();
        let saved = ticket.payload.clone();

        state.update_property("description", json!("late edit"), None).unwrap();
        state.finish_save(ticket, Ok(saved), None).unwrap();

        assert_eq!(state.original.as_ref().unwrap().base.name, "Car");
        assert_eq!(
            state.editing.as_ref().unwrap().base.description.as_deref(),
            Some("late edit")
        );
        assert!(state.is_dirty);
    }

    #[test]
    fn test_failed_save_keeps_working_copy() {
        let mut state = selected(vehicle());
        state.update_property("name", json!("Car"), None).unwrap();
        let editing = state.editing.clone();
        let ticket = state.begin_save(None).unwrap();

        let err = CoreError::persistence("update", "vehicle", anyhow::anyhow!("boom"));
        assert!(state.finish_save(ticket, Err(err), None).is_err());
        assert!(!state.is_saving);
        assert!(state.is_dirty);
        assert_eq!(state.editing, editing);
        assert!(state.error.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn test_response_after_deselect_is_ignored() {
        let mut state = selected(vehicle());
        state.update_property("name", json!("Car"), None).unwrap();
        let ticket = state.begin_save(None).unwrap();
        let saved = ticket.payload.clone();

        let mut other = Entity::new("slope", "Slope");
        assign_all(&mut other);
        state.select(Some(other.clone()));
        state.finish_save(ticket, Ok(saved), None).unwrap();

        assert_eq!(state.selected_id, other.stable_id());
        assert_eq!(state.original.as_ref(), Some(&other));
        assert!(!state.is_saving);
    }

    #[test]
    fn test_apply_refresh_restamps_by_key() {
        let mut state = selected(vehicle());
        let speed = state.editing.as_ref().unwrap().attributes[0].meta.stable_id;
        state.update_property("name", json!("Car"), None).unwrap();

        let mut fresh = Entity::new("vehicle", "Vehicle (server)")
            .with_attribute(Attribute::new("speed", AttributeType::Float))
            .with_attribute(Attribute::new("fuel", AttributeType::Float));
        let mut stranger = fresh.clone();
        stranger.base.meta.stable_id = Some(StableId::generate());
        assert!(!state.apply_refresh(stranger));
        assert!(state.is_dirty);

        fresh.base.meta.stable_id = state.selected_id;
        assert!(state.apply_refresh(fresh));

        let editing = state.editing.as_ref().unwrap();
        assert_eq!(editing.attributes[0].meta.stable_id, speed);
        assert!(editing.attributes[1].meta.stable_id.is_some());
        assert_eq!(editing.base.name, "Vehicle (server)");
        assert!(!state.is_dirty);
        assert_eq!(state.original, state.editing);
    }
}
