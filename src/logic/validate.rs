use itertools::Itertools;

use crate::error::{ValidationErrors, ValidationIssue};
use crate::model::{attribute::display_part, EditableRecord};

/// Check a record before it is sent to the backend.
///
/// The business key must be non-empty and unique among `collection` (the
/// record's own entry, matched by stable id, is skipped). Sub-record keys must
/// be non-empty and unique within the record. Every problem is reported.
pub fn validate_record<R: EditableRecord>(record: &R, collection: &[R]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let key = record.business_key().trim();

    if key.is_empty() {
        errors.push(ValidationIssue::EmptyBusinessKey);
    } else {
        let taken = collection.iter().any(|other| {
            let same_record = record.stable_id().is_some() && other.stable_id() == record.stable_id();
            !same_record && other.business_key().trim() == key
        });
        if taken {
            errors.push(ValidationIssue::DuplicateBusinessKey { key: key.to_string() });
        }
    }

    let prefix = record.attribute_prefix();
    for (index, child) in record.children().iter().enumerate() {
        if display_part(&child.id, prefix).trim().is_empty() {
            errors.push(ValidationIssue::EmptyAttributeKey { index });
        }
    }

    for key in record
        .children()
        .iter()
        .map(|child| child.id.trim())
        .filter(|key| !key.is_empty())
        .duplicates()
    {
        errors.push(ValidationIssue::DuplicateAttributeKey { key: key.to_string() });
    }

    errors.into_result()
}
