use std::collections::HashSet;

use crate::model::{Attribute, EditableRecord, Identified, StableId};

/// Give `item` a stable id unless it already has one. Idempotent.
pub fn assign<T: Identified>(item: &mut T) -> StableId {
    if let Some(id) = item.stable_id() {
        return id;
    }
    let id = StableId::generate();
    item.meta_mut().stable_id = Some(id);
    id
}

/// Assign stable ids to a record and every one of its sub-records.
pub fn assign_all<R: EditableRecord>(record: &mut R) -> StableId {
    let id = assign(record);
    for child in record.children_mut() {
        assign(child);
    }
    id
}

/// Move identities from `previous` onto `fresh`, a newly fetched form of the same record.
///
/// The record keeps `previous`'s stable id. Sub-records are matched by business
/// key; any sub-record without a match gets a new stable id.
pub fn carry_identity<R: EditableRecord>(previous: &R, fresh: &mut R) -> StableId {
    if let Some(id) = previous.stable_id() {
        fresh.meta_mut().stable_id = Some(id);
    }
    restamp_children(previous.children(), fresh.children_mut());
    assign_all(fresh)
}

/// Copy stable ids from `known` onto sub-records of `fresh` that lack one,
/// matching on business key. A stable id is handed out at most once.
pub fn restamp_children(known: &[Attribute], fresh: &mut [Attribute]) {
    let mut taken: HashSet<StableId> = fresh.iter().filter_map(|child| child.stable_id()).collect();
    for child in fresh.iter_mut().filter(|child| child.stable_id().is_none()) {
        let matched = known
            .iter()
            .filter(|candidate| candidate.id == child.id)
            .filter_map(|candidate| candidate.stable_id())
            .find(|id| !taken.contains(id));
        if let Some(id) = matched {
            taken.insert(id);
            child.meta.stable_id = Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeType, Entity};

    #[test]
    fn test_assign_is_idempotent() {
        let mut entity = Entity::new("vehicle", "Vehicle");
        let first = assign(&mut entity);
        let second = assign(&mut entity);
        assert_eq!(first, second);
        assert_eq!(entity.stable_id(), Some(first));
    }

    #[test]
    fn test_assign_never_repeats_across_records() {
        let mut seen = HashSet::new();
        for i in 0..2_000 {
            let mut entity = Entity::new(format!("e{}", i), "E")
                .with_attribute(Attribute::new("a", AttributeType::Int))
                .with_attribute(Attribute::new("b", AttributeType::Int));
            assert!(seen.insert(assign_all(&mut entity)));
            for child in &entity.attributes {
                assert!(seen.insert(child.stable_id().unwrap()));
            }
        }
    }

    #[test]
    fn test_carry_identity_matches_children_by_key() {
        let mut previous = Entity::new("vehicle", "Vehicle")
            .with_attribute(Attribute::new("speed", AttributeType::Float))
            .with_attribute(Attribute::new("fuel", AttributeType::Float));
        let record_id = assign_all(&mut previous);

        let mut fresh = Entity::new("vehicle", "Vehicle")
            .with_attribute(Attribute::new("fuel", AttributeType::Float))
            .with_attribute(Attribute::new("armor", AttributeType::Int));
        fresh.clear_client_state();

        assert_eq!(carry_identity(&previous, &mut fresh), record_id);
        assert_eq!(fresh.attributes[0].stable_id(), previous.attributes[1].stable_id());

        let armor = fresh.attributes[1].stable_id().unwrap();
        assert!(previous.attributes.iter().all(|a| a.stable_id() != Some(armor)));
    }

    #[test]
    fn test_restamp_hands_out_each_id_once() {
        let mut known = vec![Attribute::new("dup", AttributeType::Int)];
        assign(&mut known[0]);

        let mut fresh = vec![
            Attribute::new("dup", AttributeType::Int),
            Attribute::new("dup", AttributeType::Int),
        ];
        restamp_children(&known, &mut fresh);
        assert_eq!(fresh[0].stable_id(), known[0].stable_id());
        assert_eq!(fresh[1].stable_id(), None);
    }
}
