//! Handle reconciliation across stores.
//!
//! Pairs source objects with their destination counterparts, completes the
//! identifier a source handle lacks from its counterpart, derives the write
//! tuples, and folds identifiers returned by a write back into the run's
//! stores.

use crate::content::ContentObject;
use crate::error::{Result, SyncError};
use crate::handle::ContentHandle;
use crate::store::ContentStores;
use crate::tuple::ContentTuple;

/// Find the counterpart of `handle` among objects of its content type: a
/// strict match first, then a match on either identifier.
#[must_use]
pub fn find_counterpart<'a>(
    handle: &ContentHandle,
    candidates: &'a [ContentObject],
) -> Option<&'a ContentObject> {
    counterpart_position(handle, candidates, &[]).map(|position| &candidates[position])
}

/// Build the write tuple for one source object.
///
/// The source handle receives the identifier half it lacks from its
/// destination counterpart when both share a content type.
///
/// # Errors
/// Returns `UnsetHandle` for a source object without identifiers.
pub fn tuple_for(object: ContentObject, destination: &[ContentObject]) -> Result<ContentTuple> {
    ensure_set(object.handle())?;
    let counterpart = find_counterpart(object.handle(), destination).cloned();
    Ok(pair(object, counterpart))
}

/// Derive all tuples turning `destination` into `source`.
///
/// Each destination object is matched at most once. With `delete_missing`,
/// unmatched destination objects yield delete tuples after all inserts and
/// updates.
///
/// # Errors
/// Returns `UnsetHandle` for a source object without identifiers.
pub fn reconcile(
    source: &[ContentObject],
    destination: &[ContentObject],
    delete_missing: bool,
) -> Result<Vec<ContentTuple>> {
    let mut taken = vec![false; destination.len()];
    let mut tuples = Vec::with_capacity(source.len());

    for object in source {
        ensure_set(object.handle())?;
        let counterpart = counterpart_position(object.handle(), destination, &taken).map(|position| {
            taken[position] = true;
            destination[position].clone()
        });
        tuples.push(pair(object.clone(), counterpart));
    }

    if delete_missing {
        tuples.extend(
            destination
                .iter()
                .zip(&taken)
                .filter(|(_, taken)| !**taken)
                .map(|(object, _)| ContentTuple::delete(object.clone())),
        );
    }

    tracing::debug!(
        source = source.len(),
        destination = destination.len(),
        tuples = tuples.len(),
        "reconciled content"
    );
    Ok(tuples)
}

/// What happened to a run handle after a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandleChange {
    /// The handle the object is registered under afterwards.
    pub handle: Option<ContentHandle>,
    /// Whether the path key changed and references were rewritten.
    pub renamed: bool,
    /// Number of references rewritten by the rename.
    pub rewritten_references: usize,
    /// Whether a missing identifier was filled in.
    pub completed: bool,
}

/// Fold the handle returned by a write into the run's stores.
///
/// A different path key is propagated as a rename to every store; an
/// identifier the run handle lacks is filled in.
///
/// # Errors
/// - `HandleTypeMismatch` if the returned handle has another content type
/// - `RenameConflict` / `DuplicateHandle` if the returned identifiers belong
///   to another registered object
pub fn apply_write_result(
    stores: &mut ContentStores,
    written: &ContentHandle,
    returned: &ContentHandle,
) -> Result<HandleChange> {
    written.ensure_same_type(returned)?;
    let mut change = HandleChange::default();
    let mut current = stores.resolve(written);

    let key_changed = matches!(
        (current.path_key(), returned.path_key()),
        (Some(old), Some(new)) if old != new
    );
    if key_changed {
        let mut target = returned.clone();
        if target.object_id().is_none() {
            target.set_object_id(current.object_id().map(String::from));
        }
        change.rewritten_references = stores.rename(&current, &target)?;
        change.renamed = true;
        current = stores.resolve(&target);
    }

    if !current.is_resolved() && stores.get(&current).is_some() {
        change.completed = stores
            .store_mut(current.content_type())
            .complete_handle(&current, returned)?;
        current = stores.resolve(&current);
    }

    change.handle = Some(current);
    Ok(change)
}

fn pair(mut object: ContentObject, counterpart: Option<ContentObject>) -> ContentTuple {
    match counterpart {
        Some(old) => {
            if old.content_type() == object.content_type() {
                // Same content type, so filling cannot fail.
                let _ = object.handle_mut().fill_missing(old.handle());
            }
            ContentTuple::update(old, object)
        }
        None => ContentTuple::insert(object),
    }
}

fn counterpart_position(
    handle: &ContentHandle,
    candidates: &[ContentObject],
    taken: &[bool],
) -> Option<usize> {
    let available = |position: &usize| {
        !taken.get(*position).copied().unwrap_or(false)
            && candidates[*position].content_type() == handle.content_type()
    };
    let strict = (0..candidates.len())
        .filter(available)
        .find(|&position| candidates[position].handle().matches(handle));
    strict.or_else(|| {
        (0..candidates.len())
            .filter(available)
            .find(|&position| candidates[position].handle().matches_key_or_id(handle))
    })
}

fn ensure_set(handle: &ContentHandle) -> Result<()> {
    if handle.is_set() {
        Ok(())
    } else {
        Err(SyncError::UnsetHandle(handle.content_type().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::Bean;
    use crate::tuple::Operation;
    use pretty_assertions::assert_eq;

    fn object(handle: ContentHandle) -> ContentObject {
        let name = handle.content_type().to_string();
        ContentObject::new(handle, Bean::new(name))
    }

    #[test]
    fn test_strict_match_preferred_over_loose() {
        let destination = vec![
            object(ContentHandle::with_key("model", "/sales")),
            object(ContentHandle::with_key("report", "/sales").id("r-1")),
        ];
        let found = find_counterpart(&ContentHandle::with_key("report", "/sales"), &destination).unwrap();
        assert_eq!(found.content_type().as_str(), "report");
    }

    #[test]
    fn test_loose_match_on_id_after_key_change() {
        let destination = vec![object(ContentHandle::with_key("report", "/old").id("9"))];
        let found = find_counterpart(&ContentHandle::with_key("report", "/new").id("9"), &destination);
        assert_eq!(found.unwrap().handle().path_key(), Some("/old"));
    }

    #[test]
    fn test_other_content_type_is_never_a_counterpart() {
        let destination = vec![
            object(ContentHandle::with_id("folder", "7")),
            object(ContentHandle::with_key("model", "/sales")),
        ];
        assert!(find_counterpart(&ContentHandle::with_id("report", "7"), &destination).is_none());

        let source = vec![object(ContentHandle::with_id("report", "7"))];
        let tuples = reconcile(&source, &destination, false).unwrap();
        assert_eq!(tuples.len(), 1);
        assert!(tuples[0].is_insert());
    }

    #[test]
    fn test_tuple_for_fills_missing_id() {
        let destination = vec![object(ContentHandle::with_key("report", "/a").id("r-7"))];
        let tuple = tuple_for(object(ContentHandle::with_key("report", "/a")), &destination).unwrap();

        assert_eq!(tuple.operation(), Operation::Update);
        assert_eq!(tuple.handle().object_id(), Some("r-7"));
    }

    #[test]
    fn test_tuple_for_unset_handle() {
        let err = tuple_for(object(ContentHandle::new("report")), &[]).unwrap_err();
        assert!(matches!(err, SyncError::UnsetHandle(_)));
    }

    #[test]
    fn test_reconcile_classifies() {
        let source = vec![
            object(ContentHandle::with_key("report", "/kept")),
            object(ContentHandle::with_key("report", "/new")),
        ];
        let destination = vec![
            object(ContentHandle::with_key("report", "/kept")),
            object(ContentHandle::with_key("report", "/gone")),
        ];

        let operations = |tuples: &[ContentTuple]| -> Vec<Operation> {
            tuples.iter().map(ContentTuple::operation).collect()
        };

        let without_delete = reconcile(&source, &destination, false).unwrap();
        assert_eq!(
            operations(&without_delete),
            vec![Operation::Update, Operation::Insert]
        );

        let with_delete = reconcile(&source, &destination, true).unwrap();
        assert_eq!(
            operations(&with_delete),
            vec![Operation::Update, Operation::Insert, Operation::Delete]
        );
        assert_eq!(with_delete[2].handle().path_key(), Some("/gone"));
    }

    #[test]
    fn test_reconcile_matches_each_destination_once() {
        let source = vec![
            object(ContentHandle::with_id("report", "1")),
            object(ContentHandle::with_id("report", "1")),
        ];
        let destination = vec![object(ContentHandle::with_id("report", "1"))];
        let tuples = reconcile(&source, &destination, false).unwrap();
        assert!(tuples[0].is_update());
        assert!(tuples[1].is_insert());
    }

    #[test]
    fn test_apply_write_result_renames() {
        let mut stores = ContentStores::new();
        stores
            .insert(object(ContentHandle::with_key("model", "/m").id("m1")))
            .unwrap();
        stores
            .insert(
                object(ContentHandle::with_key("report", "/r"))
                    .with_parent(ContentHandle::with_key("model", "/m")),
            )
            .unwrap();

        let change = apply_write_result(
            &mut stores,
            &ContentHandle::with_key("model", "/m"),
            &ContentHandle::with_key("model", "/models/m"),
        )
        .unwrap();

        assert!(change.renamed);
        assert_eq!(change.rewritten_references, 1);
        let handle = change.handle.unwrap();
        assert_eq!(handle.path_key(), Some("/models/m"));
        assert_eq!(handle.object_id(), Some("m1"));
        assert!(!stores.is_referenced(&ContentHandle::with_key("model", "/m")));
    }

    #[test]
    fn test_apply_write_result_fills_id() {
        let mut stores = ContentStores::new();
        stores
            .insert(object(ContentHandle::with_key("report", "/r")))
            .unwrap();

        let change = apply_write_result(
            &mut stores,
            &ContentHandle::with_key("report", "/r"),
            &ContentHandle::with_key("report", "/r").id("report-1"),
        )
        .unwrap();

        assert!(!change.renamed);
        assert!(change.completed);
        let stored = stores.get(&ContentHandle::with_id("report", "report-1")).unwrap();
        assert_eq!(stored.handle().path_key(), Some("/r"));
    }

    #[test]
    fn test_apply_write_result_unchanged_handle() {
        let mut stores = ContentStores::new();
        let handle = ContentHandle::with_key("report", "/r").id("7");
        stores.insert(object(handle.clone())).unwrap();

        let change = apply_write_result(&mut stores, &handle, &handle).unwrap();
        assert_eq!(
            change,
            HandleChange {
                handle: Some(handle),
                ..HandleChange::default()
            }
        );
    }

    #[test]
    fn test_apply_write_result_type_mismatch() {
        let mut stores = ContentStores::new();
        let err = apply_write_result(
            &mut stores,
            &ContentHandle::with_key("report", "/r"),
            &ContentHandle::with_key("model", "/r"),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::HandleTypeMismatch { .. }));
    }
}
