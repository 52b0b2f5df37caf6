//! Synchronization driver: read, order, write.
//!
//! The driver is thin orchestration over the other modules. It reads every
//! requested content type from the source, registers the objects in the
//! run's [`ContentStores`], orders them with a [`DependencyGraph`] and writes
//! them to the destination as content tuples. Per-item failures are
//! collected in a [`SyncReport`]; a dependency cycle aborts the run.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SyncConfig;
use crate::content::ContentObject;
use crate::error::{ErrorScope, Result, SyncError};
use crate::graph::DependencyGraph;
use crate::handle::{ContentHandle, ContentType, HandleIdentity};
use crate::reconcile::{apply_write_result, find_counterpart, tuple_for};
use crate::store::ContentStores;
use crate::tuple::{ContentTuple, Operation};

/// Source-side access to content.
pub trait ReadMethod {
    /// Read every object of a content type.
    fn read_objects(&self, content_type: &ContentType) -> Result<Vec<ContentObject>>;

    /// Read one object.
    fn read_object(&self, handle: &ContentHandle) -> Result<Option<ContentObject>>;
}

/// Destination-side writes.
///
/// Each method may return the object as stored, so store-assigned
/// identifiers and renamed keys flow back to the driver.
pub trait WriteMethod {
    fn insert(&mut self, object: &ContentObject) -> Result<Option<ContentObject>>;

    /// Apply an update expressed as an `(old, new)` tuple.
    fn update_object(&mut self, tuple: &ContentTuple) -> Result<Option<ContentObject>>;

    /// Batch form of [`Self::update_object`]. Stops at the first failure.
    fn update_objects(&mut self, tuples: &[ContentTuple]) -> Result<Vec<Option<ContentObject>>> {
        tuples.iter().map(|tuple| self.update_object(tuple)).collect()
    }

    fn delete_object(&mut self, handle: &ContentHandle) -> Result<Option<ContentObject>>;
}

/// One failed item or content type.
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<&'static str>,
    pub scope: ErrorScope,
    pub message: String,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub content_types: Vec<String>,
    pub read: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub renamed: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    #[must_use]
    pub fn new(content_types: &[ContentType]) -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            content_types: content_types.iter().map(ToString::to_string).collect(),
            read: 0,
            inserted: 0,
            updated: 0,
            deleted: 0,
            renamed: 0,
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of objects written (inserted, updated or deleted).
    #[must_use]
    pub fn written(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    /// One-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} read, {} inserted, {} updated, {} deleted, {} renamed, {} failed",
            self.read,
            self.inserted,
            self.updated,
            self.deleted,
            self.renamed,
            self.failures.len()
        );
        if let Some(completed_at) = self.completed_at {
            let elapsed = completed_at - self.started_at;
            summary.push_str(&format!(" in {}ms", elapsed.num_milliseconds()));
        }
        summary
    }

    fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    fn record(
        &mut self,
        content_type: &ContentType,
        handle: Option<&ContentHandle>,
        operation: Option<Operation>,
        error: &SyncError,
    ) {
        self.failures.push(SyncFailure {
            content_type: content_type.to_string(),
            handle: handle.map(ToString::to_string),
            operation: operation.map(|operation| operation.as_str()),
            scope: error.scope(),
            message: error.to_string(),
        });
    }

    fn count(&mut self, operation: Operation) {
        match operation {
            Operation::Insert => self.inserted += 1,
            Operation::Update => self.updated += 1,
            Operation::Delete => self.deleted += 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Orchestrates one run from a source to a destination.
#[derive(Debug, Clone, Default)]
pub struct SyncDriver {
    config: SyncConfig,
}

impl SyncDriver {
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Synchronize `content_types` from `source` to `destination`.
    ///
    /// # Errors
    /// Returns the error that stopped the run: a dependency cycle, a
    /// run-scoped error, or, with `halt_on_error`, the first item failure.
    /// Objects written before the failure stay written.
    pub fn run<S, D>(
        &self,
        content_types: &[ContentType],
        source: &S,
        destination: &mut D,
    ) -> Result<SyncReport>
    where
        S: ReadMethod + ?Sized,
        D: ReadMethod + WriteMethod + ?Sized,
    {
        let mut report = SyncReport::new(content_types);
        tracing::info!(content_types = content_types.len(), "starting synchronization");

        let mut run = Run {
            stores: ContentStores::new(),
            existing: Vec::new(),
            active_types: Vec::new(),
        };
        self.read_phase(content_types, source, destination, &mut run, &mut report)?;

        let order = order(&run.stores)?;
        tracing::debug!(objects = order.len(), "computed write order");

        for identity in &order {
            self.write_one(&identity.to_handle(), destination, &mut run, &mut report)?;
        }

        if self.config.delete_missing {
            self.delete_phase(destination, &run, &mut report)?;
        }

        report.complete();
        tracing::info!(summary = %report.summary(), "synchronization finished");
        Ok(report)
    }

    fn read_phase<S, D>(
        &self,
        content_types: &[ContentType],
        source: &S,
        destination: &D,
        run: &mut Run,
        report: &mut SyncReport,
    ) -> Result<()>
    where
        S: ReadMethod + ?Sized,
        D: ReadMethod + ?Sized,
    {
        for content_type in content_types {
            let read = source
                .read_objects(content_type)
                .and_then(|objects| Ok((objects, destination.read_objects(content_type)?)));
            let (objects, existing) = match read {
                Ok(read) => read,
                Err(err) => {
                    tracing::warn!(content_type = %content_type, error = %err, "skipping content type");
                    report.record(content_type, None, None, &err);
                    if self.config.halt_on_error {
                        return Err(err);
                    }
                    continue;
                }
            };

            if run.stores.len() + objects.len() > self.config.max_objects {
                return Err(SyncError::Config(format!(
                    "run exceeds {} content objects",
                    self.config.max_objects
                )));
            }

            report.read += objects.len();
            for object in objects {
                let handle = object.handle().clone();
                if let Err(err) = run.stores.insert(object) {
                    self.fail(report, content_type, Some(&handle), None, err)?;
                }
            }
            // The store exists even when every object failed, so deletion
            // still sees the type as read.
            run.stores.store_mut(content_type);
            run.existing.extend(existing);
            run.active_types.push(content_type.clone());
        }
        Ok(())
    }

    fn write_one<D>(
        &self,
        handle: &ContentHandle,
        destination: &mut D,
        run: &mut Run,
        report: &mut SyncReport,
    ) -> Result<()>
    where
        D: WriteMethod + ?Sized,
    {
        let Some(object) = run.stores.get(handle).cloned() else {
            return Ok(());
        };
        let content_type = object.content_type().clone();

        let tuple = match tuple_for(object, &run.existing) {
            Ok(tuple) => tuple,
            Err(err) => return self.fail(report, &content_type, Some(handle), None, err),
        };
        let operation = tuple.operation();

        let written = match operation {
            Operation::Update => destination.update_object(&tuple),
            _ => match tuple.new_object() {
                Some(new) => destination.insert(new),
                None => Ok(None),
            },
        };
        let returned = match written {
            Ok(returned) => returned,
            Err(err) => return self.fail(report, &content_type, Some(handle), Some(operation), err),
        };

        report.count(operation);
        tracing::debug!(handle = %tuple.handle(), %operation, "wrote content object");

        let returned_handle = returned.as_ref().map_or(tuple.handle(), ContentObject::handle);
        match apply_write_result(&mut run.stores, handle, returned_handle) {
            Ok(change) => {
                if change.renamed {
                    report.renamed += 1;
                }
                Ok(())
            }
            Err(err) => self.fail(report, &content_type, Some(handle), Some(operation), err),
        }
    }

    /// Delete destination objects with no source counterpart, dependents first.
    fn delete_phase<D>(&self, destination: &mut D, run: &Run, report: &mut SyncReport) -> Result<()>
    where
        D: WriteMethod + ?Sized,
    {
        let source: Vec<ContentObject> = run.stores.objects().cloned().collect();
        let active: HashSet<&ContentType> = run.active_types.iter().collect();

        let mut orphans = ContentStores::new();
        for object in &run.existing {
            if !active.contains(object.content_type()) || find_counterpart(object.handle(), &source).is_some() {
                continue;
            }
            if let Err(err) = orphans.insert(object.clone()) {
                let content_type = object.content_type().clone();
                self.fail(report, &content_type, Some(object.handle()), Some(Operation::Delete), err)?;
            }
        }

        let mut deletions = order(&orphans)?;
        deletions.reverse();

        for identity in deletions {
            let Some(orphan) = orphans.get(&identity.to_handle()).cloned() else {
                continue;
            };
            let tuple = ContentTuple::delete(orphan);
            let handle = tuple.handle();
            match destination.delete_object(handle) {
                Ok(_) => {
                    report.count(Operation::Delete);
                    tracing::debug!(handle = %handle, "deleted content object");
                }
                Err(err) => {
                    self.fail(report, &identity.content_type, Some(handle), Some(Operation::Delete), err)?;
                }
            }
        }
        Ok(())
    }

    /// Record an item failure; returns the error when the run must stop.
    fn fail(
        &self,
        report: &mut SyncReport,
        content_type: &ContentType,
        handle: Option<&ContentHandle>,
        operation: Option<Operation>,
        err: SyncError,
    ) -> Result<()> {
        report.record(content_type, handle, operation, &err);
        if err.is_fatal() || self.config.halt_on_error {
            tracing::error!(content_type = %content_type, error = %err, "aborting synchronization");
            return Err(err);
        }
        tracing::warn!(
            content_type = %content_type,
            handle = %handle.map(ToString::to_string).unwrap_or_default(),
            error = %err,
            "content item failed"
        );
        Ok(())
    }
}

/// Mutable state of one run.
struct Run {
    stores: ContentStores,
    /// Destination objects of the content types that were read successfully.
    existing: Vec<ContentObject>,
    active_types: Vec<ContentType>,
}

/// Dependency order over every registered object.
///
/// References are resolved against the stores first, so an id-only
/// reference and a keyed object land on the same graph node.
fn order(stores: &ContentStores) -> Result<Vec<HandleIdentity>> {
    let mut graph = DependencyGraph::new();
    for object in stores.objects() {
        let Some(identity) = object.handle().identity() else {
            continue;
        };
        graph.add_node(identity.clone());
        for dependency in object.dependencies() {
            if let Some(target) = stores.resolve(dependency).identity() {
                graph.add_dependency(identity.clone(), target);
            }
        }
    }
    graph.get_dependencies()
}
