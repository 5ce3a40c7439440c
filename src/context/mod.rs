// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The diagram editing context: the single authorized mutation surface.
//!
//! Every mutating operation follows the same side-effect order: mutate the
//! in-memory state, record the history entry (unless the caller opted out),
//! emit the domain event, then persist through the storage bridge. Local
//! state is authoritative and is never rolled back when persistence fails;
//! the error propagates after the optimistic apply and [`pending_sync`]
//! stays set until a later write lands.
//!
//! Undo/redo replay the recorded entries through one exhaustive match in
//! [`DiagramContext::undo`]/[`DiagramContext::redo`]; adding a history
//! variant without teaching the replay about it is a compile error.
//!
//! [`pending_sync`]: DiagramContext::pending_sync

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::history::{History, RedoUndoAction, RemovedField, RemovedTables};
use crate::model::{
    Area, AreaId, AreaPatch, Cardinality, CustomType, CustomTypeId, CustomTypeKind,
    CustomTypePatch, DatabaseEdition, DatabaseType, Dependency, DependencyId, DependencyPatch,
    Diagram, DiagramId, DiagramPatch, Field, FieldId, FieldPatch, FieldType, Index, IndexId,
    IndexPatch, Note, NoteId, NotePatch, Relationship, RelationshipId, RelationshipPatch, Table,
    TableId, TablePatch,
};
use crate::store::{IncludeOptions, Storage, StorageError};

pub mod debounce;
pub mod events;

pub use debounce::Debouncer;
pub use events::{DiagramEvent, EventBus};

/// Quiet period before a timestamp touch is written through.
const UPDATED_AT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Loaded { diagram_id: DiagramId },
}

/// Per-call knobs for mutating operations. `update_history` is on by
/// default; replayed mutations and programmatic bulk loads turn it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    pub update_history: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            update_history: true,
        }
    }
}

impl UpdateOptions {
    pub fn skip_history() -> Self {
        Self {
            update_history: false,
        }
    }
}

#[derive(Debug)]
pub enum ContextError {
    /// No diagram is loaded.
    NoDiagram,
    /// A load is in progress; mutations are rejected rather than queued.
    Loading,
    Storage {
        source: StorageError,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDiagram => write!(f, "no diagram is loaded"),
            Self::Loading => write!(f, "a diagram load is in progress"),
            Self::Storage { source } => write!(f, "storage error: {source}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoDiagram | Self::Loading => None,
            Self::Storage { source } => Some(source),
        }
    }
}

/// Tracks whether local edits have landed in the store. Writes take a
/// monotonically increasing version before they start and acknowledge it on
/// success; acknowledgements carry their version, so a stale ack (an old
/// write completing after a newer one) can never mark newer work as synced.
#[derive(Debug, Default)]
pub struct SyncTracker {
    issued: AtomicU64,
    acked: AtomicU64,
}

impl SyncTracker {
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn ack(&self, version: u64) {
        self.acked.fetch_max(version, Ordering::SeqCst);
    }

    pub fn pending(&self) -> bool {
        self.acked.load(Ordering::SeqCst) < self.issued.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
enum ReplayDirection {
    Undo,
    Redo,
}

pub struct DiagramContext {
    session: SessionState,
    diagram_name: String,
    database_type: DatabaseType,
    database_edition: Option<DatabaseEdition>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    tables: Vec<Table>,
    relationships: Vec<Relationship>,
    dependencies: Vec<Dependency>,
    areas: Vec<Area>,
    custom_types: Vec<CustomType>,
    notes: Vec<Note>,

    history: History,
    events: EventBus,
    storage: Arc<dyn Storage>,
    sync: Arc<SyncTracker>,
    updated_at_debouncer: Debouncer,
}

impl fmt::Debug for DiagramContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramContext")
            .field("session", &self.session)
            .field("tables", &self.tables.len())
            .field("relationships", &self.relationships.len())
            .field("undo_depth", &self.history.undo_depth())
            .field("redo_depth", &self.history.redo_depth())
            .finish()
    }
}

impl DiagramContext {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let now = Utc::now();
        Self {
            session: SessionState::Unloaded,
            diagram_name: String::new(),
            database_type: DatabaseType::default(),
            database_edition: None,
            created_at: now,
            updated_at: now,
            tables: Vec::new(),
            relationships: Vec::new(),
            dependencies: Vec::new(),
            areas: Vec::new(),
            custom_types: Vec::new(),
            notes: Vec::new(),
            history: History::new(),
            events: EventBus::new(),
            storage,
            sync: Arc::new(SyncTracker::default()),
            updated_at_debouncer: Debouncer::new(UPDATED_AT_DEBOUNCE),
        }
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = History::with_capacity(depth);
        self
    }

    // Read surface.

    pub fn session_state(&self) -> &SessionState {
        &self.session
    }

    pub fn diagram_id(&self) -> Option<&DiagramId> {
        match &self.session {
            SessionState::Loaded { diagram_id } => Some(diagram_id),
            SessionState::Unloaded | SessionState::Loading => None,
        }
    }

    pub fn diagram_name(&self) -> &str {
        &self.diagram_name
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub fn database_edition(&self) -> Option<DatabaseEdition> {
        self.database_edition
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn custom_types(&self) -> &[CustomType] {
        &self.custom_types
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get_table(&self, table_id: &TableId) -> Option<&Table> {
        self.tables.iter().find(|t| &t.id == table_id)
    }

    pub fn get_field(&self, table_id: &TableId, field_id: &FieldId) -> Option<&Field> {
        self.get_table(table_id)?.field(field_id)
    }

    pub fn get_index(&self, table_id: &TableId, index_id: &IndexId) -> Option<&Index> {
        self.get_table(table_id)?.index(index_id)
    }

    pub fn get_relationship(&self, relationship_id: &RelationshipId) -> Option<&Relationship> {
        self.relationships.iter().find(|r| &r.id == relationship_id)
    }

    pub fn get_dependency(&self, dependency_id: &DependencyId) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| &d.id == dependency_id)
    }

    pub fn get_area(&self, area_id: &AreaId) -> Option<&Area> {
        self.areas.iter().find(|a| &a.id == area_id)
    }

    pub fn get_custom_type(&self, custom_type_id: &CustomTypeId) -> Option<&CustomType> {
        self.custom_types.iter().find(|c| &c.id == custom_type_id)
    }

    pub fn get_note(&self, note_id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == note_id)
    }

    /// Whether any table field references `name` as its type. Custom type
    /// references are by name, so this drives the "in use" warning before a
    /// rename or delete.
    pub fn custom_type_used(&self, name: &str) -> bool {
        self.tables
            .iter()
            .flat_map(|table| &table.fields)
            .any(|field| field.field_type.name == name)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// True while local edits have not been confirmed by the store, either
    /// because writes are still in flight or because the last write failed.
    pub fn pending_sync(&self) -> bool {
        self.sync.pending()
    }

    pub fn subscribe(&mut self, subscriber: impl Fn(&DiagramEvent) + Send + 'static) {
        self.events.subscribe(subscriber);
    }

    /// Snapshot of the loaded diagram with every collection populated, or
    /// `None` when nothing is loaded.
    pub fn current_diagram(&self) -> Option<Diagram> {
        let diagram_id = self.diagram_id()?.clone();
        Some(self.diagram_snapshot(diagram_id))
    }

    // General operations.

    /// Re-keys the loaded diagram. The full current state is written under
    /// the new id before the old record is deleted, so a crash in between
    /// leaves at worst a duplicate, never a loss.
    pub async fn update_diagram_id(&mut self, new_id: DiagramId) -> Result<(), ContextError> {
        let old_id = self.require_loaded()?;
        self.session = SessionState::Loaded {
            diagram_id: new_id.clone(),
        };
        let snapshot = self.diagram_snapshot(new_id);
        self.persist(self.storage.add_diagram(&snapshot)).await?;
        self.persist(self.storage.delete_diagram(&old_id)).await
    }

    pub async fn update_diagram_name(
        &mut self,
        name: impl Into<String>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let name = name.into();
        let previous = std::mem::replace(&mut self.diagram_name, name.clone());
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateDiagramName {
                redo: name.clone(),
                undo: previous,
            });
        }
        self.touch();

        let patch = DiagramPatch {
            name: Some(name),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(&diagram_id, &patch))
            .await
    }

    /// Fetches the diagram with all collections and makes it the loaded
    /// state. Both history stacks are cleared. A missing diagram or a
    /// failed fetch leaves the context fully unloaded, with no data from
    /// any previously loaded diagram left behind.
    pub async fn load_diagram(
        &mut self,
        diagram_id: &DiagramId,
    ) -> Result<Option<Diagram>, ContextError> {
        self.session = SessionState::Loading;
        match self
            .storage
            .get_diagram(diagram_id, &IncludeOptions::all())
            .await
        {
            Ok(Some(diagram)) => {
                self.install_diagram(diagram.clone());
                Ok(Some(diagram))
            }
            Ok(None) => {
                self.reset_to_unloaded();
                Ok(None)
            }
            Err(source) => {
                self.reset_to_unloaded();
                Err(ContextError::Storage { source })
            }
        }
    }

    /// Installs an already-materialized diagram (import, clone, test
    /// fixture) without touching the store.
    pub fn load_diagram_from_data(&mut self, diagram: Diagram) {
        self.install_diagram(diagram);
    }

    /// Touches the modification timestamp. The write-through is debounced:
    /// rapid touches collapse into one store write after a quiet period.
    /// Must be called from within a tokio runtime.
    pub fn update_diagram_updated_at(&mut self) -> Result<DateTime<Utc>, ContextError> {
        let diagram_id = self.require_loaded()?;
        let now = Utc::now();
        self.updated_at = now;

        let storage = self.storage.clone();
        let sync = self.sync.clone();
        let version = sync.issue();
        self.updated_at_debouncer.schedule(async move {
            let patch = DiagramPatch {
                updated_at: Some(now),
                ..DiagramPatch::default()
            };
            match storage.update_diagram(&diagram_id, &patch).await {
                Ok(()) => sync.ack(version),
                Err(err) => {
                    log::warn!("debounced timestamp write failed for {diagram_id}: {err}");
                }
            }
        });
        Ok(now)
    }

    /// Empties every collection while keeping the diagram itself. History is
    /// cleared; each collection is deleted from the store.
    pub async fn clear_diagram_data(&mut self) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        self.tables.clear();
        self.relationships.clear();
        self.dependencies.clear();
        self.areas.clear();
        self.custom_types.clear();
        self.notes.clear();
        self.history.clear();
        self.touch();

        let snapshot = self.diagram_snapshot(diagram_id.clone());
        self.events.emit(&DiagramEvent::LoadDiagram { diagram: snapshot });

        self.persist(self.storage.delete_diagram_tables(&diagram_id))
            .await?;
        self.persist(self.storage.delete_diagram_relationships(&diagram_id))
            .await?;
        self.persist(self.storage.delete_diagram_dependencies(&diagram_id))
            .await?;
        self.persist(self.storage.delete_diagram_areas(&diagram_id))
            .await?;
        self.persist(self.storage.delete_diagram_custom_types(&diagram_id))
            .await?;
        self.persist(self.storage.delete_diagram_notes(&diagram_id))
            .await
    }

    /// Deletes the diagram from the store and resets to the unloaded state.
    pub async fn delete_diagram(&mut self) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        self.reset_to_unloaded();

        self.persist(self.storage.delete_diagram(&diagram_id)).await
    }

    /// Replaces the whole loaded diagram with `diagram` and writes it
    /// through in a single store update.
    pub async fn update_diagram_data(&mut self, diagram: Diagram) -> Result<(), ContextError> {
        self.require_loaded()?;
        let diagram_id = diagram.id.clone();
        self.install_diagram(diagram);

        let patch = DiagramPatch {
            name: Some(self.diagram_name.clone()),
            database_type: Some(self.database_type),
            database_edition: Some(self.database_edition),
            tables: Some(self.tables.clone()),
            relationships: Some(self.relationships.clone()),
            dependencies: Some(self.dependencies.clone()),
            areas: Some(self.areas.clone()),
            custom_types: Some(self.custom_types.clone()),
            notes: Some(self.notes.clone()),
            updated_at: Some(self.updated_at),
        };
        self.persist(self.storage.update_diagram(&diagram_id, &patch))
            .await
    }

    // Database flavor.

    /// Changes the database type. An edition that is not valid for the new
    /// type is dropped as part of the same update.
    pub async fn update_database_type(
        &mut self,
        database_type: DatabaseType,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        self.database_type = database_type;
        if let Some(edition) = self.database_edition {
            if !DatabaseEdition::for_database_type(database_type).contains(&edition) {
                self.database_edition = None;
            }
        }
        self.touch();

        let patch = DiagramPatch {
            database_type: Some(database_type),
            database_edition: Some(self.database_edition),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(&diagram_id, &patch))
            .await
    }

    pub async fn update_database_edition(
        &mut self,
        database_edition: Option<DatabaseEdition>,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if let Some(edition) = database_edition {
            if !DatabaseEdition::for_database_type(self.database_type).contains(&edition) {
                log::warn!(
                    "edition {edition:?} is not valid for {:?}, ignoring",
                    self.database_type
                );
                return Ok(());
            }
        }
        self.database_edition = database_edition;
        self.touch();

        let patch = DiagramPatch {
            database_edition: Some(database_edition),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(&diagram_id, &patch))
            .await
    }

    // Tables.

    /// Builds a table with a generated id, a sequential default name and a
    /// primary-key `id` field. Nothing is committed until `add_table`.
    pub fn create_table(&self) -> Table {
        let mut table = Table::new(
            TableId::generate(),
            format!("table_{}", self.tables.len() + 1),
        );
        let mut pk = Field::new(FieldId::generate(), "id", FieldType::named("bigint"));
        pk.primary_key = true;
        pk.unique = true;
        pk.nullable = false;
        table.fields.push(pk);
        table
    }

    pub async fn add_table(
        &mut self,
        table: Table,
        options: UpdateOptions,
    ) -> Result<Table, ContextError> {
        let diagram_id = self.require_loaded()?;
        self.insert_tables(std::slice::from_ref(&table));
        if options.update_history {
            self.history.record(RedoUndoAction::AddTables {
                redo: vec![table.clone()],
                undo: vec![table.id.clone()],
            });
        }
        self.touch();
        self.emit_add_tables(vec![table.clone()]);
        self.persist(self.storage.add_table(&diagram_id, &table))
            .await?;
        Ok(table)
    }

    /// Batch insert: one history entry, one store write.
    pub async fn add_tables(
        &mut self,
        tables: Vec<Table>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if tables.is_empty() {
            return Ok(());
        }
        self.insert_tables(&tables);
        if options.update_history {
            let undo = tables.iter().map(|t| t.id.clone()).collect();
            self.history.record(RedoUndoAction::AddTables {
                redo: tables.clone(),
                undo,
            });
        }
        self.touch();
        self.emit_add_tables(tables);

        let patch = DiagramPatch {
            tables: Some(self.tables.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(&diagram_id, &patch))
            .await
    }

    pub async fn update_table(
        &mut self,
        table_id: &TableId,
        patch: TablePatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_table(table_id, &patch) else {
            log::warn!("update_table: table {table_id} not found");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateTable {
                table_id: table_id.clone(),
                redo: patch.clone(),
                undo: inverse,
            });
        }
        self.touch();
        self.emit_update_table(table_id, patch.clone());
        self.persist(self.storage.update_table(&diagram_id, table_id, &patch))
            .await
    }

    /// Replaces the full table list (import, auto-layout). Relationships and
    /// dependencies pointing at tables that no longer exist are cascaded
    /// away; one undo restores everything.
    pub async fn update_tables_state(
        &mut self,
        tables: Vec<Table>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let previous = self.replace_tables_state(&tables);
        self.debug_assert_cascade_consistency();
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateTablesState {
                redo: tables,
                undo: previous,
            });
        }
        self.touch();
        self.emit_tables_state();
        self.persist_graph(&diagram_id).await
    }

    pub async fn remove_table(
        &mut self,
        table_id: &TableId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        self.remove_tables(std::slice::from_ref(table_id), options)
            .await
    }

    pub async fn remove_tables(
        &mut self,
        table_ids: &[TableId],
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_tables(table_ids);
        if removed.tables.is_empty() {
            return Ok(());
        }
        self.debug_assert_cascade_consistency();
        let removed_ids: Vec<TableId> = removed.tables.iter().map(|t| t.id.clone()).collect();
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveTables {
                redo: removed_ids.clone(),
                undo: removed,
            });
        }
        self.touch();
        self.emit_remove_tables(removed_ids);
        self.persist_graph(&diagram_id).await
    }

    // Fields.

    /// Builds a field with a generated id and a sequential default name;
    /// commit with `add_field`.
    pub fn create_field(&self, table_id: &TableId) -> Field {
        let count = self
            .get_table(table_id)
            .map(|t| t.fields.len())
            .unwrap_or_default();
        Field::new(
            FieldId::generate(),
            format!("field_{}", count + 1),
            FieldType::named("varchar"),
        )
    }

    pub async fn add_field(
        &mut self,
        table_id: &TableId,
        field: Field,
        options: UpdateOptions,
    ) -> Result<Field, ContextError> {
        let diagram_id = self.require_loaded()?;
        if !self.insert_field(table_id, &field) {
            log::warn!("add_field: table {table_id} not found");
            return Ok(field);
        }
        if options.update_history {
            self.history.record(RedoUndoAction::AddField {
                table_id: table_id.clone(),
                redo: field.clone(),
                undo: field.id.clone(),
            });
        }
        self.touch();
        self.emit_add_field(table_id, &field);
        self.persist_table(&diagram_id, table_id).await?;
        Ok(field)
    }

    pub async fn update_field(
        &mut self,
        table_id: &TableId,
        field_id: &FieldId,
        patch: FieldPatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_field(table_id, field_id, &patch) else {
            log::warn!("update_field: field {field_id} not found on table {table_id}");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateField {
                table_id: table_id.clone(),
                field_id: field_id.clone(),
                redo: patch,
                undo: inverse,
            });
        }
        self.touch();
        self.emit_table_fields(table_id);
        self.persist_table(&diagram_id, table_id).await
    }

    pub async fn remove_field(
        &mut self,
        table_id: &TableId,
        field_id: &FieldId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(removed) = self.take_field(table_id, field_id) else {
            return Ok(());
        };
        self.debug_assert_cascade_consistency();
        let cascaded = !removed.relationships.is_empty();
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveField {
                table_id: table_id.clone(),
                redo: field_id.clone(),
                undo: removed,
            });
        }
        self.touch();
        self.emit_remove_field(table_id, field_id);
        self.persist_table(&diagram_id, table_id).await?;
        if cascaded {
            let patch = DiagramPatch {
                relationships: Some(self.relationships.clone()),
                updated_at: Some(self.updated_at),
                ..DiagramPatch::default()
            };
            self.persist(self.storage.update_diagram(&diagram_id, &patch))
                .await?;
        }
        Ok(())
    }

    // Indexes.

    pub fn create_index(&self, table_id: &TableId) -> Index {
        let count = self
            .get_table(table_id)
            .map(|t| t.indexes.len())
            .unwrap_or_default();
        Index::new(IndexId::generate(), format!("index_{}", count + 1))
    }

    pub async fn add_index(
        &mut self,
        table_id: &TableId,
        index: Index,
        options: UpdateOptions,
    ) -> Result<Index, ContextError> {
        let diagram_id = self.require_loaded()?;
        if !self.insert_index(table_id, &index) {
            log::warn!("add_index: table {table_id} not found");
            return Ok(index);
        }
        if options.update_history {
            self.history.record(RedoUndoAction::AddIndex {
                table_id: table_id.clone(),
                redo: index.clone(),
                undo: index.id.clone(),
            });
        }
        self.touch();
        self.emit_table_indexes(table_id);
        self.persist_table(&diagram_id, table_id).await?;
        Ok(index)
    }

    pub async fn update_index(
        &mut self,
        table_id: &TableId,
        index_id: &IndexId,
        patch: IndexPatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_index(table_id, index_id, &patch) else {
            log::warn!("update_index: index {index_id} not found on table {table_id}");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateIndex {
                table_id: table_id.clone(),
                index_id: index_id.clone(),
                redo: patch,
                undo: inverse,
            });
        }
        self.touch();
        self.emit_table_indexes(table_id);
        self.persist_table(&diagram_id, table_id).await
    }

    pub async fn remove_index(
        &mut self,
        table_id: &TableId,
        index_id: &IndexId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(removed) = self.take_index(table_id, index_id) else {
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveIndex {
                table_id: table_id.clone(),
                redo: index_id.clone(),
                undo: removed,
            });
        }
        self.touch();
        self.emit_table_indexes(table_id);
        self.persist_table(&diagram_id, table_id).await
    }

    // Relationships.

    /// Builds a foreign-key relationship between two existing fields.
    /// Cardinality is derived from field uniqueness on each endpoint.
    /// `None` when either endpoint does not exist.
    pub fn create_relationship(
        &self,
        source_table_id: &TableId,
        source_field_id: &FieldId,
        target_table_id: &TableId,
        target_field_id: &FieldId,
    ) -> Option<Relationship> {
        let source_table = self.get_table(source_table_id)?;
        let source_field = source_table.field(source_field_id)?;
        let target_field = self.get_field(target_table_id, target_field_id)?;

        let cardinality_of = |field: &Field| {
            if field.unique || field.primary_key {
                Cardinality::One
            } else {
                Cardinality::Many
            }
        };

        Some(Relationship {
            id: RelationshipId::generate(),
            name: format!("{}_{}_fk", source_table.name, source_field.name),
            source_table_id: source_table_id.clone(),
            source_field_id: source_field_id.clone(),
            target_table_id: target_table_id.clone(),
            target_field_id: target_field_id.clone(),
            source_cardinality: cardinality_of(source_field),
            target_cardinality: cardinality_of(target_field),
        })
    }

    pub async fn add_relationship(
        &mut self,
        relationship: Relationship,
        options: UpdateOptions,
    ) -> Result<Relationship, ContextError> {
        let diagram_id = self.require_loaded()?;
        self.insert_relationships(std::slice::from_ref(&relationship));
        if options.update_history {
            self.history.record(RedoUndoAction::AddRelationships {
                redo: vec![relationship.clone()],
                undo: vec![relationship.id.clone()],
            });
        }
        self.touch();
        self.persist(self.storage.add_relationship(&diagram_id, &relationship))
            .await?;
        Ok(relationship)
    }

    pub async fn add_relationships(
        &mut self,
        relationships: Vec<Relationship>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if relationships.is_empty() {
            return Ok(());
        }
        self.insert_relationships(&relationships);
        if options.update_history {
            let undo = relationships.iter().map(|r| r.id.clone()).collect();
            self.history.record(RedoUndoAction::AddRelationships {
                redo: relationships,
                undo,
            });
        }
        self.touch();
        self.persist_relationships(&diagram_id).await
    }

    pub async fn update_relationship(
        &mut self,
        relationship_id: &RelationshipId,
        patch: RelationshipPatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_relationship(relationship_id, &patch) else {
            log::warn!("update_relationship: relationship {relationship_id} not found");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateRelationship {
                relationship_id: relationship_id.clone(),
                redo: patch.clone(),
                undo: inverse,
            });
        }
        self.touch();
        self.persist(
            self.storage
                .update_relationship(&diagram_id, relationship_id, &patch),
        )
        .await
    }

    pub async fn remove_relationship(
        &mut self,
        relationship_id: &RelationshipId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_relationships(std::slice::from_ref(relationship_id));
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveRelationships {
                redo: vec![relationship_id.clone()],
                undo: removed,
            });
        }
        self.touch();
        self.persist(
            self.storage
                .delete_relationship(&diagram_id, relationship_id),
        )
        .await
    }

    pub async fn remove_relationships(
        &mut self,
        relationship_ids: &[RelationshipId],
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_relationships(relationship_ids);
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            let redo = removed.iter().map(|r| r.id.clone()).collect();
            self.history.record(RedoUndoAction::RemoveRelationships {
                redo,
                undo: removed,
            });
        }
        self.touch();
        self.persist_relationships(&diagram_id).await
    }

    // Dependencies.

    pub fn create_dependency(
        &self,
        table_id: &TableId,
        dependent_table_id: &TableId,
    ) -> Dependency {
        Dependency {
            id: DependencyId::generate(),
            table_id: table_id.clone(),
            dependent_table_id: dependent_table_id.clone(),
            schema: self.get_table(table_id).and_then(|t| t.schema.clone()),
        }
    }

    pub async fn add_dependency(
        &mut self,
        dependency: Dependency,
        options: UpdateOptions,
    ) -> Result<Dependency, ContextError> {
        let diagram_id = self.require_loaded()?;
        self.insert_dependencies(std::slice::from_ref(&dependency));
        if options.update_history {
            self.history.record(RedoUndoAction::AddDependencies {
                redo: vec![dependency.clone()],
                undo: vec![dependency.id.clone()],
            });
        }
        self.touch();
        self.persist(self.storage.add_dependency(&diagram_id, &dependency))
            .await?;
        Ok(dependency)
    }

    pub async fn add_dependencies(
        &mut self,
        dependencies: Vec<Dependency>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if dependencies.is_empty() {
            return Ok(());
        }
        self.insert_dependencies(&dependencies);
        if options.update_history {
            let undo = dependencies.iter().map(|d| d.id.clone()).collect();
            self.history.record(RedoUndoAction::AddDependencies {
                redo: dependencies,
                undo,
            });
        }
        self.touch();
        self.persist_dependencies(&diagram_id).await
    }

    pub async fn update_dependency(
        &mut self,
        dependency_id: &DependencyId,
        patch: DependencyPatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_dependency(dependency_id, &patch) else {
            log::warn!("update_dependency: dependency {dependency_id} not found");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateDependency {
                dependency_id: dependency_id.clone(),
                redo: patch.clone(),
                undo: inverse,
            });
        }
        self.touch();
        self.persist(
            self.storage
                .update_dependency(&diagram_id, dependency_id, &patch),
        )
        .await
    }

    pub async fn remove_dependency(
        &mut self,
        dependency_id: &DependencyId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_dependencies(std::slice::from_ref(dependency_id));
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveDependencies {
                redo: vec![dependency_id.clone()],
                undo: removed,
            });
        }
        self.touch();
        self.persist(self.storage.delete_dependency(&diagram_id, dependency_id))
            .await
    }

    pub async fn remove_dependencies(
        &mut self,
        dependency_ids: &[DependencyId],
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_dependencies(dependency_ids);
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            let redo = removed.iter().map(|d| d.id.clone()).collect();
            self.history.record(RedoUndoAction::RemoveDependencies {
                redo,
                undo: removed,
            });
        }
        self.touch();
        self.persist_dependencies(&diagram_id).await
    }

    // Areas.

    pub fn create_area(&self) -> Area {
        Area {
            id: AreaId::generate(),
            name: format!("area_{}", self.areas.len() + 1),
            x: 0.0,
            y: 0.0,
            width: 300.0,
            height: 200.0,
            color: None,
        }
    }

    pub async fn add_area(
        &mut self,
        area: Area,
        options: UpdateOptions,
    ) -> Result<Area, ContextError> {
        let diagram_id = self.require_loaded()?;
        self.insert_areas(std::slice::from_ref(&area));
        if options.update_history {
            self.history.record(RedoUndoAction::AddAreas {
                redo: vec![area.clone()],
                undo: vec![area.id.clone()],
            });
        }
        self.touch();
        self.persist(self.storage.add_area(&diagram_id, &area)).await?;
        Ok(area)
    }

    pub async fn add_areas(
        &mut self,
        areas: Vec<Area>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if areas.is_empty() {
            return Ok(());
        }
        self.insert_areas(&areas);
        if options.update_history {
            let undo = areas.iter().map(|a| a.id.clone()).collect();
            self.history.record(RedoUndoAction::AddAreas { redo: areas, undo });
        }
        self.touch();
        self.persist_areas(&diagram_id).await
    }

    pub async fn update_area(
        &mut self,
        area_id: &AreaId,
        patch: AreaPatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_area(area_id, &patch) else {
            log::warn!("update_area: area {area_id} not found");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateArea {
                area_id: area_id.clone(),
                redo: patch.clone(),
                undo: inverse,
            });
        }
        self.touch();
        self.persist(self.storage.update_area(&diagram_id, area_id, &patch))
            .await
    }

    pub async fn remove_area(
        &mut self,
        area_id: &AreaId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_areas(std::slice::from_ref(area_id));
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveAreas {
                redo: vec![area_id.clone()],
                undo: removed,
            });
        }
        self.touch();
        self.persist(self.storage.delete_area(&diagram_id, area_id))
            .await
    }

    pub async fn remove_areas(
        &mut self,
        area_ids: &[AreaId],
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_areas(area_ids);
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            let redo = removed.iter().map(|a| a.id.clone()).collect();
            self.history.record(RedoUndoAction::RemoveAreas {
                redo,
                undo: removed,
            });
        }
        self.touch();
        self.persist_areas(&diagram_id).await
    }

    // Custom types.

    pub fn create_custom_type(&self) -> CustomType {
        CustomType {
            id: CustomTypeId::generate(),
            name: format!("type_{}", self.custom_types.len() + 1),
            schema: None,
            kind: CustomTypeKind::Enum,
            values: Some(Vec::new()),
            fields: None,
        }
    }

    pub async fn add_custom_type(
        &mut self,
        custom_type: CustomType,
        options: UpdateOptions,
    ) -> Result<CustomType, ContextError> {
        let diagram_id = self.require_loaded()?;
        self.insert_custom_types(std::slice::from_ref(&custom_type));
        if options.update_history {
            self.history.record(RedoUndoAction::AddCustomTypes {
                redo: vec![custom_type.clone()],
                undo: vec![custom_type.id.clone()],
            });
        }
        self.touch();
        self.persist(self.storage.add_custom_type(&diagram_id, &custom_type))
            .await?;
        Ok(custom_type)
    }

    pub async fn add_custom_types(
        &mut self,
        custom_types: Vec<CustomType>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if custom_types.is_empty() {
            return Ok(());
        }
        self.insert_custom_types(&custom_types);
        if options.update_history {
            let undo = custom_types.iter().map(|c| c.id.clone()).collect();
            self.history.record(RedoUndoAction::AddCustomTypes {
                redo: custom_types,
                undo,
            });
        }
        self.touch();
        self.persist_custom_types(&diagram_id).await
    }

    pub async fn update_custom_type(
        &mut self,
        custom_type_id: &CustomTypeId,
        patch: CustomTypePatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_custom_type(custom_type_id, &patch) else {
            log::warn!("update_custom_type: custom type {custom_type_id} not found");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateCustomType {
                custom_type_id: custom_type_id.clone(),
                redo: patch.clone(),
                undo: inverse,
            });
        }
        self.touch();
        self.persist(
            self.storage
                .update_custom_type(&diagram_id, custom_type_id, &patch),
        )
        .await
    }

    pub async fn remove_custom_type(
        &mut self,
        custom_type_id: &CustomTypeId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_custom_types(std::slice::from_ref(custom_type_id));
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveCustomTypes {
                redo: vec![custom_type_id.clone()],
                undo: removed,
            });
        }
        self.touch();
        self.persist(
            self.storage
                .delete_custom_type(&diagram_id, custom_type_id),
        )
        .await
    }

    pub async fn remove_custom_types(
        &mut self,
        custom_type_ids: &[CustomTypeId],
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_custom_types(custom_type_ids);
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            let redo = removed.iter().map(|c| c.id.clone()).collect();
            self.history.record(RedoUndoAction::RemoveCustomTypes {
                redo,
                undo: removed,
            });
        }
        self.touch();
        self.persist_custom_types(&diagram_id).await
    }

    // Notes.

    pub fn create_note(&self) -> Note {
        Note {
            id: NoteId::generate(),
            content: String::new(),
            x: 0.0,
            y: 0.0,
            width: 180.0,
            height: 120.0,
            color: None,
        }
    }

    pub async fn add_note(
        &mut self,
        note: Note,
        options: UpdateOptions,
    ) -> Result<Note, ContextError> {
        let diagram_id = self.require_loaded()?;
        self.insert_notes(std::slice::from_ref(&note));
        if options.update_history {
            self.history.record(RedoUndoAction::AddNotes {
                redo: vec![note.clone()],
                undo: vec![note.id.clone()],
            });
        }
        self.touch();
        self.persist(self.storage.add_note(&diagram_id, &note)).await?;
        Ok(note)
    }

    pub async fn add_notes(
        &mut self,
        notes: Vec<Note>,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        if notes.is_empty() {
            return Ok(());
        }
        self.insert_notes(&notes);
        if options.update_history {
            let undo = notes.iter().map(|n| n.id.clone()).collect();
            self.history.record(RedoUndoAction::AddNotes { redo: notes, undo });
        }
        self.touch();
        self.persist_notes(&diagram_id).await
    }

    pub async fn update_note(
        &mut self,
        note_id: &NoteId,
        patch: NotePatch,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let Some(inverse) = self.patch_note(note_id, &patch) else {
            log::warn!("update_note: note {note_id} not found");
            return Ok(());
        };
        if options.update_history {
            self.history.record(RedoUndoAction::UpdateNote {
                note_id: note_id.clone(),
                redo: patch.clone(),
                undo: inverse,
            });
        }
        self.touch();
        self.persist(self.storage.update_note(&diagram_id, note_id, &patch))
            .await
    }

    pub async fn remove_note(
        &mut self,
        note_id: &NoteId,
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_notes(std::slice::from_ref(note_id));
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            self.history.record(RedoUndoAction::RemoveNotes {
                redo: vec![note_id.clone()],
                undo: removed,
            });
        }
        self.touch();
        self.persist(self.storage.delete_note(&diagram_id, note_id))
            .await
    }

    pub async fn remove_notes(
        &mut self,
        note_ids: &[NoteId],
        options: UpdateOptions,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        let removed = self.take_notes(note_ids);
        if removed.is_empty() {
            return Ok(());
        }
        if options.update_history {
            let redo = removed.iter().map(|n| n.id.clone()).collect();
            self.history.record(RedoUndoAction::RemoveNotes {
                redo,
                undo: removed,
            });
        }
        self.touch();
        self.persist_notes(&diagram_id).await
    }

    // History.

    /// Reverses the most recent recorded mutation. `Ok(false)` when there is
    /// nothing to undo. The replayed entry moves to the redo stack even if
    /// its persistence fails, keeping the stacks consistent with local state.
    pub async fn undo(&mut self) -> Result<bool, ContextError> {
        let Some(action) = self.history.pop_undo() else {
            return Ok(false);
        };
        let result = self.replay(&action, ReplayDirection::Undo).await;
        self.history.push_redo(action);
        result.map(|()| true)
    }

    /// Re-applies the most recently undone mutation. `Ok(false)` when there
    /// is nothing to redo.
    pub async fn redo(&mut self) -> Result<bool, ContextError> {
        let Some(action) = self.history.pop_redo() else {
            return Ok(false);
        };
        let result = self.replay(&action, ReplayDirection::Redo).await;
        self.history.push_undo(action);
        result.map(|()| true)
    }
}

// Entity-store primitives, replay dispatch and persistence helpers.
include!("context_impl.rs");

#[cfg(test)]
mod tests;
