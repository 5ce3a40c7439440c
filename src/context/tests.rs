// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rstest::{fixture, rstest};

use super::{ContextError, DiagramContext, DiagramEvent, UpdateOptions};
use crate::model::{
    Area, AreaId, AreaPatch, Cardinality, CustomType, CustomTypeId, CustomTypePatch,
    DatabaseEdition, DatabaseType, Dependency, DependencyId, DependencyPatch, Diagram, DiagramId,
    DiagramPatch, Field, FieldId, FieldPatch, FieldType, IndexPatch, Note, NoteId, NotePatch,
    Relationship, RelationshipId, RelationshipPatch, Table, TableId, TablePatch,
};
use crate::store::{IncludeOptions, Storage, StorageError};

/// In-memory store. Writes can be switched to fail to exercise the
/// optimistic-persistence paths; every write is counted either way.
#[derive(Default)]
struct MemoryStore {
    diagrams: Mutex<HashMap<DiagramId, Diagram>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    fn seed(&self, diagram: Diagram) {
        self.diagrams
            .lock()
            .unwrap()
            .insert(diagram.id.clone(), diagram);
    }

    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn stored(&self, id: &DiagramId) -> Option<Diagram> {
        self.diagrams.lock().unwrap().get(id).cloned()
    }

    fn guard(&self) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Status {
                url: "memory".into(),
                status: 500,
            })
        } else {
            Ok(())
        }
    }

    fn with<R>(&self, id: &DiagramId, f: impl FnOnce(&mut Diagram) -> R) -> Option<R> {
        self.diagrams.lock().unwrap().get_mut(id).map(f)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn add_diagram(&self, diagram: &Diagram) -> Result<(), StorageError> {
        self.guard()?;
        self.seed(diagram.clone());
        Ok(())
    }

    async fn get_diagram(
        &self,
        id: &DiagramId,
        include: &IncludeOptions,
    ) -> Result<Option<Diagram>, StorageError> {
        let Some(mut diagram) = self.stored(id) else {
            return Ok(None);
        };
        if !include.tables {
            diagram.tables = None;
        }
        if !include.relationships {
            diagram.relationships = None;
        }
        if !include.dependencies {
            diagram.dependencies = None;
        }
        if !include.areas {
            diagram.areas = None;
        }
        if !include.custom_types {
            diagram.custom_types = None;
        }
        if !include.notes {
            diagram.notes = None;
        }
        Ok(Some(diagram))
    }

    async fn list_diagrams(&self, _include: &IncludeOptions) -> Result<Vec<Diagram>, StorageError> {
        Ok(self.diagrams.lock().unwrap().values().cloned().collect())
    }

    async fn update_diagram(
        &self,
        id: &DiagramId,
        patch: &DiagramPatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(id, |d| d.apply_patch(patch));
        Ok(())
    }

    async fn delete_diagram(&self, id: &DiagramId) -> Result<(), StorageError> {
        self.guard()?;
        self.diagrams.lock().unwrap().remove(id);
        Ok(())
    }

    async fn add_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.tables.get_or_insert_with(Vec::new).push(table.clone());
        });
        Ok(())
    }

    async fn get_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<Option<Table>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.tables)
            .and_then(|tables| tables.into_iter().find(|t| &t.id == id)))
    }

    async fn update_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
        patch: &TablePatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            if let Some(table) = d
                .tables
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|t| &t.id == id)
            {
                table.apply_patch(patch);
            }
        });
        Ok(())
    }

    async fn put_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            let tables = d.tables.get_or_insert_with(Vec::new);
            match tables.iter_mut().find(|t| t.id == table.id) {
                Some(existing) => *existing = table.clone(),
                None => tables.push(table.clone()),
            }
        });
        Ok(())
    }

    async fn delete_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.tables.get_or_insert_with(Vec::new).retain(|t| &t.id != id);
        });
        Ok(())
    }

    async fn list_tables(&self, diagram_id: &DiagramId) -> Result<Vec<Table>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.tables)
            .unwrap_or_default())
    }

    async fn delete_diagram_tables(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| d.tables = Some(Vec::new()));
        Ok(())
    }

    async fn add_relationship(
        &self,
        diagram_id: &DiagramId,
        relationship: &Relationship,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.relationships
                .get_or_insert_with(Vec::new)
                .push(relationship.clone());
        });
        Ok(())
    }

    async fn get_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<Option<Relationship>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.relationships)
            .and_then(|rels| rels.into_iter().find(|r| &r.id == id)))
    }

    async fn update_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
        patch: &RelationshipPatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            if let Some(rel) = d
                .relationships
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|r| &r.id == id)
            {
                rel.apply_patch(patch);
            }
        });
        Ok(())
    }

    async fn delete_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.relationships
                .get_or_insert_with(Vec::new)
                .retain(|r| &r.id != id);
        });
        Ok(())
    }

    async fn list_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Relationship>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.relationships)
            .unwrap_or_default())
    }

    async fn delete_diagram_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| d.relationships = Some(Vec::new()));
        Ok(())
    }

    async fn add_dependency(
        &self,
        diagram_id: &DiagramId,
        dependency: &Dependency,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.dependencies
                .get_or_insert_with(Vec::new)
                .push(dependency.clone());
        });
        Ok(())
    }

    async fn get_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<Option<Dependency>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.dependencies)
            .and_then(|deps| deps.into_iter().find(|dep| &dep.id == id)))
    }

    async fn update_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
        patch: &DependencyPatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            if let Some(dep) = d
                .dependencies
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|dep| &dep.id == id)
            {
                dep.apply_patch(patch);
            }
        });
        Ok(())
    }

    async fn delete_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.dependencies
                .get_or_insert_with(Vec::new)
                .retain(|dep| &dep.id != id);
        });
        Ok(())
    }

    async fn list_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Dependency>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.dependencies)
            .unwrap_or_default())
    }

    async fn delete_diagram_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| d.dependencies = Some(Vec::new()));
        Ok(())
    }

    async fn add_area(&self, diagram_id: &DiagramId, area: &Area) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.areas.get_or_insert_with(Vec::new).push(area.clone());
        });
        Ok(())
    }

    async fn get_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
    ) -> Result<Option<Area>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.areas)
            .and_then(|areas| areas.into_iter().find(|a| &a.id == id)))
    }

    async fn update_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
        patch: &AreaPatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            if let Some(area) = d
                .areas
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|a| &a.id == id)
            {
                area.apply_patch(patch);
            }
        });
        Ok(())
    }

    async fn delete_area(&self, diagram_id: &DiagramId, id: &AreaId) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.areas.get_or_insert_with(Vec::new).retain(|a| &a.id != id);
        });
        Ok(())
    }

    async fn list_areas(&self, diagram_id: &DiagramId) -> Result<Vec<Area>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.areas)
            .unwrap_or_default())
    }

    async fn delete_diagram_areas(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| d.areas = Some(Vec::new()));
        Ok(())
    }

    async fn add_custom_type(
        &self,
        diagram_id: &DiagramId,
        custom_type: &CustomType,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.custom_types
                .get_or_insert_with(Vec::new)
                .push(custom_type.clone());
        });
        Ok(())
    }

    async fn get_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<Option<CustomType>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.custom_types)
            .and_then(|cts| cts.into_iter().find(|c| &c.id == id)))
    }

    async fn update_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
        patch: &CustomTypePatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            if let Some(ct) = d
                .custom_types
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|c| &c.id == id)
            {
                ct.apply_patch(patch);
            }
        });
        Ok(())
    }

    async fn delete_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.custom_types
                .get_or_insert_with(Vec::new)
                .retain(|c| &c.id != id);
        });
        Ok(())
    }

    async fn list_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<CustomType>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.custom_types)
            .unwrap_or_default())
    }

    async fn delete_diagram_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| d.custom_types = Some(Vec::new()));
        Ok(())
    }

    async fn add_note(&self, diagram_id: &DiagramId, note: &Note) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.notes.get_or_insert_with(Vec::new).push(note.clone());
        });
        Ok(())
    }

    async fn get_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
    ) -> Result<Option<Note>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.notes)
            .and_then(|notes| notes.into_iter().find(|n| &n.id == id)))
    }

    async fn update_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
        patch: &NotePatch,
    ) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            if let Some(note) = d
                .notes
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|n| &n.id == id)
            {
                note.apply_patch(patch);
            }
        });
        Ok(())
    }

    async fn delete_note(&self, diagram_id: &DiagramId, id: &NoteId) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| {
            d.notes.get_or_insert_with(Vec::new).retain(|n| &n.id != id);
        });
        Ok(())
    }

    async fn list_notes(&self, diagram_id: &DiagramId) -> Result<Vec<Note>, StorageError> {
        Ok(self
            .stored(diagram_id)
            .and_then(|d| d.notes)
            .unwrap_or_default())
    }

    async fn delete_diagram_notes(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.guard()?;
        self.with(diagram_id, |d| d.notes = Some(Vec::new()));
        Ok(())
    }
}

fn pk_field(name: &str) -> Field {
    let mut field = Field::new(FieldId::generate(), name, FieldType::named("bigint"));
    field.primary_key = true;
    field.unique = true;
    field.nullable = false;
    field
}

fn plain_field(name: &str, type_name: &str) -> Field {
    Field::new(FieldId::generate(), name, FieldType::named(type_name))
}

fn sample_diagram() -> Diagram {
    let mut users = Table::new(TableId::generate(), "users");
    users.fields.push(pk_field("id"));
    users.fields.push(plain_field("email", "varchar"));

    let mut orders = Table::new(TableId::generate(), "orders");
    orders.fields.push(pk_field("id"));
    orders.fields.push(plain_field("user_id", "bigint"));

    let fk = Relationship {
        id: RelationshipId::generate(),
        name: "orders_user_id_fk".into(),
        source_table_id: users.id.clone(),
        source_field_id: users.fields[0].id.clone(),
        target_table_id: orders.id.clone(),
        target_field_id: orders.fields[1].id.clone(),
        source_cardinality: Cardinality::One,
        target_cardinality: Cardinality::Many,
    };
    let dep = Dependency {
        id: DependencyId::generate(),
        table_id: users.id.clone(),
        dependent_table_id: orders.id.clone(),
        schema: None,
    };

    let mut diagram = Diagram::new(
        DiagramId::new("inventory").unwrap(),
        "inventory",
        DatabaseType::Postgresql,
    );
    diagram.tables = Some(vec![users, orders]);
    diagram.relationships = Some(vec![fk]);
    diagram.dependencies = Some(vec![dep]);
    diagram.areas = Some(Vec::new());
    diagram.custom_types = Some(Vec::new());
    diagram.notes = Some(Vec::new());
    diagram
}

struct Ctx {
    context: DiagramContext,
    store: Arc<MemoryStore>,
}

#[fixture]
fn ctx() -> Ctx {
    let store = Arc::new(MemoryStore::default());
    store.seed(sample_diagram());
    let storage: Arc<dyn Storage> = store.clone();
    let mut context = DiagramContext::new(storage);
    context.load_diagram_from_data(sample_diagram());
    Ctx { context, store }
}

fn graph_of(context: &DiagramContext) -> (Vec<Table>, Vec<Relationship>, Vec<Dependency>) {
    (
        context.tables().to_vec(),
        context.relationships().to_vec(),
        context.dependencies().to_vec(),
    )
}

#[rstest]
#[tokio::test]
async fn operations_require_a_loaded_diagram() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStore::default());
    let mut context = DiagramContext::new(storage);
    let err = context
        .add_table(Table::new(TableId::generate(), "t"), UpdateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::NoDiagram));
}

#[rstest]
#[tokio::test]
async fn add_then_remove_then_three_undos_restores_the_initial_state(ctx: Ctx) {
    let mut ctx = ctx;
    let initial = graph_of(&ctx.context);

    let table = ctx.context.create_table();
    let table = ctx
        .context
        .add_table(table, UpdateOptions::default())
        .await
        .unwrap();
    let field = ctx.context.create_field(&table.id);
    ctx.context
        .add_field(&table.id, field, UpdateOptions::default())
        .await
        .unwrap();
    ctx.context
        .remove_table(&table.id, UpdateOptions::default())
        .await
        .unwrap();

    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.undo().await.unwrap());

    assert_eq!(graph_of(&ctx.context), initial);
    assert!(!ctx.context.can_undo());
    assert!(ctx.context.can_redo());
}

#[rstest]
#[tokio::test]
async fn undo_then_redo_round_trips_to_the_same_state(ctx: Ctx) {
    let mut ctx = ctx;
    let table = ctx.context.create_table();
    ctx.context
        .add_table(table.clone(), UpdateOptions::default())
        .await
        .unwrap();
    ctx.context
        .update_table(
            &table.id,
            TablePatch {
                name: Some("archived".into()),
                ..TablePatch::default()
            },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    let edited = graph_of(&ctx.context);

    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.redo().await.unwrap());
    assert!(ctx.context.redo().await.unwrap());

    assert_eq!(graph_of(&ctx.context), edited);
    assert!(!ctx.context.can_redo());
}

#[rstest]
#[tokio::test]
async fn removing_a_table_cascades_and_one_undo_restores_everything(ctx: Ctx) {
    let mut ctx = ctx;
    let initial = graph_of(&ctx.context);
    let users_id = ctx.context.tables()[0].id.clone();

    ctx.context
        .remove_table(&users_id, UpdateOptions::default())
        .await
        .unwrap();
    assert_eq!(ctx.context.tables().len(), 1);
    assert!(ctx.context.relationships().is_empty());
    assert!(ctx.context.dependencies().is_empty());

    assert!(ctx.context.undo().await.unwrap());
    let restored = graph_of(&ctx.context);
    assert_eq!(restored.0.len(), initial.0.len());
    assert_eq!(restored.1, initial.1);
    assert_eq!(restored.2, initial.2);
}

#[rstest]
#[tokio::test]
async fn removing_a_field_cascades_its_relationships(ctx: Ctx) {
    let mut ctx = ctx;
    let orders = ctx.context.tables()[1].clone();
    let user_id_field = orders.fields[1].id.clone();

    ctx.context
        .remove_field(&orders.id, &user_id_field, UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.relationships().is_empty());

    assert!(ctx.context.undo().await.unwrap());
    assert_eq!(ctx.context.relationships().len(), 1);
    assert!(ctx
        .context
        .get_field(&orders.id, &user_id_field)
        .is_some());
}

#[rstest]
#[tokio::test]
async fn bulk_add_is_one_history_entry(ctx: Ctx) {
    let mut ctx = ctx;
    let batch = vec![
        Table::new(TableId::generate(), "a"),
        Table::new(TableId::generate(), "b"),
        Table::new(TableId::generate(), "c"),
    ];
    ctx.context
        .add_tables(batch, UpdateOptions::default())
        .await
        .unwrap();
    assert_eq!(ctx.context.tables().len(), 5);

    assert!(ctx.context.undo().await.unwrap());
    assert_eq!(ctx.context.tables().len(), 2);
}

#[rstest]
#[tokio::test]
async fn a_new_mutation_clears_the_redo_stack(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.can_redo());

    ctx.context
        .add_note(ctx.context.create_note(), UpdateOptions::default())
        .await
        .unwrap();
    assert!(!ctx.context.can_redo());
}

#[rstest]
#[tokio::test]
async fn skipping_history_records_nothing(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .add_table(ctx.context.create_table(), UpdateOptions::skip_history())
        .await
        .unwrap();
    assert!(!ctx.context.can_undo());
}

#[rstest]
#[tokio::test]
async fn loading_a_diagram_clears_both_stacks(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.can_redo());

    let loaded = ctx
        .context
        .load_diagram(&DiagramId::new("inventory").unwrap())
        .await
        .unwrap();
    assert!(loaded.is_some());
    assert!(!ctx.context.can_undo());
    assert!(!ctx.context.can_redo());
}

#[rstest]
#[tokio::test]
async fn loading_a_missing_diagram_returns_none(ctx: Ctx) {
    let mut ctx = ctx;
    let loaded = ctx
        .context
        .load_diagram(&DiagramId::new("absent").unwrap())
        .await
        .unwrap();
    assert!(loaded.is_none());
    assert!(ctx.context.diagram_id().is_none());
}

#[rstest]
#[tokio::test]
async fn a_failed_load_leaves_no_stale_diagram_data(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.can_undo());

    let loaded = ctx
        .context
        .load_diagram(&DiagramId::new("absent").unwrap())
        .await
        .unwrap();
    assert!(loaded.is_none());

    // Nothing from the previously loaded diagram may survive.
    assert!(ctx.context.diagram_id().is_none());
    assert!(ctx.context.tables().is_empty());
    assert!(ctx.context.relationships().is_empty());
    assert!(ctx.context.dependencies().is_empty());
    assert!(!ctx.context.can_undo());
    assert!(!ctx.context.can_redo());
}

#[rstest]
#[tokio::test]
async fn a_failed_write_keeps_local_state_and_pending_sync(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.store.fail_writes(true);

    let table = ctx.context.create_table();
    let err = ctx
        .context
        .add_table(table.clone(), UpdateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::Storage { .. }));

    assert!(ctx.context.get_table(&table.id).is_some());
    assert!(ctx.context.can_undo());
    assert!(ctx.context.pending_sync());

    // The next successful write carries a higher version and clears it.
    ctx.store.fail_writes(false);
    ctx.context
        .update_diagram_name("recovered", UpdateOptions::default())
        .await
        .unwrap();
    assert!(!ctx.context.pending_sync());
}

#[rstest]
#[tokio::test]
async fn undo_moves_the_entry_even_when_persistence_fails(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();

    ctx.store.fail_writes(true);
    let err = ctx.context.undo().await.unwrap_err();
    assert!(matches!(err, ContextError::Storage { .. }));
    assert_eq!(ctx.context.tables().len(), 2);
    assert!(ctx.context.can_redo());
}

#[rstest]
#[tokio::test]
async fn update_patch_round_trips_exactly(ctx: Ctx) {
    let mut ctx = ctx;
    let users = ctx.context.tables()[0].clone();
    ctx.context
        .update_table(
            &users.id,
            TablePatch {
                name: Some("accounts".into()),
                x: Some(120.0),
                color: Some(Some("#ff0000".into())),
                ..TablePatch::default()
            },
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert!(ctx.context.undo().await.unwrap());
    assert_eq!(ctx.context.tables()[0], users);
}

#[rstest]
#[tokio::test]
async fn field_updates_undo_to_the_previous_attributes(ctx: Ctx) {
    let mut ctx = ctx;
    let users = ctx.context.tables()[0].clone();
    let email = users.fields[1].clone();

    ctx.context
        .update_field(
            &users.id,
            &email.id,
            FieldPatch {
                name: Some("contact_email".into()),
                nullable: Some(false),
                ..FieldPatch::default()
            },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        ctx.context.get_field(&users.id, &email.id).unwrap().name,
        "contact_email"
    );

    assert!(ctx.context.undo().await.unwrap());
    assert_eq!(ctx.context.get_field(&users.id, &email.id).unwrap(), &email);
}

#[rstest]
#[tokio::test]
async fn changing_database_type_drops_an_invalid_edition(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .update_database_edition(Some(DatabaseEdition::Supabase))
        .await
        .unwrap();
    assert_eq!(
        ctx.context.database_edition(),
        Some(DatabaseEdition::Supabase)
    );

    ctx.context
        .update_database_type(DatabaseType::Mysql)
        .await
        .unwrap();
    assert_eq!(ctx.context.database_edition(), None);
}

#[rstest]
#[tokio::test]
async fn custom_type_usage_follows_field_types(ctx: Ctx) {
    let mut ctx = ctx;
    assert!(!ctx.context.custom_type_used("mood"));

    let users_id = ctx.context.tables()[0].id.clone();
    let field = Field::new(FieldId::generate(), "mood", FieldType::named("mood"));
    ctx.context
        .add_field(&users_id, field, UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.custom_type_used("mood"));
}

#[rstest]
#[tokio::test]
async fn created_relationship_derives_name_and_cardinality(ctx: Ctx) {
    let ctx = ctx;
    let users = ctx.context.tables()[0].clone();
    let orders = ctx.context.tables()[1].clone();

    let rel = ctx
        .context
        .create_relationship(
            &users.id,
            &users.fields[0].id,
            &orders.id,
            &orders.fields[1].id,
        )
        .unwrap();
    assert_eq!(rel.name, "users_id_fk");
    assert_eq!(rel.source_cardinality, Cardinality::One);
    assert_eq!(rel.target_cardinality, Cardinality::Many);
}

#[rstest]
#[tokio::test]
async fn clear_diagram_data_empties_collections_and_history(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context
        .add_note(ctx.context.create_note(), UpdateOptions::default())
        .await
        .unwrap();
    ctx.context.clear_diagram_data().await.unwrap();

    assert!(ctx.context.tables().is_empty());
    assert!(ctx.context.relationships().is_empty());
    assert!(ctx.context.notes().is_empty());
    assert!(!ctx.context.can_undo());

    let stored = ctx
        .store
        .stored(&DiagramId::new("inventory").unwrap())
        .unwrap();
    assert_eq!(stored.tables, Some(Vec::new()));
}

#[rstest]
#[tokio::test]
async fn delete_diagram_resets_to_the_unloaded_state(ctx: Ctx) {
    let mut ctx = ctx;
    ctx.context.delete_diagram().await.unwrap();
    assert!(ctx.context.diagram_id().is_none());
    assert!(ctx
        .store
        .stored(&DiagramId::new("inventory").unwrap())
        .is_none());

    let err = ctx
        .context
        .add_note(Note {
            id: NoteId::generate(),
            content: "orphan".into(),
            x: 0.0,
            y: 0.0,
            width: 180.0,
            height: 120.0,
            color: None,
        }, UpdateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::NoDiagram));
}

#[rstest]
#[tokio::test]
async fn update_diagram_id_rewrites_the_stored_record(ctx: Ctx) {
    let mut ctx = ctx;
    let new_id = DiagramId::new("warehouse").unwrap();
    ctx.context.update_diagram_id(new_id.clone()).await.unwrap();

    assert_eq!(ctx.context.diagram_id(), Some(&new_id));
    assert!(ctx.store.stored(&new_id).is_some());
    assert!(ctx
        .store
        .stored(&DiagramId::new("inventory").unwrap())
        .is_none());
}

#[rstest]
#[tokio::test]
async fn index_ops_round_trip_through_history(ctx: Ctx) {
    let mut ctx = ctx;
    let users_id = ctx.context.tables()[0].id.clone();
    let mut index = ctx.context.create_index(&users_id);
    index.field_ids.push(ctx.context.tables()[0].fields[1].id.clone());

    let index = ctx
        .context
        .add_index(&users_id, index, UpdateOptions::default())
        .await
        .unwrap();
    ctx.context
        .update_index(
            &users_id,
            &index.id,
            IndexPatch {
                unique: Some(true),
                ..IndexPatch::default()
            },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    ctx.context
        .remove_index(&users_id, &index.id, UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.get_index(&users_id, &index.id).is_none());

    assert!(ctx.context.undo().await.unwrap());
    assert!(ctx.context.undo().await.unwrap());
    let restored = ctx.context.get_index(&users_id, &index.id).unwrap();
    assert!(!restored.unique);
}

#[rstest]
#[tokio::test]
async fn events_fire_in_mutation_order(ctx: Ctx) {
    let mut ctx = ctx;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.context.subscribe(move |event: &DiagramEvent| {
        sink.lock().unwrap().push(event.kind().to_string());
    });

    let table = ctx
        .context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();
    ctx.context
        .remove_table(&table.id, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["add_tables", "remove_tables"]);
}

#[rstest]
#[tokio::test]
async fn each_operation_notifies_exactly_once(ctx: Ctx) {
    let mut ctx = ctx;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.context.subscribe(move |event: &DiagramEvent| {
        sink.lock().unwrap().push(event.kind().to_string());
    });

    let table = ctx
        .context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();
    let field = ctx
        .context
        .add_field(
            &table.id,
            ctx.context.create_field(&table.id),
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    ctx.context
        .update_field(
            &table.id,
            &field.id,
            FieldPatch {
                name: Some("renamed".to_owned()),
                ..FieldPatch::default()
            },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    ctx.context
        .add_index(
            &table.id,
            ctx.context.create_index(&table.id),
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    ctx.context
        .remove_table(&table.id, UpdateOptions::default())
        .await
        .unwrap();
    assert!(ctx.context.undo().await.unwrap());

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "add_tables",
            "add_field",
            "update_table",
            "update_table",
            "remove_tables",
            "add_tables",
        ]
    );
}

#[rstest]
#[tokio::test]
async fn replacing_the_table_list_notifies_once(ctx: Ctx) {
    let mut ctx = ctx;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.context.subscribe(move |event: &DiagramEvent| {
        sink.lock().unwrap().push(event.clone());
    });

    // Drops users and orders, cascading the fk and the dependency.
    ctx.context
        .update_tables_state(vec![ctx.context.create_table()], UpdateOptions::default())
        .await
        .unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            DiagramEvent::AddTables { tables } => assert_eq!(tables.len(), 1),
            other => panic!("unexpected event {}", other.kind()),
        }
    }

    assert!(ctx.context.undo().await.unwrap());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    match &seen[1] {
        DiagramEvent::AddTables { tables } => assert_eq!(tables.len(), 2),
        other => panic!("unexpected event {}", other.kind()),
    }
}

#[rstest]
#[tokio::test]
async fn every_successful_write_reaches_the_store(ctx: Ctx) {
    let mut ctx = ctx;
    let before = ctx.store.write_count();
    let table = ctx
        .context
        .add_table(ctx.context.create_table(), UpdateOptions::default())
        .await
        .unwrap();
    assert_eq!(ctx.store.write_count(), before + 1);

    let stored = ctx
        .store
        .stored(&DiagramId::new("inventory").unwrap())
        .unwrap();
    assert!(stored
        .tables
        .unwrap()
        .iter()
        .any(|t| t.id == table.id));
}
