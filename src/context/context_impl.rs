// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

// Included from mod.rs. Private mutation primitives, persistence helpers
// and the history replay dispatch live here; the public operation surface
// stays in mod.rs.

impl DiagramContext {
    fn require_loaded(&self) -> Result<DiagramId, ContextError> {
        match &self.session {
            SessionState::Loaded { diagram_id } => Ok(diagram_id.clone()),
            SessionState::Loading => Err(ContextError::Loading),
            SessionState::Unloaded => Err(ContextError::NoDiagram),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn install_diagram(&mut self, diagram: Diagram) {
        self.session = SessionState::Loaded {
            diagram_id: diagram.id.clone(),
        };
        self.diagram_name = diagram.name;
        self.database_type = diagram.database_type;
        self.database_edition = diagram.database_edition;
        self.created_at = diagram.created_at;
        self.updated_at = diagram.updated_at;
        self.tables = diagram.tables.unwrap_or_default();
        self.relationships = diagram.relationships.unwrap_or_default();
        self.dependencies = diagram.dependencies.unwrap_or_default();
        self.areas = diagram.areas.unwrap_or_default();
        self.custom_types = diagram.custom_types.unwrap_or_default();
        self.notes = diagram.notes.unwrap_or_default();
        self.history.clear();

        let snapshot = self.diagram_snapshot(diagram.id);
        self.events.emit(&DiagramEvent::LoadDiagram { diagram: snapshot });
    }

    // Back to the unloaded state. Getters must never serve data from a
    // diagram that is no longer the session.
    fn reset_to_unloaded(&mut self) {
        self.updated_at_debouncer.cancel();
        self.session = SessionState::Unloaded;
        self.tables.clear();
        self.relationships.clear();
        self.dependencies.clear();
        self.areas.clear();
        self.custom_types.clear();
        self.notes.clear();
        self.history.clear();
    }

    fn diagram_snapshot(&self, diagram_id: DiagramId) -> Diagram {
        Diagram {
            id: diagram_id,
            name: self.diagram_name.clone(),
            database_type: self.database_type,
            database_edition: self.database_edition,
            tables: Some(self.tables.clone()),
            relationships: Some(self.relationships.clone()),
            dependencies: Some(self.dependencies.clone()),
            areas: Some(self.areas.clone()),
            custom_types: Some(self.custom_types.clone()),
            notes: Some(self.notes.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    // Persistence. Every write takes a sync version first and acknowledges
    // it only on success; a failed write leaves `pending_sync` set.

    async fn persist<F>(&self, write: F) -> Result<(), ContextError>
    where
        F: std::future::Future<Output = Result<(), StorageError>>,
    {
        let version = self.sync.issue();
        match write.await {
            Ok(()) => {
                self.sync.ack(version);
                Ok(())
            }
            Err(source) => Err(ContextError::Storage { source }),
        }
    }

    /// One write carrying tables, relationships and dependencies, for
    /// mutations that may have cascaded across all three.
    async fn persist_graph(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            tables: Some(self.tables.clone()),
            relationships: Some(self.relationships.clone()),
            dependencies: Some(self.dependencies.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    async fn persist_tables(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            tables: Some(self.tables.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    /// Writes one table back wholesale. A table that no longer exists
    /// locally is nothing to persist.
    async fn persist_table(
        &self,
        diagram_id: &DiagramId,
        table_id: &TableId,
    ) -> Result<(), ContextError> {
        let Some(table) = self.get_table(table_id).cloned() else {
            return Ok(());
        };
        self.persist(self.storage.put_table(diagram_id, &table)).await
    }

    async fn persist_relationships(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            relationships: Some(self.relationships.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    async fn persist_dependencies(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            dependencies: Some(self.dependencies.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    async fn persist_areas(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            areas: Some(self.areas.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    async fn persist_custom_types(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            custom_types: Some(self.custom_types.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    async fn persist_notes(&self, diagram_id: &DiagramId) -> Result<(), ContextError> {
        let patch = DiagramPatch {
            notes: Some(self.notes.clone()),
            updated_at: Some(self.updated_at),
            ..DiagramPatch::default()
        };
        self.persist(self.storage.update_diagram(diagram_id, &patch))
            .await
    }

    // Table primitives. These mutate local state only; recording history,
    // emitting the event and persisting are the caller's job, in that
    // order.

    fn insert_tables(&mut self, tables: &[Table]) {
        self.tables.extend_from_slice(tables);
    }

    /// Removes the named tables and cascades every relationship and
    /// dependency touching them. Unknown ids are skipped.
    fn take_tables(&mut self, table_ids: &[TableId]) -> RemovedTables {
        let mut removed = RemovedTables::default();
        self.tables.retain(|table| {
            if table_ids.contains(&table.id) {
                removed.tables.push(table.clone());
                false
            } else {
                true
            }
        });
        if removed.tables.is_empty() {
            return removed;
        }

        let removed_ids: Vec<TableId> = removed.tables.iter().map(|t| t.id.clone()).collect();
        self.relationships.retain(|rel| {
            if removed_ids.iter().any(|id| rel.references_table(id)) {
                removed.relationships.push(rel.clone());
                false
            } else {
                true
            }
        });
        self.dependencies.retain(|dep| {
            if removed_ids.iter().any(|id| dep.references_table(id)) {
                removed.dependencies.push(dep.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn restore_tables(&mut self, snapshot: &RemovedTables) {
        self.tables.extend_from_slice(&snapshot.tables);
        self.relationships.extend_from_slice(&snapshot.relationships);
        self.dependencies.extend_from_slice(&snapshot.dependencies);
    }

    /// Swaps in a whole new table list and cascades edges that lost an
    /// endpoint. Returns the previous state including the cascaded edges.
    fn replace_tables_state(&mut self, tables: &[Table]) -> RemovedTables {
        let mut previous = RemovedTables {
            tables: std::mem::replace(&mut self.tables, tables.to_vec()),
            relationships: Vec::new(),
            dependencies: Vec::new(),
        };

        let kept: Vec<TableId> = self.tables.iter().map(|t| t.id.clone()).collect();
        self.relationships.retain(|rel| {
            let intact = kept.contains(&rel.source_table_id) && kept.contains(&rel.target_table_id);
            if !intact {
                previous.relationships.push(rel.clone());
            }
            intact
        });
        self.dependencies.retain(|dep| {
            let intact = kept.contains(&dep.table_id) && kept.contains(&dep.dependent_table_id);
            if !intact {
                previous.dependencies.push(dep.clone());
            }
            intact
        });
        previous
    }

    /// Reverse of [`replace_tables_state`]: the old table list comes back
    /// and the cascaded edges rejoin their collections.
    ///
    /// [`replace_tables_state`]: DiagramContext::replace_tables_state
    fn restore_tables_state(&mut self, snapshot: &RemovedTables) {
        self.tables = snapshot.tables.clone();
        self.relationships.extend_from_slice(&snapshot.relationships);
        self.dependencies.extend_from_slice(&snapshot.dependencies);
    }

    fn patch_table(&mut self, table_id: &TableId, patch: &TablePatch) -> Option<TablePatch> {
        let table = self.tables.iter_mut().find(|t| &t.id == table_id)?;
        let inverse = table.inverse_patch(patch);
        table.apply_patch(patch);
        Some(inverse)
    }

    // Field primitives.

    fn insert_field(&mut self, table_id: &TableId, field: &Field) -> bool {
        let Some(table) = self.tables.iter_mut().find(|t| &t.id == table_id) else {
            return false;
        };
        table.fields.push(field.clone());
        true
    }

    /// Removes a field and cascades every relationship referencing it.
    fn take_field(&mut self, table_id: &TableId, field_id: &FieldId) -> Option<RemovedField> {
        let table = self.tables.iter_mut().find(|t| &t.id == table_id)?;
        let position = table.fields.iter().position(|f| &f.id == field_id)?;
        let field = table.fields.remove(position);

        let mut removed = RemovedField {
            field,
            relationships: Vec::new(),
        };
        self.relationships.retain(|rel| {
            if rel.references_field(field_id) {
                removed.relationships.push(rel.clone());
                false
            } else {
                true
            }
        });
        Some(removed)
    }

    fn restore_field(&mut self, table_id: &TableId, snapshot: &RemovedField) {
        let Some(table) = self.tables.iter_mut().find(|t| &t.id == table_id) else {
            log::warn!("restore_field: table {table_id} not found");
            return;
        };
        table.fields.push(snapshot.field.clone());
        self.relationships.extend_from_slice(&snapshot.relationships);
    }

    fn patch_field(
        &mut self,
        table_id: &TableId,
        field_id: &FieldId,
        patch: &FieldPatch,
    ) -> Option<FieldPatch> {
        let table = self.tables.iter_mut().find(|t| &t.id == table_id)?;
        let field = table.fields.iter_mut().find(|f| &f.id == field_id)?;
        let inverse = field.inverse_patch(patch);
        field.apply_patch(patch);
        Some(inverse)
    }

    // Index primitives.

    fn insert_index(&mut self, table_id: &TableId, index: &Index) -> bool {
        let Some(table) = self.tables.iter_mut().find(|t| &t.id == table_id) else {
            return false;
        };
        table.indexes.push(index.clone());
        true
    }

    fn take_index(&mut self, table_id: &TableId, index_id: &IndexId) -> Option<Index> {
        let table = self.tables.iter_mut().find(|t| &t.id == table_id)?;
        let position = table.indexes.iter().position(|i| &i.id == index_id)?;
        Some(table.indexes.remove(position))
    }

    fn patch_index(
        &mut self,
        table_id: &TableId,
        index_id: &IndexId,
        patch: &IndexPatch,
    ) -> Option<IndexPatch> {
        let table = self.tables.iter_mut().find(|t| &t.id == table_id)?;
        let index = table.indexes.iter_mut().find(|i| &i.id == index_id)?;
        let inverse = index.inverse_patch(patch);
        index.apply_patch(patch);
        Some(inverse)
    }

    // Event helpers. Each operation notifies exactly once, after local
    // state and the history stacks have both been updated.

    fn current_fields(&self, table_id: &TableId) -> Vec<Field> {
        self.tables
            .iter()
            .find(|t| &t.id == table_id)
            .map(|t| t.fields.clone())
            .unwrap_or_default()
    }

    fn current_indexes(&self, table_id: &TableId) -> Vec<Index> {
        self.tables
            .iter()
            .find(|t| &t.id == table_id)
            .map(|t| t.indexes.clone())
            .unwrap_or_default()
    }

    fn emit_add_tables(&self, tables: Vec<Table>) {
        self.events.emit(&DiagramEvent::AddTables { tables });
    }

    fn emit_remove_tables(&self, table_ids: Vec<TableId>) {
        if table_ids.is_empty() {
            return;
        }
        self.events.emit(&DiagramEvent::RemoveTables { table_ids });
    }

    // A wholesale replacement surfaces as one AddTables carrying the full
    // new list.
    fn emit_tables_state(&self) {
        self.events.emit(&DiagramEvent::AddTables {
            tables: self.tables.clone(),
        });
    }

    fn emit_update_table(&self, table_id: &TableId, patch: TablePatch) {
        self.events.emit(&DiagramEvent::UpdateTable {
            table_id: table_id.clone(),
            patch,
        });
    }

    fn emit_add_field(&self, table_id: &TableId, field: &Field) {
        self.events.emit(&DiagramEvent::AddField {
            table_id: table_id.clone(),
            field: field.clone(),
            fields: self.current_fields(table_id),
        });
    }

    fn emit_remove_field(&self, table_id: &TableId, field_id: &FieldId) {
        self.events.emit(&DiagramEvent::RemoveField {
            table_id: table_id.clone(),
            field_id: field_id.clone(),
            fields: self.current_fields(table_id),
        });
    }

    fn emit_table_fields(&self, table_id: &TableId) {
        self.events.emit(&DiagramEvent::UpdateTable {
            table_id: table_id.clone(),
            patch: TablePatch {
                fields: Some(self.current_fields(table_id)),
                ..TablePatch::default()
            },
        });
    }

    fn emit_table_indexes(&self, table_id: &TableId) {
        self.events.emit(&DiagramEvent::UpdateTable {
            table_id: table_id.clone(),
            patch: TablePatch {
                indexes: Some(self.current_indexes(table_id)),
                ..TablePatch::default()
            },
        });
    }

    // Flat-collection primitives.

    fn insert_relationships(&mut self, relationships: &[Relationship]) {
        self.relationships.extend_from_slice(relationships);
    }

    fn take_relationships(&mut self, ids: &[RelationshipId]) -> Vec<Relationship> {
        let mut removed = Vec::new();
        self.relationships.retain(|rel| {
            if ids.contains(&rel.id) {
                removed.push(rel.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn patch_relationship(
        &mut self,
        id: &RelationshipId,
        patch: &RelationshipPatch,
    ) -> Option<RelationshipPatch> {
        let rel = self.relationships.iter_mut().find(|r| &r.id == id)?;
        let inverse = rel.inverse_patch(patch);
        rel.apply_patch(patch);
        Some(inverse)
    }

    fn insert_dependencies(&mut self, dependencies: &[Dependency]) {
        self.dependencies.extend_from_slice(dependencies);
    }

    fn take_dependencies(&mut self, ids: &[DependencyId]) -> Vec<Dependency> {
        let mut removed = Vec::new();
        self.dependencies.retain(|dep| {
            if ids.contains(&dep.id) {
                removed.push(dep.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn patch_dependency(
        &mut self,
        id: &DependencyId,
        patch: &DependencyPatch,
    ) -> Option<DependencyPatch> {
        let dep = self.dependencies.iter_mut().find(|d| &d.id == id)?;
        let inverse = dep.inverse_patch(patch);
        dep.apply_patch(patch);
        Some(inverse)
    }

    fn insert_areas(&mut self, areas: &[Area]) {
        self.areas.extend_from_slice(areas);
    }

    fn take_areas(&mut self, ids: &[AreaId]) -> Vec<Area> {
        let mut removed = Vec::new();
        self.areas.retain(|area| {
            if ids.contains(&area.id) {
                removed.push(area.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn patch_area(&mut self, id: &AreaId, patch: &AreaPatch) -> Option<AreaPatch> {
        let area = self.areas.iter_mut().find(|a| &a.id == id)?;
        let inverse = area.inverse_patch(patch);
        area.apply_patch(patch);
        Some(inverse)
    }

    fn insert_custom_types(&mut self, custom_types: &[CustomType]) {
        self.custom_types.extend_from_slice(custom_types);
    }

    fn take_custom_types(&mut self, ids: &[CustomTypeId]) -> Vec<CustomType> {
        let mut removed = Vec::new();
        self.custom_types.retain(|ct| {
            if ids.contains(&ct.id) {
                removed.push(ct.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn patch_custom_type(
        &mut self,
        id: &CustomTypeId,
        patch: &CustomTypePatch,
    ) -> Option<CustomTypePatch> {
        let ct = self.custom_types.iter_mut().find(|c| &c.id == id)?;
        let inverse = ct.inverse_patch(patch);
        ct.apply_patch(patch);
        Some(inverse)
    }

    fn insert_notes(&mut self, notes: &[Note]) {
        self.notes.extend_from_slice(notes);
    }

    fn take_notes(&mut self, ids: &[NoteId]) -> Vec<Note> {
        let mut removed = Vec::new();
        self.notes.retain(|note| {
            if ids.contains(&note.id) {
                removed.push(note.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn patch_note(&mut self, id: &NoteId, patch: &NotePatch) -> Option<NotePatch> {
        let note = self.notes.iter_mut().find(|n| &n.id == id)?;
        let inverse = note.inverse_patch(patch);
        note.apply_patch(patch);
        Some(inverse)
    }

    /// After a table or field removal no relationship or dependency may
    /// reference a table that is gone.
    fn debug_assert_cascade_consistency(&self) {
        if cfg!(debug_assertions) {
            let has_table = |id: &TableId| self.tables.iter().any(|t| &t.id == id);
            for rel in &self.relationships {
                debug_assert!(
                    has_table(&rel.source_table_id) && has_table(&rel.target_table_id),
                    "relationship {} references a missing table",
                    rel.id
                );
            }
            for dep in &self.dependencies {
                debug_assert!(
                    has_table(&dep.table_id) && has_table(&dep.dependent_table_id),
                    "dependency {} references a missing table",
                    dep.id
                );
            }
        }
    }

    /// Replays one history entry in the given direction. Exhaustive over
    /// every action variant; a missing replay target is logged and skipped
    /// so the stacks never wedge on stale entries.
    async fn replay(
        &mut self,
        action: &RedoUndoAction,
        direction: ReplayDirection,
    ) -> Result<(), ContextError> {
        let diagram_id = self.require_loaded()?;
        self.touch();

        match action {
            RedoUndoAction::UpdateDiagramName { redo, undo } => {
                let name = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                self.diagram_name = name.clone();
                let patch = DiagramPatch {
                    name: Some(name.clone()),
                    updated_at: Some(self.updated_at),
                    ..DiagramPatch::default()
                };
                self.persist(self.storage.update_diagram(&diagram_id, &patch))
                    .await
            }

            RedoUndoAction::AddTables { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.insert_tables(redo);
                        self.emit_add_tables(redo.clone());
                    }
                    ReplayDirection::Undo => {
                        let removed = self.take_tables(undo);
                        self.emit_remove_tables(
                            removed.tables.iter().map(|t| t.id.clone()).collect(),
                        );
                    }
                }
                self.persist_graph(&diagram_id).await
            }
            RedoUndoAction::RemoveTables { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        let removed = self.take_tables(redo);
                        self.emit_remove_tables(
                            removed.tables.iter().map(|t| t.id.clone()).collect(),
                        );
                    }
                    ReplayDirection::Undo => {
                        self.restore_tables(undo);
                        self.emit_add_tables(undo.tables.clone());
                    }
                }
                self.persist_graph(&diagram_id).await
            }
            RedoUndoAction::UpdateTable {
                table_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_table(table_id, patch).is_none() {
                    log::warn!("replay: table {table_id} not found");
                    return Ok(());
                }
                self.emit_update_table(table_id, patch.clone());
                self.persist(self.storage.update_table(&diagram_id, table_id, patch))
                    .await
            }
            RedoUndoAction::UpdateTablesState { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.replace_tables_state(redo);
                    }
                    ReplayDirection::Undo => self.restore_tables_state(undo),
                }
                self.emit_tables_state();
                self.persist_graph(&diagram_id).await
            }

            RedoUndoAction::AddField {
                table_id,
                redo,
                undo,
            } => {
                match direction {
                    ReplayDirection::Redo => {
                        if !self.insert_field(table_id, redo) {
                            log::warn!("replay: table {table_id} not found");
                            return Ok(());
                        }
                        self.emit_add_field(table_id, redo);
                    }
                    ReplayDirection::Undo => {
                        if self.take_field(table_id, undo).is_some() {
                            self.emit_remove_field(table_id, undo);
                        }
                    }
                }
                self.persist_table(&diagram_id, table_id).await
            }
            RedoUndoAction::RemoveField {
                table_id,
                redo,
                undo,
            } => {
                match direction {
                    ReplayDirection::Redo => {
                        if self.take_field(table_id, redo).is_some() {
                            self.emit_remove_field(table_id, redo);
                        }
                    }
                    ReplayDirection::Undo => {
                        self.restore_field(table_id, undo);
                        self.emit_add_field(table_id, &undo.field);
                    }
                }
                self.persist_table(&diagram_id, table_id).await?;
                if !undo.relationships.is_empty() {
                    self.persist_relationships(&diagram_id).await?;
                }
                Ok(())
            }
            RedoUndoAction::UpdateField {
                table_id,
                field_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_field(table_id, field_id, patch).is_none() {
                    log::warn!("replay: field {field_id} not found on table {table_id}");
                    return Ok(());
                }
                self.emit_table_fields(table_id);
                self.persist_table(&diagram_id, table_id).await
            }

            RedoUndoAction::AddIndex {
                table_id,
                redo,
                undo,
            } => {
                match direction {
                    ReplayDirection::Redo => {
                        if !self.insert_index(table_id, redo) {
                            log::warn!("replay: table {table_id} not found");
                            return Ok(());
                        }
                    }
                    ReplayDirection::Undo => {
                        let _ = self.take_index(table_id, undo);
                    }
                }
                self.emit_table_indexes(table_id);
                self.persist_table(&diagram_id, table_id).await
            }
            RedoUndoAction::RemoveIndex {
                table_id,
                redo,
                undo,
            } => {
                match direction {
                    ReplayDirection::Redo => {
                        let _ = self.take_index(table_id, redo);
                    }
                    ReplayDirection::Undo => {
                        if !self.insert_index(table_id, undo) {
                            log::warn!("replay: table {table_id} not found");
                            return Ok(());
                        }
                    }
                }
                self.emit_table_indexes(table_id);
                self.persist_table(&diagram_id, table_id).await
            }
            RedoUndoAction::UpdateIndex {
                table_id,
                index_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_index(table_id, index_id, patch).is_none() {
                    log::warn!("replay: index {index_id} not found on table {table_id}");
                    return Ok(());
                }
                self.emit_table_indexes(table_id);
                self.persist_table(&diagram_id, table_id).await
            }

            RedoUndoAction::AddRelationships { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => self.insert_relationships(redo),
                    ReplayDirection::Undo => {
                        self.take_relationships(undo);
                    }
                }
                self.persist_relationships(&diagram_id).await
            }
            RedoUndoAction::RemoveRelationships { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.take_relationships(redo);
                    }
                    ReplayDirection::Undo => self.insert_relationships(undo),
                }
                self.persist_relationships(&diagram_id).await
            }
            RedoUndoAction::UpdateRelationship {
                relationship_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_relationship(relationship_id, patch).is_none() {
                    log::warn!("replay: relationship {relationship_id} not found");
                    return Ok(());
                }
                self.persist(
                    self.storage
                        .update_relationship(&diagram_id, relationship_id, patch),
                )
                .await
            }

            RedoUndoAction::AddDependencies { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => self.insert_dependencies(redo),
                    ReplayDirection::Undo => {
                        self.take_dependencies(undo);
                    }
                }
                self.persist_dependencies(&diagram_id).await
            }
            RedoUndoAction::RemoveDependencies { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.take_dependencies(redo);
                    }
                    ReplayDirection::Undo => self.insert_dependencies(undo),
                }
                self.persist_dependencies(&diagram_id).await
            }
            RedoUndoAction::UpdateDependency {
                dependency_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_dependency(dependency_id, patch).is_none() {
                    log::warn!("replay: dependency {dependency_id} not found");
                    return Ok(());
                }
                self.persist(
                    self.storage
                        .update_dependency(&diagram_id, dependency_id, patch),
                )
                .await
            }

            RedoUndoAction::AddAreas { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => self.insert_areas(redo),
                    ReplayDirection::Undo => {
                        self.take_areas(undo);
                    }
                }
                self.persist_areas(&diagram_id).await
            }
            RedoUndoAction::RemoveAreas { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.take_areas(redo);
                    }
                    ReplayDirection::Undo => self.insert_areas(undo),
                }
                self.persist_areas(&diagram_id).await
            }
            RedoUndoAction::UpdateArea {
                area_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_area(area_id, patch).is_none() {
                    log::warn!("replay: area {area_id} not found");
                    return Ok(());
                }
                self.persist(self.storage.update_area(&diagram_id, area_id, patch))
                    .await
            }

            RedoUndoAction::AddCustomTypes { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => self.insert_custom_types(redo),
                    ReplayDirection::Undo => {
                        self.take_custom_types(undo);
                    }
                }
                self.persist_custom_types(&diagram_id).await
            }
            RedoUndoAction::RemoveCustomTypes { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.take_custom_types(redo);
                    }
                    ReplayDirection::Undo => self.insert_custom_types(undo),
                }
                self.persist_custom_types(&diagram_id).await
            }
            RedoUndoAction::UpdateCustomType {
                custom_type_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_custom_type(custom_type_id, patch).is_none() {
                    log::warn!("replay: custom type {custom_type_id} not found");
                    return Ok(());
                }
                self.persist(
                    self.storage
                        .update_custom_type(&diagram_id, custom_type_id, patch),
                )
                .await
            }

            RedoUndoAction::AddNotes { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => self.insert_notes(redo),
                    ReplayDirection::Undo => {
                        self.take_notes(undo);
                    }
                }
                self.persist_notes(&diagram_id).await
            }
            RedoUndoAction::RemoveNotes { redo, undo } => {
                match direction {
                    ReplayDirection::Redo => {
                        self.take_notes(redo);
                    }
                    ReplayDirection::Undo => self.insert_notes(undo),
                }
                self.persist_notes(&diagram_id).await
            }
            RedoUndoAction::UpdateNote {
                note_id,
                redo,
                undo,
            } => {
                let patch = match direction {
                    ReplayDirection::Redo => redo,
                    ReplayDirection::Undo => undo,
                };
                if self.patch_note(note_id, patch).is_none() {
                    log::warn!("replay: note {note_id} not found");
                    return Ok(());
                }
                self.persist(self.storage.update_note(&diagram_id, note_id, patch))
                    .await
            }
        }
    }
}
