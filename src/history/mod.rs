// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Redo/undo history.
//!
//! Every mutating context operation that runs with history enabled pushes one
//! [`RedoUndoAction`]: a closed variant carrying the typed data needed to
//! re-apply (`redo`) and to reverse (`undo`) the mutation. Undo payloads for
//! removals are self-contained snapshots of the removed sub-objects,
//! including everything the removal cascaded, so replay never has to
//! re-query the store.
//!
//! Replay itself lives in [`DiagramContext`]: a single exhaustive `match`
//! over this enum, which is what guarantees at compile time that every action
//! kind has a handler.
//!
//! [`DiagramContext`]: crate::context::DiagramContext

use std::collections::VecDeque;

use crate::model::{
    Area, AreaId, AreaPatch, CustomType, CustomTypeId, CustomTypePatch, Dependency, DependencyId,
    DependencyPatch, Field, FieldId, FieldPatch, Index, IndexId, IndexPatch, Note, NoteId,
    NotePatch, Relationship, RelationshipId, RelationshipPatch, Table, TableId, TablePatch,
};

/// Default cap on history depth. The stacks drop their oldest entry beyond
/// this; the cap is configurable via [`History::with_capacity`].
pub const DEFAULT_HISTORY_DEPTH: usize = 256;

/// Snapshot of a table removal, including the relationships and dependencies
/// the removal cascaded. One undo restores all of it atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedTables {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    pub dependencies: Vec<Dependency>,
}

/// Snapshot of a field removal plus the relationships that referenced the
/// field and were cascaded with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedField {
    pub field: Field,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedoUndoAction {
    UpdateDiagramName {
        redo: String,
        undo: String,
    },
    UpdateTable {
        table_id: TableId,
        redo: TablePatch,
        undo: TablePatch,
    },
    AddTables {
        redo: Vec<Table>,
        undo: Vec<TableId>,
    },
    RemoveTables {
        redo: Vec<TableId>,
        undo: RemovedTables,
    },
    UpdateTablesState {
        redo: Vec<Table>,
        undo: RemovedTables,
    },
    AddField {
        table_id: TableId,
        redo: Field,
        undo: FieldId,
    },
    RemoveField {
        table_id: TableId,
        redo: FieldId,
        undo: RemovedField,
    },
    UpdateField {
        table_id: TableId,
        field_id: FieldId,
        redo: FieldPatch,
        undo: FieldPatch,
    },
    AddIndex {
        table_id: TableId,
        redo: Index,
        undo: IndexId,
    },
    RemoveIndex {
        table_id: TableId,
        redo: IndexId,
        undo: Index,
    },
    UpdateIndex {
        table_id: TableId,
        index_id: IndexId,
        redo: IndexPatch,
        undo: IndexPatch,
    },
    AddRelationships {
        redo: Vec<Relationship>,
        undo: Vec<RelationshipId>,
    },
    UpdateRelationship {
        relationship_id: RelationshipId,
        redo: RelationshipPatch,
        undo: RelationshipPatch,
    },
    RemoveRelationships {
        redo: Vec<RelationshipId>,
        undo: Vec<Relationship>,
    },
    AddDependencies {
        redo: Vec<Dependency>,
        undo: Vec<DependencyId>,
    },
    UpdateDependency {
        dependency_id: DependencyId,
        redo: DependencyPatch,
        undo: DependencyPatch,
    },
    RemoveDependencies {
        redo: Vec<DependencyId>,
        undo: Vec<Dependency>,
    },
    AddAreas {
        redo: Vec<Area>,
        undo: Vec<AreaId>,
    },
    UpdateArea {
        area_id: AreaId,
        redo: AreaPatch,
        undo: AreaPatch,
    },
    RemoveAreas {
        redo: Vec<AreaId>,
        undo: Vec<Area>,
    },
    AddCustomTypes {
        redo: Vec<CustomType>,
        undo: Vec<CustomTypeId>,
    },
    UpdateCustomType {
        custom_type_id: CustomTypeId,
        redo: CustomTypePatch,
        undo: CustomTypePatch,
    },
    RemoveCustomTypes {
        redo: Vec<CustomTypeId>,
        undo: Vec<CustomType>,
    },
    AddNotes {
        redo: Vec<Note>,
        undo: Vec<NoteId>,
    },
    UpdateNote {
        note_id: NoteId,
        redo: NotePatch,
        undo: NotePatch,
    },
    RemoveNotes {
        redo: Vec<NoteId>,
        undo: Vec<Note>,
    },
}

impl RedoUndoAction {
    /// Stable operation name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateDiagramName { .. } => "update_diagram_name",
            Self::UpdateTable { .. } => "update_table",
            Self::AddTables { .. } => "add_tables",
            Self::RemoveTables { .. } => "remove_tables",
            Self::UpdateTablesState { .. } => "update_tables_state",
            Self::AddField { .. } => "add_field",
            Self::RemoveField { .. } => "remove_field",
            Self::UpdateField { .. } => "update_field",
            Self::AddIndex { .. } => "add_index",
            Self::RemoveIndex { .. } => "remove_index",
            Self::UpdateIndex { .. } => "update_index",
            Self::AddRelationships { .. } => "add_relationships",
            Self::UpdateRelationship { .. } => "update_relationship",
            Self::RemoveRelationships { .. } => "remove_relationships",
            Self::AddDependencies { .. } => "add_dependencies",
            Self::UpdateDependency { .. } => "update_dependency",
            Self::RemoveDependencies { .. } => "remove_dependencies",
            Self::AddAreas { .. } => "add_areas",
            Self::UpdateArea { .. } => "update_area",
            Self::RemoveAreas { .. } => "remove_areas",
            Self::AddCustomTypes { .. } => "add_custom_types",
            Self::UpdateCustomType { .. } => "update_custom_type",
            Self::RemoveCustomTypes { .. } => "remove_custom_types",
            Self::AddNotes { .. } => "add_notes",
            Self::UpdateNote { .. } => "update_note",
            Self::RemoveNotes { .. } => "remove_notes",
        }
    }
}

/// Two bounded stacks of recorded actions.
///
/// `record` implements the branching-history rule: a fresh edit discards the
/// redo stack. The replay transfers (`pop_undo` + `push_redo` and the
/// reverse) are driven by the context's `undo`/`redo` operations.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<RedoUndoAction>,
    redo_stack: VecDeque<RedoUndoAction>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records a fresh edit: pushes onto the undo stack and clears the redo
    /// stack. The oldest entry is dropped once the cap is reached.
    pub fn record(&mut self, action: RedoUndoAction) {
        if self.undo_stack.len() == self.capacity {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(action);
        self.redo_stack.clear();
    }

    pub fn pop_undo(&mut self) -> Option<RedoUndoAction> {
        self.undo_stack.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<RedoUndoAction> {
        self.redo_stack.pop_back()
    }

    /// Pushes a just-undone action onto the redo stack.
    pub fn push_redo(&mut self, action: RedoUndoAction) {
        if self.redo_stack.len() == self.capacity {
            self.redo_stack.pop_front();
        }
        self.redo_stack.push_back(action);
    }

    /// Pushes a just-redone action back onto the undo stack without clearing
    /// the redo stack (this is a replay, not a fresh edit).
    pub fn push_undo(&mut self, action: RedoUndoAction) {
        if self.undo_stack.len() == self.capacity {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(action);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drops both stacks. A freshly loaded diagram has no history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests;
