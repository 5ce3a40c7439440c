// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Change notifications for diagram consumers (canvas, side panels).
//!
//! Events are a closed sum so subscribers exhaustively match and the compiler
//! flags them when a new variant lands. Only the mutations a canvas needs to
//! react to incrementally get their own variant; everything else re-renders
//! from state.

use crate::model::{Diagram, Field, FieldId, Table, TableId, TablePatch};

/// Emitted exactly once per operation, after the in-memory state and the
/// history stacks have changed and before persistence is attempted.
/// Payloads are snapshots; holding one never observes later edits.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramEvent {
    /// Also covers wholesale table-list replacement, in which case `tables`
    /// is the complete new list.
    AddTables {
        tables: Vec<Table>,
    },
    UpdateTable {
        table_id: TableId,
        patch: TablePatch,
    },
    RemoveTables {
        table_ids: Vec<TableId>,
    },
    /// `fields` is the table's full field list after the add.
    AddField {
        table_id: TableId,
        field: Field,
        fields: Vec<Field>,
    },
    /// `fields` is the table's full field list after the removal.
    RemoveField {
        table_id: TableId,
        field_id: FieldId,
        fields: Vec<Field>,
    },
    LoadDiagram {
        diagram: Diagram,
    },
}

impl DiagramEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddTables { .. } => "add_tables",
            Self::UpdateTable { .. } => "update_table",
            Self::RemoveTables { .. } => "remove_tables",
            Self::AddField { .. } => "add_field",
            Self::RemoveField { .. } => "remove_field",
            Self::LoadDiagram { .. } => "load_diagram",
        }
    }
}

type Subscriber = Box<dyn Fn(&DiagramEvent) + Send>;

/// Synchronous fan-out to registered subscribers, in registration order.
/// Subscribers run on the mutating call's stack; a slow subscriber slows the
/// edit, which keeps ordering trivial to reason about.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl Fn(&DiagramEvent) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn emit(&self, event: &DiagramEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
