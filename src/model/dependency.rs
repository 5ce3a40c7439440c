// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

use super::ids::{DependencyId, TableId};

/// A directed edge `table -> dependent table`, e.g. a view depending on the
/// table it selects from. Independent of [`Relationship`].
///
/// [`Relationship`]: super::relationship::Relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub id: DependencyId,
    pub table_id: TableId,
    pub dependent_table_id: TableId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl Dependency {
    pub fn references_table(&self, table_id: &TableId) -> bool {
        &self.table_id == table_id || &self.dependent_table_id == table_id
    }

    pub fn apply_patch(&mut self, patch: &DependencyPatch) {
        if let Some(table_id) = &patch.table_id {
            self.table_id = table_id.clone();
        }
        if let Some(dependent_table_id) = &patch.dependent_table_id {
            self.dependent_table_id = dependent_table_id.clone();
        }
        if let Some(schema) = &patch.schema {
            self.schema = schema.clone();
        }
    }

    pub fn inverse_patch(&self, patch: &DependencyPatch) -> DependencyPatch {
        DependencyPatch {
            table_id: patch.table_id.as_ref().map(|_| self.table_id.clone()),
            dependent_table_id: patch
                .dependent_table_id
                .as_ref()
                .map(|_| self.dependent_table_id.clone()),
            schema: patch.schema.as_ref().map(|_| self.schema.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Option<String>>,
}
