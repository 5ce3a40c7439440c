// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

use super::ids::{FieldId, RelationshipId, TableId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    #[default]
    Many,
}

/// A foreign-key edge between a source table+field and a target table+field.
/// Endpoints must exist when the relationship is created; after that the
/// store does not repair dangling edges; the remove operations cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: RelationshipId,
    pub name: String,
    pub source_table_id: TableId,
    pub source_field_id: FieldId,
    pub target_table_id: TableId,
    pub target_field_id: FieldId,
    #[serde(default)]
    pub source_cardinality: Cardinality,
    #[serde(default)]
    pub target_cardinality: Cardinality,
}

impl Relationship {
    pub fn references_table(&self, table_id: &TableId) -> bool {
        &self.source_table_id == table_id || &self.target_table_id == table_id
    }

    pub fn references_field(&self, field_id: &FieldId) -> bool {
        &self.source_field_id == field_id || &self.target_field_id == field_id
    }

    pub fn apply_patch(&mut self, patch: &RelationshipPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(source_table_id) = &patch.source_table_id {
            self.source_table_id = source_table_id.clone();
        }
        if let Some(source_field_id) = &patch.source_field_id {
            self.source_field_id = source_field_id.clone();
        }
        if let Some(target_table_id) = &patch.target_table_id {
            self.target_table_id = target_table_id.clone();
        }
        if let Some(target_field_id) = &patch.target_field_id {
            self.target_field_id = target_field_id.clone();
        }
        if let Some(source_cardinality) = patch.source_cardinality {
            self.source_cardinality = source_cardinality;
        }
        if let Some(target_cardinality) = patch.target_cardinality {
            self.target_cardinality = target_cardinality;
        }
    }

    pub fn inverse_patch(&self, patch: &RelationshipPatch) -> RelationshipPatch {
        RelationshipPatch {
            name: patch.name.as_ref().map(|_| self.name.clone()),
            source_table_id: patch
                .source_table_id
                .as_ref()
                .map(|_| self.source_table_id.clone()),
            source_field_id: patch
                .source_field_id
                .as_ref()
                .map(|_| self.source_field_id.clone()),
            target_table_id: patch
                .target_table_id
                .as_ref()
                .map(|_| self.target_table_id.clone()),
            target_field_id: patch
                .target_field_id
                .as_ref()
                .map(|_| self.target_field_id.clone()),
            source_cardinality: patch.source_cardinality.map(|_| self.source_cardinality),
            target_cardinality: patch.target_cardinality.map(|_| self.target_cardinality),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field_id: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field_id: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_cardinality: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cardinality: Option<Cardinality>,
}
