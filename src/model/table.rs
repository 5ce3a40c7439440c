// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Tables and the fields/indexes they own.
//!
//! Fields and indexes are composition: they never outlive their table and are
//! persisted as part of the table payload, not as standalone collections.

use serde::{Deserialize, Serialize};

use super::ids::{FieldId, IndexId, TableId};

/// A field's type descriptor. `name` may reference a [`CustomType`] by name;
/// that reference is weak: renaming or deleting the custom type does not
/// rewrite fields automatically.
///
/// [`CustomType`]: super::custom_type::CustomType
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl FieldType {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_maximum_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl Field {
    pub fn new(id: FieldId, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id,
            name: name.into(),
            field_type,
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
            character_maximum_length: None,
            comments: None,
        }
    }

    pub fn apply_patch(&mut self, patch: &FieldPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(field_type) = &patch.field_type {
            self.field_type = field_type.clone();
        }
        if let Some(nullable) = patch.nullable {
            self.nullable = nullable;
        }
        if let Some(primary_key) = patch.primary_key {
            self.primary_key = primary_key;
        }
        if let Some(unique) = patch.unique {
            self.unique = unique;
        }
        if let Some(default) = &patch.default {
            self.default = default.clone();
        }
        if let Some(len) = &patch.character_maximum_length {
            self.character_maximum_length = len.clone();
        }
        if let Some(comments) = &patch.comments {
            self.comments = comments.clone();
        }
    }

    /// Captures the pre-mutation values of exactly the keys `patch` touches,
    /// so an undo entry can reverse the patch without re-querying the store.
    pub fn inverse_patch(&self, patch: &FieldPatch) -> FieldPatch {
        FieldPatch {
            name: patch.name.as_ref().map(|_| self.name.clone()),
            field_type: patch.field_type.as_ref().map(|_| self.field_type.clone()),
            nullable: patch.nullable.map(|_| self.nullable),
            primary_key: patch.primary_key.map(|_| self.primary_key),
            unique: patch.unique.map(|_| self.unique),
            default: patch.default.as_ref().map(|_| self.default.clone()),
            character_maximum_length: patch
                .character_maximum_length
                .as_ref()
                .map(|_| self.character_maximum_length.clone()),
            comments: patch.comments.as_ref().map(|_| self.comments.clone()),
        }
    }
}

/// Partial update for a [`Field`]. Optional-valued attributes use a nested
/// `Option`: `Some(None)` clears the attribute, `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_maximum_length: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub id: IndexId,
    pub name: String,
    #[serde(default)]
    pub field_ids: Vec<FieldId>,
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    pub fn new(id: IndexId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            field_ids: Vec::new(),
            unique: false,
        }
    }

    pub fn apply_patch(&mut self, patch: &IndexPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(field_ids) = &patch.field_ids {
            self.field_ids = field_ids.clone();
        }
        if let Some(unique) = patch.unique {
            self.unique = unique;
        }
    }

    pub fn inverse_patch(&self, patch: &IndexPatch) -> IndexPatch {
        IndexPatch {
            name: patch.name.as_ref().map(|_| self.name.clone()),
            field_ids: patch.field_ids.as_ref().map(|_| self.field_ids.clone()),
            unique: patch.unique.map(|_| self.unique),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_ids: Option<Vec<FieldId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub is_view: bool,
}

impl Table {
    pub fn new(id: TableId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            schema: None,
            x: 0.0,
            y: 0.0,
            fields: Vec::new(),
            indexes: Vec::new(),
            width: None,
            color: None,
            is_view: false,
        }
    }

    pub fn field(&self, field_id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == field_id)
    }

    pub fn index(&self, index_id: &IndexId) -> Option<&Index> {
        self.indexes.iter().find(|i| &i.id == index_id)
    }

    pub fn apply_patch(&mut self, patch: &TablePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(schema) = &patch.schema {
            self.schema = schema.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(fields) = &patch.fields {
            self.fields = fields.clone();
        }
        if let Some(indexes) = &patch.indexes {
            self.indexes = indexes.clone();
        }
        if let Some(width) = &patch.width {
            self.width = *width;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(is_view) = patch.is_view {
            self.is_view = is_view;
        }
    }

    pub fn inverse_patch(&self, patch: &TablePatch) -> TablePatch {
        TablePatch {
            name: patch.name.as_ref().map(|_| self.name.clone()),
            schema: patch.schema.as_ref().map(|_| self.schema.clone()),
            x: patch.x.map(|_| self.x),
            y: patch.y.map(|_| self.y),
            fields: patch.fields.as_ref().map(|_| self.fields.clone()),
            indexes: patch.indexes.as_ref().map(|_| self.indexes.clone()),
            width: patch.width.as_ref().map(|_| self.width),
            color: patch.color.as_ref().map(|_| self.color.clone()),
            is_view: patch.is_view.map(|_| self.is_view),
        }
    }
}

/// Partial update for a [`Table`]. `fields`/`indexes` replace the whole owned
/// sequence when present; there is no element-wise merge, which keeps nested
/// edits explicit instead of silently clobbering them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<Index>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_view: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::{Field, FieldPatch, FieldType, Table, TablePatch};
    use crate::model::ids::{FieldId, TableId};

    #[test]
    fn field_patch_touches_only_present_keys() {
        let mut field = Field::new(
            FieldId::new("f1").expect("field id"),
            "email",
            FieldType::named("varchar"),
        );
        field.unique = true;

        field.apply_patch(&FieldPatch {
            name: Some("email_address".to_owned()),
            ..FieldPatch::default()
        });

        assert_eq!(field.name, "email_address");
        assert_eq!(field.field_type, FieldType::named("varchar"));
        assert!(field.unique);
        assert!(field.nullable);
    }

    #[test]
    fn inverse_patch_round_trips() {
        let mut table = Table::new(TableId::new("t1").expect("table id"), "users");
        table.x = 120.0;
        table.color = Some("#9ef07a".to_owned());

        let patch = TablePatch {
            name: Some("accounts".to_owned()),
            x: Some(300.0),
            color: Some(None),
            ..TablePatch::default()
        };
        let inverse = table.inverse_patch(&patch);
        let before = table.clone();

        table.apply_patch(&patch);
        assert_eq!(table.name, "accounts");
        assert_eq!(table.x, 300.0);
        assert_eq!(table.color, None);

        table.apply_patch(&inverse);
        assert_eq!(table, before);
    }

    #[test]
    fn table_patch_replacing_fields_does_not_touch_indexes() {
        let mut table = Table::new(TableId::new("t1").expect("table id"), "users");
        table.fields.push(Field::new(
            FieldId::new("f1").expect("field id"),
            "id",
            FieldType::named("bigint"),
        ));
        let indexes_before = table.indexes.clone();

        table.apply_patch(&TablePatch {
            fields: Some(Vec::new()),
            ..TablePatch::default()
        });

        assert!(table.fields.is_empty());
        assert_eq!(table.indexes, indexes_before);
    }

    #[test]
    fn field_serializes_with_camel_case_wire_names() {
        let mut field = Field::new(
            FieldId::new("f1").expect("field id"),
            "id",
            FieldType::named("bigint"),
        );
        field.primary_key = true;

        let json = serde_json::to_value(&field).expect("serialize");
        assert_eq!(json["primaryKey"], serde_json::json!(true));
        assert_eq!(json["type"]["name"], serde_json::json!("bigint"));
    }
}
