// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

use super::ids::CustomTypeId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomTypeKind {
    #[default]
    Enum,
    Composite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTypeField {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// A named enum/composite/domain type scoped to a schema. Fields reference
/// custom types by *name*, a weak reference, so a rename must be propagated
/// manually and a deletion can leave dangling field references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomType {
    pub id: CustomTypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub kind: CustomTypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<CustomTypeField>>,
}

impl CustomType {
    pub fn apply_patch(&mut self, patch: &CustomTypePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(schema) = &patch.schema {
            self.schema = schema.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(values) = &patch.values {
            self.values = values.clone();
        }
        if let Some(fields) = &patch.fields {
            self.fields = fields.clone();
        }
    }

    pub fn inverse_patch(&self, patch: &CustomTypePatch) -> CustomTypePatch {
        CustomTypePatch {
            name: patch.name.as_ref().map(|_| self.name.clone()),
            schema: patch.schema.as_ref().map(|_| self.schema.clone()),
            kind: patch.kind.map(|_| self.kind),
            values: patch.values.as_ref().map(|_| self.values.clone()),
            fields: patch.fields.as_ref().map(|_| self.fields.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTypePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CustomTypeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Option<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Option<Vec<CustomTypeField>>>,
}
