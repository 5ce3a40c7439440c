// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The diagram root aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::area::Area;
use super::custom_type::CustomType;
use super::dependency::Dependency;
use super::ids::DiagramId;
use super::note::Note;
use super::relationship::Relationship;
use super::table::Table;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    #[default]
    Generic,
    Postgresql,
    Mysql,
    SqlServer,
    Mariadb,
    Sqlite,
    Clickhouse,
    Cockroachdb,
    Oracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEdition {
    Supabase,
    Timescale,
    Mysql57,
    SqlServer2016AndBelow,
    CloudflareD1,
}

impl DatabaseEdition {
    /// The editions selectable for a given database type.
    pub fn for_database_type(database_type: DatabaseType) -> &'static [DatabaseEdition] {
        match database_type {
            DatabaseType::Postgresql => &[Self::Supabase, Self::Timescale],
            DatabaseType::Mysql => &[Self::Mysql57],
            DatabaseType::SqlServer => &[Self::SqlServer2016AndBelow],
            DatabaseType::Sqlite => &[Self::CloudflareD1],
            DatabaseType::Generic
            | DatabaseType::Mariadb
            | DatabaseType::Clickhouse
            | DatabaseType::Cockroachdb
            | DatabaseType::Oracle => &[],
        }
    }
}

/// The root aggregate: one schema visualization session. Child collections
/// are `Option` because reads fetch them selectively (see
/// [`IncludeOptions`]); `None` means "not fetched", not "empty".
///
/// [`IncludeOptions`]: crate::store::IncludeOptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    pub id: DiagramId,
    pub name: String,
    pub database_type: DatabaseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_edition: Option<DatabaseEdition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Table>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Dependency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas: Option<Vec<Area>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_types: Option<Vec<CustomType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Diagram {
    pub fn new(id: DiagramId, name: impl Into<String>, database_type: DatabaseType) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            database_type,
            database_edition: None,
            tables: None,
            relationships: None,
            dependencies: None,
            areas: None,
            custom_types: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: &DiagramPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(database_type) = patch.database_type {
            self.database_type = database_type;
        }
        if let Some(database_edition) = patch.database_edition {
            self.database_edition = database_edition;
        }
        if let Some(tables) = &patch.tables {
            self.tables = Some(tables.clone());
        }
        if let Some(relationships) = &patch.relationships {
            self.relationships = Some(relationships.clone());
        }
        if let Some(dependencies) = &patch.dependencies {
            self.dependencies = Some(dependencies.clone());
        }
        if let Some(areas) = &patch.areas {
            self.areas = Some(areas.clone());
        }
        if let Some(custom_types) = &patch.custom_types {
            self.custom_types = Some(custom_types.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// Partial update for diagram attributes. Only present keys are persisted;
/// a present collection replaces the stored collection wholesale (the
/// backing stores keep each collection as a single document).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_type: Option<DatabaseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_edition: Option<Option<DatabaseEdition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Table>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Dependency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas: Option<Vec<Area>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_types: Option<Vec<CustomType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::{DatabaseEdition, DatabaseType, Diagram, DiagramPatch};
    use crate::model::ids::DiagramId;

    #[test]
    fn editions_follow_database_type() {
        assert_eq!(
            DatabaseEdition::for_database_type(DatabaseType::Postgresql),
            &[DatabaseEdition::Supabase, DatabaseEdition::Timescale]
        );
        assert!(DatabaseEdition::for_database_type(DatabaseType::Mariadb).is_empty());
    }

    #[test]
    fn patch_leaves_unfetched_collections_untouched() {
        let mut diagram = Diagram::new(
            DiagramId::new("d1").expect("diagram id"),
            "inventory",
            DatabaseType::Postgresql,
        );

        diagram.apply_patch(&DiagramPatch {
            name: Some("warehouse".to_owned()),
            ..DiagramPatch::default()
        });

        assert_eq!(diagram.name, "warehouse");
        assert_eq!(diagram.tables, None);
        assert_eq!(diagram.database_type, DatabaseType::Postgresql);
    }

    #[test]
    fn database_type_uses_snake_case_wire_names() {
        let json = serde_json::to_string(&DatabaseType::SqlServer).expect("serialize");
        assert_eq!(json, "\"sql_server\"");
    }
}
