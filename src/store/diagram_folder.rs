// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Embedded folder-per-diagram store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<diagram-id>/naiad-diagram.meta.json
//! <root>/<diagram-id>/tables.json
//! <root>/<diagram-id>/relationships.json
//! <root>/<diagram-id>/dependencies.json
//! <root>/<diagram-id>/areas.json
//! <root>/<diagram-id>/custom_types.json
//! <root>/<diagram-id>/notes.json
//! ```
//!
//! Every collection file holds the full collection as one JSON array and is
//! rewritten wholesale on each change. All writes go through an atomic
//! temp-file-and-rename path that refuses to follow symlinks.

use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::model::{
    Area, AreaId, AreaPatch, CustomType, CustomTypeId, CustomTypePatch, DatabaseEdition,
    DatabaseType, Dependency, DependencyId, DependencyPatch, Diagram, DiagramId, DiagramPatch,
    Note, NoteId, NotePatch, Relationship, RelationshipId, RelationshipPatch, Table, TableId,
    TablePatch,
};

use super::{IncludeOptions, Storage, StorageError};

const DIAGRAM_META_FILENAME: &str = "naiad-diagram.meta.json";

const TABLES_FILENAME: &str = "tables.json";
const RELATIONSHIPS_FILENAME: &str = "relationships.json";
const DEPENDENCIES_FILENAME: &str = "dependencies.json";
const AREAS_FILENAME: &str = "areas.json";
const CUSTOM_TYPES_FILENAME: &str = "custom_types.json";
const NOTES_FILENAME: &str = "notes.json";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Fast, best-effort persistence.
    ///
    /// - Writes a temp file and renames atomically into place.
    /// - Does not perform per-file fsync/sync.
    #[default]
    BestEffort,

    /// Slower, best-effort durability.
    ///
    /// Attempts to flush written file contents and rename operations to stable storage where
    /// possible. Exact guarantees are platform/filesystem-dependent.
    Durable,
}

#[derive(Debug)]
pub struct DiagramFolder {
    root: PathBuf,
    durability: WriteDurability,
    // Serializes read-modify-write cycles on tables.json. Two concurrent
    // adds would otherwise both read the same array and one insert would
    // be lost on the second rename.
    table_write_queue: Mutex<()>,
}

impl DiagramFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durability: WriteDurability::default(),
            table_write_queue: Mutex::new(()),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn diagram_dir(&self, id: &DiagramId) -> Result<PathBuf, StorageError> {
        validate_dir_segment(&self.root, id.as_str())?;
        Ok(self.root.join(id.as_str()))
    }

    fn meta_path(&self, id: &DiagramId) -> Result<PathBuf, StorageError> {
        Ok(self.diagram_dir(id)?.join(DIAGRAM_META_FILENAME))
    }

    fn collection_path(
        &self,
        id: &DiagramId,
        filename: &'static str,
    ) -> Result<PathBuf, StorageError> {
        Ok(self.diagram_dir(id)?.join(filename))
    }

    /// Loads diagram metadata, or `None` when the diagram folder or its meta
    /// file does not exist. A corrupt meta file is logged and treated as
    /// missing.
    fn load_meta(&self, id: &DiagramId) -> Result<Option<Diagram>, StorageError> {
        let meta_path = self.meta_path(id)?;
        let meta_str = match fs::read_to_string(&meta_path) {
            Ok(meta_str) => meta_str,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                log::warn!("cannot read diagram meta at {meta_path:?}: {source}");
                return Ok(None);
            }
        };

        match serde_json::from_str::<DiagramMetaJson>(&meta_str) {
            Ok(meta_json) => Ok(Some(diagram_from_meta_json(meta_json))),
            Err(source) => {
                log::warn!("cannot parse diagram meta at {meta_path:?}: {source}");
                Ok(None)
            }
        }
    }

    fn save_meta(&self, diagram: &Diagram) -> Result<(), StorageError> {
        let meta_path = self.meta_path(&diagram.id)?;
        let meta_json = diagram_to_meta_json(diagram);
        let meta_str =
            serde_json::to_string_pretty(&meta_json).map_err(|source| StorageError::Json {
                path: meta_path.clone(),
                source,
            })?;

        write_atomic_in_folder(
            &self.root,
            &meta_path,
            format!("{meta_str}\n").as_bytes(),
            self.durability,
        )
    }

    /// Reads a collection file as a whole. Missing files mean an empty
    /// collection; unreadable or corrupt files are logged and also read as
    /// empty so that one bad file never wedges a load.
    fn read_collection<T: DeserializeOwned>(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
    ) -> Result<Vec<T>, StorageError> {
        let path = self.collection_path(diagram_id, filename)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                log::warn!("cannot read collection at {path:?}: {source}");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_str(&contents) {
            Ok(items) => Ok(items),
            Err(source) => {
                log::warn!("cannot parse collection at {path:?}: {source}");
                Ok(Vec::new())
            }
        }
    }

    fn write_collection<T: Serialize>(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
        items: &[T],
    ) -> Result<(), StorageError> {
        let path = self.collection_path(diagram_id, filename)?;
        let contents = serde_json::to_string_pretty(items).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;

        write_atomic_in_folder(
            &self.root,
            &path,
            format!("{contents}\n").as_bytes(),
            self.durability,
        )
    }

    fn delete_collection(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
    ) -> Result<(), StorageError> {
        let path = self.collection_path(diagram_id, filename)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn add_item<T: Serialize + DeserializeOwned + Clone>(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
        item: &T,
    ) -> Result<(), StorageError> {
        let mut items: Vec<T> = self.read_collection(diagram_id, filename)?;
        items.push(item.clone());
        self.write_collection(diagram_id, filename, &items)
    }

    fn update_item<T, P>(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
        patch: &P,
        matches: impl Fn(&T) -> bool,
        apply: impl Fn(&mut T, &P),
    ) -> Result<(), StorageError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut items: Vec<T> = self.read_collection(diagram_id, filename)?;
        match items.iter_mut().find(|item| matches(item)) {
            Some(item) => apply(item, patch),
            None => {
                log::warn!("update target not found in {filename} for diagram {diagram_id}");
                return Ok(());
            }
        }
        self.write_collection(diagram_id, filename, &items)
    }

    fn delete_item<T: Serialize + DeserializeOwned>(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
        matches: impl Fn(&T) -> bool,
    ) -> Result<(), StorageError> {
        let mut items: Vec<T> = self.read_collection(diagram_id, filename)?;
        items.retain(|item| !matches(item));
        self.write_collection(diagram_id, filename, &items)
    }

    fn find_item<T: DeserializeOwned>(
        &self,
        diagram_id: &DiagramId,
        filename: &'static str,
        matches: impl Fn(&T) -> bool,
    ) -> Result<Option<T>, StorageError> {
        let items: Vec<T> = self.read_collection(diagram_id, filename)?;
        Ok(items.into_iter().find(|item| matches(item)))
    }

    fn fill_included(
        &self,
        diagram: &mut Diagram,
        include: &IncludeOptions,
    ) -> Result<(), StorageError> {
        let id = diagram.id.clone();
        if include.tables {
            diagram.tables = Some(self.read_collection(&id, TABLES_FILENAME)?);
        }
        if include.relationships {
            diagram.relationships = Some(self.read_collection(&id, RELATIONSHIPS_FILENAME)?);
        }
        if include.dependencies {
            diagram.dependencies = Some(self.read_collection(&id, DEPENDENCIES_FILENAME)?);
        }
        if include.areas {
            diagram.areas = Some(self.read_collection(&id, AREAS_FILENAME)?);
        }
        if include.custom_types {
            diagram.custom_types = Some(self.read_collection(&id, CUSTOM_TYPES_FILENAME)?);
        }
        if include.notes {
            diagram.notes = Some(self.read_collection(&id, NOTES_FILENAME)?);
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for DiagramFolder {
    async fn add_diagram(&self, diagram: &Diagram) -> Result<(), StorageError> {
        self.save_meta(diagram)?;
        if let Some(tables) = &diagram.tables {
            self.write_collection(&diagram.id, TABLES_FILENAME, tables)?;
        }
        if let Some(relationships) = &diagram.relationships {
            self.write_collection(&diagram.id, RELATIONSHIPS_FILENAME, relationships)?;
        }
        if let Some(dependencies) = &diagram.dependencies {
            self.write_collection(&diagram.id, DEPENDENCIES_FILENAME, dependencies)?;
        }
        if let Some(areas) = &diagram.areas {
            self.write_collection(&diagram.id, AREAS_FILENAME, areas)?;
        }
        if let Some(custom_types) = &diagram.custom_types {
            self.write_collection(&diagram.id, CUSTOM_TYPES_FILENAME, custom_types)?;
        }
        if let Some(notes) = &diagram.notes {
            self.write_collection(&diagram.id, NOTES_FILENAME, notes)?;
        }
        Ok(())
    }

    async fn get_diagram(
        &self,
        id: &DiagramId,
        include: &IncludeOptions,
    ) -> Result<Option<Diagram>, StorageError> {
        let Some(mut diagram) = self.load_meta(id)? else {
            return Ok(None);
        };
        self.fill_included(&mut diagram, include)?;
        Ok(Some(diagram))
    }

    async fn list_diagrams(&self, include: &IncludeOptions) -> Result<Vec<Diagram>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                log::warn!("cannot list store root {:?}: {source}", self.root);
                return Ok(Vec::new());
            }
        };

        let mut dir_names = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect::<Vec<_>>();
        dir_names.sort();

        let mut diagrams = Vec::new();
        for dir_name in dir_names {
            let Ok(id) = DiagramId::new(dir_name) else {
                continue;
            };
            if let Some(mut diagram) = self.load_meta(&id)? {
                self.fill_included(&mut diagram, include)?;
                diagrams.push(diagram);
            }
        }
        Ok(diagrams)
    }

    async fn update_diagram(
        &self,
        id: &DiagramId,
        patch: &DiagramPatch,
    ) -> Result<(), StorageError> {
        let Some(mut diagram) = self.load_meta(id)? else {
            log::warn!("update target not found: diagram {id}");
            return Ok(());
        };

        // Metadata and collections persist separately; a patched collection
        // replaces its file wholesale.
        diagram.apply_patch(&DiagramPatch {
            tables: None,
            relationships: None,
            dependencies: None,
            areas: None,
            custom_types: None,
            notes: None,
            ..patch.clone()
        });
        self.save_meta(&diagram)?;

        if let Some(tables) = &patch.tables {
            self.write_collection(id, TABLES_FILENAME, tables)?;
        }
        if let Some(relationships) = &patch.relationships {
            self.write_collection(id, RELATIONSHIPS_FILENAME, relationships)?;
        }
        if let Some(dependencies) = &patch.dependencies {
            self.write_collection(id, DEPENDENCIES_FILENAME, dependencies)?;
        }
        if let Some(areas) = &patch.areas {
            self.write_collection(id, AREAS_FILENAME, areas)?;
        }
        if let Some(custom_types) = &patch.custom_types {
            self.write_collection(id, CUSTOM_TYPES_FILENAME, custom_types)?;
        }
        if let Some(notes) = &patch.notes {
            self.write_collection(id, NOTES_FILENAME, notes)?;
        }
        Ok(())
    }

    async fn delete_diagram(&self, id: &DiagramId) -> Result<(), StorageError> {
        let dir = self.diagram_dir(id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path: dir, source }),
        }
    }

    async fn add_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError> {
        let _guard = self.table_write_queue.lock().await;
        let mut tables: Vec<Table> = self.read_collection(diagram_id, TABLES_FILENAME)?;
        tables.push(table.clone());
        // Other tasks may run here; the queue guard spans both the read
        // and the rename.
        tokio::task::yield_now().await;
        self.write_collection(diagram_id, TABLES_FILENAME, &tables)
    }

    async fn get_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<Option<Table>, StorageError> {
        self.find_item(diagram_id, TABLES_FILENAME, |table: &Table| table.id == *id)
    }

    async fn update_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
        patch: &TablePatch,
    ) -> Result<(), StorageError> {
        self.update_item(
            diagram_id,
            TABLES_FILENAME,
            patch,
            |table: &Table| table.id == *id,
            |table, patch| table.apply_patch(patch),
        )
    }

    async fn put_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError> {
        let _guard = self.table_write_queue.lock().await;
        let mut tables: Vec<Table> = self.read_collection(diagram_id, TABLES_FILENAME)?;
        match tables.iter_mut().find(|existing| existing.id == table.id) {
            Some(existing) => *existing = table.clone(),
            None => tables.push(table.clone()),
        }
        tokio::task::yield_now().await;
        self.write_collection(diagram_id, TABLES_FILENAME, &tables)
    }

    async fn delete_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<(), StorageError> {
        self.delete_item(diagram_id, TABLES_FILENAME, |table: &Table| table.id == *id)
    }

    async fn list_tables(&self, diagram_id: &DiagramId) -> Result<Vec<Table>, StorageError> {
        self.read_collection(diagram_id, TABLES_FILENAME)
    }

    async fn delete_diagram_tables(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.delete_collection(diagram_id, TABLES_FILENAME)
    }

    async fn add_relationship(
        &self,
        diagram_id: &DiagramId,
        relationship: &Relationship,
    ) -> Result<(), StorageError> {
        self.add_item(diagram_id, RELATIONSHIPS_FILENAME, relationship)
    }

    async fn get_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<Option<Relationship>, StorageError> {
        self.find_item(diagram_id, RELATIONSHIPS_FILENAME, |r: &Relationship| {
            r.id == *id
        })
    }

    async fn update_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
        patch: &RelationshipPatch,
    ) -> Result<(), StorageError> {
        self.update_item(
            diagram_id,
            RELATIONSHIPS_FILENAME,
            patch,
            |r: &Relationship| r.id == *id,
            |r, patch| r.apply_patch(patch),
        )
    }

    async fn delete_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<(), StorageError> {
        self.delete_item(diagram_id, RELATIONSHIPS_FILENAME, |r: &Relationship| {
            r.id == *id
        })
    }

    async fn list_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Relationship>, StorageError> {
        self.read_collection(diagram_id, RELATIONSHIPS_FILENAME)
    }

    async fn delete_diagram_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.delete_collection(diagram_id, RELATIONSHIPS_FILENAME)
    }

    async fn add_dependency(
        &self,
        diagram_id: &DiagramId,
        dependency: &Dependency,
    ) -> Result<(), StorageError> {
        self.add_item(diagram_id, DEPENDENCIES_FILENAME, dependency)
    }

    async fn get_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<Option<Dependency>, StorageError> {
        self.find_item(diagram_id, DEPENDENCIES_FILENAME, |d: &Dependency| {
            d.id == *id
        })
    }

    async fn update_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
        patch: &DependencyPatch,
    ) -> Result<(), StorageError> {
        self.update_item(
            diagram_id,
            DEPENDENCIES_FILENAME,
            patch,
            |d: &Dependency| d.id == *id,
            |d, patch| d.apply_patch(patch),
        )
    }

    async fn delete_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<(), StorageError> {
        self.delete_item(diagram_id, DEPENDENCIES_FILENAME, |d: &Dependency| {
            d.id == *id
        })
    }

    async fn list_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Dependency>, StorageError> {
        self.read_collection(diagram_id, DEPENDENCIES_FILENAME)
    }

    async fn delete_diagram_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.delete_collection(diagram_id, DEPENDENCIES_FILENAME)
    }

    async fn add_area(&self, diagram_id: &DiagramId, area: &Area) -> Result<(), StorageError> {
        self.add_item(diagram_id, AREAS_FILENAME, area)
    }

    async fn get_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
    ) -> Result<Option<Area>, StorageError> {
        self.find_item(diagram_id, AREAS_FILENAME, |area: &Area| area.id == *id)
    }

    async fn update_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
        patch: &AreaPatch,
    ) -> Result<(), StorageError> {
        self.update_item(
            diagram_id,
            AREAS_FILENAME,
            patch,
            |area: &Area| area.id == *id,
            |area, patch| area.apply_patch(patch),
        )
    }

    async fn delete_area(&self, diagram_id: &DiagramId, id: &AreaId) -> Result<(), StorageError> {
        self.delete_item(diagram_id, AREAS_FILENAME, |area: &Area| area.id == *id)
    }

    async fn list_areas(&self, diagram_id: &DiagramId) -> Result<Vec<Area>, StorageError> {
        self.read_collection(diagram_id, AREAS_FILENAME)
    }

    async fn delete_diagram_areas(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.delete_collection(diagram_id, AREAS_FILENAME)
    }

    async fn add_custom_type(
        &self,
        diagram_id: &DiagramId,
        custom_type: &CustomType,
    ) -> Result<(), StorageError> {
        self.add_item(diagram_id, CUSTOM_TYPES_FILENAME, custom_type)
    }

    async fn get_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<Option<CustomType>, StorageError> {
        self.find_item(diagram_id, CUSTOM_TYPES_FILENAME, |ct: &CustomType| {
            ct.id == *id
        })
    }

    async fn update_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
        patch: &CustomTypePatch,
    ) -> Result<(), StorageError> {
        self.update_item(
            diagram_id,
            CUSTOM_TYPES_FILENAME,
            patch,
            |ct: &CustomType| ct.id == *id,
            |ct, patch| ct.apply_patch(patch),
        )
    }

    async fn delete_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<(), StorageError> {
        self.delete_item(diagram_id, CUSTOM_TYPES_FILENAME, |ct: &CustomType| {
            ct.id == *id
        })
    }

    async fn list_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<CustomType>, StorageError> {
        self.read_collection(diagram_id, CUSTOM_TYPES_FILENAME)
    }

    async fn delete_diagram_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.delete_collection(diagram_id, CUSTOM_TYPES_FILENAME)
    }

    async fn add_note(&self, diagram_id: &DiagramId, note: &Note) -> Result<(), StorageError> {
        self.add_item(diagram_id, NOTES_FILENAME, note)
    }

    async fn get_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
    ) -> Result<Option<Note>, StorageError> {
        self.find_item(diagram_id, NOTES_FILENAME, |note: &Note| note.id == *id)
    }

    async fn update_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
        patch: &NotePatch,
    ) -> Result<(), StorageError> {
        self.update_item(
            diagram_id,
            NOTES_FILENAME,
            patch,
            |note: &Note| note.id == *id,
            |note, patch| note.apply_patch(patch),
        )
    }

    async fn delete_note(&self, diagram_id: &DiagramId, id: &NoteId) -> Result<(), StorageError> {
        self.delete_item(diagram_id, NOTES_FILENAME, |note: &Note| note.id == *id)
    }

    async fn list_notes(&self, diagram_id: &DiagramId) -> Result<Vec<Note>, StorageError> {
        self.read_collection(diagram_id, NOTES_FILENAME)
    }

    async fn delete_diagram_notes(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.delete_collection(diagram_id, NOTES_FILENAME)
    }
}

// Extracted persistence helpers for `DiagramFolder`.
include!("diagram_folder/helpers.rs");
