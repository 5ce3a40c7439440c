// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The persistence bridge: where a diagram durably lives.
//!
//! [`Storage`] is the only contract the editing core requires from the
//! storage layer. Two backends implement it, [`DiagramFolder`] (embedded
//! local store) and [`RemoteApi`] (HTTP), selected once at startup and
//! never mixed at runtime.
//!
//! Failure discipline: reads that fail at the transport/store level are
//! logged and reported as "not found" (`Ok(None)` / empty list); write
//! failures propagate so the caller can surface them. Table adds are
//! serialized through a FIFO queue per backend instance because both
//! backends replace the whole table collection on write; two interleaved
//! read-modify-write cycles would silently drop one insert.

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::model::{
    Area, AreaId, AreaPatch, CustomType, CustomTypeId, CustomTypePatch, Dependency, DependencyId,
    DependencyPatch, Diagram, DiagramId, DiagramPatch, Note, NoteId, NotePatch, Relationship,
    RelationshipId, RelationshipPatch, Table, TableId, TablePatch,
};

pub mod diagram_folder;
pub mod remote_api;

pub use diagram_folder::{DiagramFolder, WriteDurability};
pub use remote_api::RemoteApi;

/// Which child collections a diagram read should fetch. Absent flags mean
/// the collection is not transferred and the returned diagram carries `None`
/// for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    pub tables: bool,
    pub relationships: bool,
    pub dependencies: bool,
    pub areas: bool,
    pub custom_types: bool,
    pub notes: bool,
}

impl IncludeOptions {
    pub fn all() -> Self {
        Self {
            tables: true,
            relationships: true,
            dependencies: true,
            areas: true,
            custom_types: true,
            notes: true,
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Http {
        url: String,
        source: reqwest::Error,
    },
    Status {
        url: String,
        status: u16,
    },
    SymlinkRefused {
        path: PathBuf,
    },
    PathOutsideRoot {
        root: PathBuf,
        path: PathBuf,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
            Self::Http { url, source } => write!(f, "http error for {url}: {source}"),
            Self::Status { url, status } => {
                write!(f, "unexpected status {status} for {url}")
            }
            Self::SymlinkRefused { path } => {
                write!(f, "refusing to write through symlink at {path:?}")
            }
            Self::PathOutsideRoot { root, path } => {
                write!(f, "path is outside store root: root={root:?} path={path:?}")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Http { source, .. } => Some(source),
            Self::Status { .. } | Self::SymlinkRefused { .. } | Self::PathOutsideRoot { .. } => {
                None
            }
        }
    }
}

/// Storage-agnostic persistence interface for diagrams and their child
/// collections. All methods take `&self`; backends handle their own interior
/// synchronization.
#[async_trait]
pub trait Storage: Send + Sync {
    // Diagram operations.
    async fn add_diagram(&self, diagram: &Diagram) -> Result<(), StorageError>;
    async fn get_diagram(
        &self,
        id: &DiagramId,
        include: &IncludeOptions,
    ) -> Result<Option<Diagram>, StorageError>;
    async fn list_diagrams(&self, include: &IncludeOptions) -> Result<Vec<Diagram>, StorageError>;
    async fn update_diagram(
        &self,
        id: &DiagramId,
        patch: &DiagramPatch,
    ) -> Result<(), StorageError>;
    /// Deletes the diagram and cascades to all child collections.
    async fn delete_diagram(&self, id: &DiagramId) -> Result<(), StorageError>;

    // Table operations. `add_table` must go through the backend's FIFO
    // write queue; `put_table` replaces the full table payload (the
    // persistence path for field/index edits).
    async fn add_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError>;
    async fn get_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<Option<Table>, StorageError>;
    async fn update_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
        patch: &TablePatch,
    ) -> Result<(), StorageError>;
    async fn put_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError>;
    async fn delete_table(&self, diagram_id: &DiagramId, id: &TableId)
        -> Result<(), StorageError>;
    async fn list_tables(&self, diagram_id: &DiagramId) -> Result<Vec<Table>, StorageError>;
    async fn delete_diagram_tables(&self, diagram_id: &DiagramId) -> Result<(), StorageError>;

    // Relationship operations.
    async fn add_relationship(
        &self,
        diagram_id: &DiagramId,
        relationship: &Relationship,
    ) -> Result<(), StorageError>;
    async fn get_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<Option<Relationship>, StorageError>;
    async fn update_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
        patch: &RelationshipPatch,
    ) -> Result<(), StorageError>;
    async fn delete_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<(), StorageError>;
    async fn list_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Relationship>, StorageError>;
    async fn delete_diagram_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError>;

    // Dependency operations.
    async fn add_dependency(
        &self,
        diagram_id: &DiagramId,
        dependency: &Dependency,
    ) -> Result<(), StorageError>;
    async fn get_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<Option<Dependency>, StorageError>;
    async fn update_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
        patch: &DependencyPatch,
    ) -> Result<(), StorageError>;
    async fn delete_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<(), StorageError>;
    async fn list_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Dependency>, StorageError>;
    async fn delete_diagram_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError>;

    // Area operations.
    async fn add_area(&self, diagram_id: &DiagramId, area: &Area) -> Result<(), StorageError>;
    async fn get_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
    ) -> Result<Option<Area>, StorageError>;
    async fn update_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
        patch: &AreaPatch,
    ) -> Result<(), StorageError>;
    async fn delete_area(&self, diagram_id: &DiagramId, id: &AreaId) -> Result<(), StorageError>;
    async fn list_areas(&self, diagram_id: &DiagramId) -> Result<Vec<Area>, StorageError>;
    async fn delete_diagram_areas(&self, diagram_id: &DiagramId) -> Result<(), StorageError>;

    // Custom type operations.
    async fn add_custom_type(
        &self,
        diagram_id: &DiagramId,
        custom_type: &CustomType,
    ) -> Result<(), StorageError>;
    async fn get_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<Option<CustomType>, StorageError>;
    async fn update_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
        patch: &CustomTypePatch,
    ) -> Result<(), StorageError>;
    async fn delete_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<(), StorageError>;
    async fn list_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<CustomType>, StorageError>;
    async fn delete_diagram_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError>;

    // Note operations.
    async fn add_note(&self, diagram_id: &DiagramId, note: &Note) -> Result<(), StorageError>;
    async fn get_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
    ) -> Result<Option<Note>, StorageError>;
    async fn update_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
        patch: &NotePatch,
    ) -> Result<(), StorageError>;
    async fn delete_note(&self, diagram_id: &DiagramId, id: &NoteId) -> Result<(), StorageError>;
    async fn list_notes(&self, diagram_id: &DiagramId) -> Result<Vec<Note>, StorageError>;
    async fn delete_diagram_notes(&self, diagram_id: &DiagramId) -> Result<(), StorageError>;
}
