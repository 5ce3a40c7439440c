// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model: the diagram aggregate and its child entities.
//!
//! A diagram owns tables (which own fields and indexes), relationships,
//! dependencies, areas, custom types, and notes. Every entity carries an
//! opaque string id unique within its collection across the whole diagram.

pub mod area;
pub mod custom_type;
pub mod dependency;
pub mod diagram;
pub mod ids;
pub mod note;
pub mod relationship;
pub mod table;

pub use area::{Area, AreaPatch};
pub use custom_type::{CustomType, CustomTypeField, CustomTypeKind, CustomTypePatch};
pub use dependency::{Dependency, DependencyPatch};
pub use diagram::{DatabaseEdition, DatabaseType, Diagram, DiagramPatch};
pub use ids::{
    AreaId, CustomTypeId, DependencyId, DiagramId, FieldId, Id, IdError, IndexId, NoteId,
    RelationshipId, TableId,
};
pub use note::{Note, NotePatch};
pub use relationship::{Cardinality, Relationship, RelationshipPatch};
pub use table::{Field, FieldPatch, FieldType, Index, IndexPatch, Table, TablePatch};
