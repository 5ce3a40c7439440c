// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP-backed store speaking the diagram server's REST surface.
//!
//! Request and response bodies wrap entities in a one-key envelope
//! (`{"diagram": ...}`, `{"tables": [...]}`). Entity updates that carry only
//! an id are addressed as `/diagrams/<collection>/<id>`; the server scopes
//! them itself. Read failures degrade to "not found" so a flaky connection
//! never wedges the editor; write failures propagate to the caller.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::model::{
    Area, AreaId, AreaPatch, CustomType, CustomTypeId, CustomTypePatch, Dependency, DependencyId,
    DependencyPatch, Diagram, DiagramId, DiagramPatch, Note, NoteId, NotePatch, Relationship,
    RelationshipId, RelationshipPatch, Table, TableId, TablePatch,
};

use super::{IncludeOptions, Storage, StorageError};

#[derive(Debug)]
pub struct RemoteApi {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    // Same lost-update hazard as the folder store: the server keeps each
    // collection as one document, so concurrent adds must not interleave.
    table_write_queue: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct DiagramEnvelope {
    diagram: Diagram,
}

#[derive(Debug, Deserialize)]
struct DiagramsEnvelope {
    #[serde(default)]
    diagrams: Vec<Diagram>,
}

#[derive(Debug, Deserialize)]
struct TableEnvelope {
    table: Table,
}

#[derive(Debug, Deserialize)]
struct TablesEnvelope {
    #[serde(default)]
    tables: Vec<Table>,
}

#[derive(Debug, Deserialize)]
struct RelationshipEnvelope {
    relationship: Relationship,
}

#[derive(Debug, Deserialize)]
struct RelationshipsEnvelope {
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct DependencyEnvelope {
    dependency: Dependency,
}

#[derive(Debug, Deserialize)]
struct DependenciesEnvelope {
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Deserialize)]
struct AreaEnvelope {
    area: Area,
}

#[derive(Debug, Deserialize)]
struct AreasEnvelope {
    #[serde(default)]
    areas: Vec<Area>,
}

#[derive(Debug, Deserialize)]
struct CustomTypeEnvelope {
    #[serde(rename = "customType")]
    custom_type: CustomType,
}

#[derive(Debug, Deserialize)]
struct CustomTypesEnvelope {
    #[serde(rename = "customTypes", default)]
    custom_types: Vec<CustomType>,
}

#[derive(Debug, Deserialize)]
struct NoteEnvelope {
    note: Note,
}

#[derive(Debug, Deserialize)]
struct NotesEnvelope {
    #[serde(default)]
    notes: Vec<Note>,
}

fn include_query(include: &IncludeOptions) -> String {
    let mut includes = Vec::new();
    if include.tables {
        includes.push("tables");
    }
    if include.relationships {
        includes.push("relationships");
    }
    if include.dependencies {
        includes.push("dependencies");
    }
    if include.areas {
        includes.push("areas");
    }
    if include.custom_types {
        includes.push("customTypes");
    }
    if include.notes {
        includes.push("notes");
    }

    if includes.is_empty() {
        String::new()
    } else {
        format!("?include={}", includes.join(","))
    }
}

impl RemoteApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StorageError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|source| StorageError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            bearer_token: None,
            table_write_queue: Mutex::new(()),
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, StorageError> {
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|source| StorageError::Http {
            url: url.to_owned(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), StorageError> {
        let url = self.url(path);
        self.send(method, &url, body).await?;
        Ok(())
    }

    /// Fetches and decodes one envelope. Transport errors, non-2xx statuses
    /// and decode failures all read as "not found" after a warning.
    async fn read<E: DeserializeOwned>(&self, path: &str) -> Result<Option<E>, StorageError> {
        let url = self.url(path);
        let response = match self.send(Method::GET, &url, None).await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("read failed, treating as missing: {err}");
                return Ok(None);
            }
        };

        match response.json::<E>().await {
            Ok(envelope) => Ok(Some(envelope)),
            Err(source) => {
                log::warn!("cannot decode response from {url}: {source}");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Storage for RemoteApi {
    async fn add_diagram(&self, diagram: &Diagram) -> Result<(), StorageError> {
        self.write(Method::POST, "/diagrams", Some(json!({ "diagram": diagram })))
            .await
    }

    async fn get_diagram(
        &self,
        id: &DiagramId,
        include: &IncludeOptions,
    ) -> Result<Option<Diagram>, StorageError> {
        let path = format!("/diagrams/{id}{}", include_query(include));
        Ok(self
            .read::<DiagramEnvelope>(&path)
            .await?
            .map(|envelope| envelope.diagram))
    }

    async fn list_diagrams(&self, include: &IncludeOptions) -> Result<Vec<Diagram>, StorageError> {
        let path = format!("/diagrams{}", include_query(include));
        Ok(self
            .read::<DiagramsEnvelope>(&path)
            .await?
            .map(|envelope| envelope.diagrams)
            .unwrap_or_default())
    }

    async fn update_diagram(
        &self,
        id: &DiagramId,
        patch: &DiagramPatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/{id}"),
            Some(json!({ "diagram": patch })),
        )
        .await
    }

    async fn delete_diagram(&self, id: &DiagramId) -> Result<(), StorageError> {
        self.write(Method::DELETE, &format!("/diagrams/{id}"), None).await
    }

    async fn add_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError> {
        let _guard = self.table_write_queue.lock().await;
        self.write(
            Method::POST,
            &format!("/diagrams/{diagram_id}/tables"),
            Some(json!({ "table": table })),
        )
        .await
    }

    async fn get_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<Option<Table>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/tables/{id}");
        Ok(self
            .read::<TableEnvelope>(&path)
            .await?
            .map(|envelope| envelope.table))
    }

    async fn update_table(
        &self,
        _diagram_id: &DiagramId,
        id: &TableId,
        patch: &TablePatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/tables/{id}"),
            Some(json!({ "attributes": patch })),
        )
        .await
    }

    async fn put_table(&self, diagram_id: &DiagramId, table: &Table) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/{diagram_id}/tables/{}", table.id),
            Some(json!({ "table": table })),
        )
        .await
    }

    async fn delete_table(
        &self,
        diagram_id: &DiagramId,
        id: &TableId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/tables/{id}"),
            None,
        )
        .await
    }

    async fn list_tables(&self, diagram_id: &DiagramId) -> Result<Vec<Table>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/tables");
        Ok(self
            .read::<TablesEnvelope>(&path)
            .await?
            .map(|envelope| envelope.tables)
            .unwrap_or_default())
    }

    async fn delete_diagram_tables(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.write(Method::DELETE, &format!("/diagrams/{diagram_id}/tables"), None)
            .await
    }

    async fn add_relationship(
        &self,
        diagram_id: &DiagramId,
        relationship: &Relationship,
    ) -> Result<(), StorageError> {
        self.write(
            Method::POST,
            &format!("/diagrams/{diagram_id}/relationships"),
            Some(json!({ "relationship": relationship })),
        )
        .await
    }

    async fn get_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<Option<Relationship>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/relationships/{id}");
        Ok(self
            .read::<RelationshipEnvelope>(&path)
            .await?
            .map(|envelope| envelope.relationship))
    }

    async fn update_relationship(
        &self,
        _diagram_id: &DiagramId,
        id: &RelationshipId,
        patch: &RelationshipPatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/relationships/{id}"),
            Some(json!({ "attributes": patch })),
        )
        .await
    }

    async fn delete_relationship(
        &self,
        diagram_id: &DiagramId,
        id: &RelationshipId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/relationships/{id}"),
            None,
        )
        .await
    }

    async fn list_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Relationship>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/relationships");
        Ok(self
            .read::<RelationshipsEnvelope>(&path)
            .await?
            .map(|envelope| envelope.relationships)
            .unwrap_or_default())
    }

    async fn delete_diagram_relationships(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/relationships"),
            None,
        )
        .await
    }

    async fn add_dependency(
        &self,
        diagram_id: &DiagramId,
        dependency: &Dependency,
    ) -> Result<(), StorageError> {
        self.write(
            Method::POST,
            &format!("/diagrams/{diagram_id}/dependencies"),
            Some(json!({ "dependency": dependency })),
        )
        .await
    }

    async fn get_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<Option<Dependency>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/dependencies/{id}");
        Ok(self
            .read::<DependencyEnvelope>(&path)
            .await?
            .map(|envelope| envelope.dependency))
    }

    async fn update_dependency(
        &self,
        _diagram_id: &DiagramId,
        id: &DependencyId,
        patch: &DependencyPatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/dependencies/{id}"),
            Some(json!({ "attributes": patch })),
        )
        .await
    }

    async fn delete_dependency(
        &self,
        diagram_id: &DiagramId,
        id: &DependencyId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/dependencies/{id}"),
            None,
        )
        .await
    }

    async fn list_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<Dependency>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/dependencies");
        Ok(self
            .read::<DependenciesEnvelope>(&path)
            .await?
            .map(|envelope| envelope.dependencies)
            .unwrap_or_default())
    }

    async fn delete_diagram_dependencies(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/dependencies"),
            None,
        )
        .await
    }

    async fn add_area(&self, diagram_id: &DiagramId, area: &Area) -> Result<(), StorageError> {
        self.write(
            Method::POST,
            &format!("/diagrams/{diagram_id}/areas"),
            Some(json!({ "area": area })),
        )
        .await
    }

    async fn get_area(
        &self,
        diagram_id: &DiagramId,
        id: &AreaId,
    ) -> Result<Option<Area>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/areas/{id}");
        Ok(self
            .read::<AreaEnvelope>(&path)
            .await?
            .map(|envelope| envelope.area))
    }

    async fn update_area(
        &self,
        _diagram_id: &DiagramId,
        id: &AreaId,
        patch: &AreaPatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/areas/{id}"),
            Some(json!({ "attributes": patch })),
        )
        .await
    }

    async fn delete_area(&self, diagram_id: &DiagramId, id: &AreaId) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/areas/{id}"),
            None,
        )
        .await
    }

    async fn list_areas(&self, diagram_id: &DiagramId) -> Result<Vec<Area>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/areas");
        Ok(self
            .read::<AreasEnvelope>(&path)
            .await?
            .map(|envelope| envelope.areas)
            .unwrap_or_default())
    }

    async fn delete_diagram_areas(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.write(Method::DELETE, &format!("/diagrams/{diagram_id}/areas"), None)
            .await
    }

    async fn add_custom_type(
        &self,
        diagram_id: &DiagramId,
        custom_type: &CustomType,
    ) -> Result<(), StorageError> {
        self.write(
            Method::POST,
            &format!("/diagrams/{diagram_id}/custom-types"),
            Some(json!({ "customType": custom_type })),
        )
        .await
    }

    async fn get_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<Option<CustomType>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/custom-types/{id}");
        Ok(self
            .read::<CustomTypeEnvelope>(&path)
            .await?
            .map(|envelope| envelope.custom_type))
    }

    async fn update_custom_type(
        &self,
        _diagram_id: &DiagramId,
        id: &CustomTypeId,
        patch: &CustomTypePatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/custom-types/{id}"),
            Some(json!({ "attributes": patch })),
        )
        .await
    }

    async fn delete_custom_type(
        &self,
        diagram_id: &DiagramId,
        id: &CustomTypeId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/custom-types/{id}"),
            None,
        )
        .await
    }

    async fn list_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<CustomType>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/custom-types");
        Ok(self
            .read::<CustomTypesEnvelope>(&path)
            .await?
            .map(|envelope| envelope.custom_types)
            .unwrap_or_default())
    }

    async fn delete_diagram_custom_types(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/custom-types"),
            None,
        )
        .await
    }

    async fn add_note(&self, diagram_id: &DiagramId, note: &Note) -> Result<(), StorageError> {
        self.write(
            Method::POST,
            &format!("/diagrams/{diagram_id}/notes"),
            Some(json!({ "note": note })),
        )
        .await
    }

    async fn get_note(
        &self,
        diagram_id: &DiagramId,
        id: &NoteId,
    ) -> Result<Option<Note>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/notes/{id}");
        Ok(self
            .read::<NoteEnvelope>(&path)
            .await?
            .map(|envelope| envelope.note))
    }

    async fn update_note(
        &self,
        _diagram_id: &DiagramId,
        id: &NoteId,
        patch: &NotePatch,
    ) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/diagrams/notes/{id}"),
            Some(json!({ "attributes": patch })),
        )
        .await
    }

    async fn delete_note(&self, diagram_id: &DiagramId, id: &NoteId) -> Result<(), StorageError> {
        self.write(
            Method::DELETE,
            &format!("/diagrams/{diagram_id}/notes/{id}"),
            None,
        )
        .await
    }

    async fn list_notes(&self, diagram_id: &DiagramId) -> Result<Vec<Note>, StorageError> {
        let path = format!("/diagrams/{diagram_id}/notes");
        Ok(self
            .read::<NotesEnvelope>(&path)
            .await?
            .map(|envelope| envelope.notes)
            .unwrap_or_default())
    }

    async fn delete_diagram_notes(&self, diagram_id: &DiagramId) -> Result<(), StorageError> {
        self.write(Method::DELETE, &format!("/diagrams/{diagram_id}/notes"), None)
            .await
    }
}
