// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

// Spliced into `diagram_folder.rs` via include!.

/// On-disk shape of `naiad-diagram.meta.json`. Collections live in their own
/// files and never appear here.
#[derive(Debug, Serialize, Deserialize)]
struct DiagramMetaJson {
    id: DiagramId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    database_type: DatabaseType,
    #[serde(default)]
    database_edition: Option<DatabaseEdition>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn diagram_from_meta_json(meta: DiagramMetaJson) -> Diagram {
    let mut diagram = Diagram::new(meta.id, meta.name, meta.database_type);
    diagram.database_edition = meta.database_edition;
    diagram.created_at = meta.created_at;
    diagram.updated_at = meta.updated_at;
    diagram
}

fn diagram_to_meta_json(diagram: &Diagram) -> DiagramMetaJson {
    DiagramMetaJson {
        id: diagram.id.clone(),
        name: diagram.name.clone(),
        database_type: diagram.database_type,
        database_edition: diagram.database_edition,
        created_at: diagram.created_at,
        updated_at: diagram.updated_at,
    }
}

/// Diagram ids become directory names under the store root, so anything that
/// would escape the root or collide with special names is refused outright.
fn validate_dir_segment(root: &Path, segment: &str) -> Result<(), StorageError> {
    let refused = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.starts_with('.')
        || segment.contains('/')
        || segment.contains('\\');

    if refused {
        return Err(StorageError::PathOutsideRoot {
            root: root.to_path_buf(),
            path: root.join(segment),
        });
    }
    Ok(())
}

fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
                ) =>
            {
                let _ = fs::remove_file(to);
                fs::rename(from, to)
            }
            Err(err) => Err(err),
        }
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

/// Writes `contents` to `path` via a temp file in the same directory followed
/// by an atomic rename. `path` must live under `root`. Writes through
/// symlinks are refused so a planted link cannot redirect store output.
fn write_atomic_in_folder(
    root: &Path,
    path: &Path,
    contents: &[u8],
    durability: WriteDurability,
) -> Result<(), StorageError> {
    if path.strip_prefix(root).is_err() {
        return Err(StorageError::PathOutsideRoot {
            root: root.to_path_buf(),
            path: path.to_path_buf(),
        });
    }

    let Some(parent) = path.parent() else {
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no parent"),
        });
    };
    let Some(file_name) = path.file_name() else {
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no file name"),
        });
    };

    fs::create_dir_all(parent).map_err(|source| StorageError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    for candidate in [parent, path] {
        match fs::symlink_metadata(candidate) {
            Ok(md) if md.file_type().is_symlink() => {
                return Err(StorageError::SymlinkRefused {
                    path: candidate.to_path_buf(),
                });
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StorageError::Io {
                    path: candidate.to_path_buf(),
                    source,
                });
            }
        }
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".naiad.tmp.{}.{}",
        file_name.to_string_lossy(),
        nanos
    ));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| StorageError::Io {
            path: tmp_path.clone(),
            source,
        })?;

    file.write_all(contents).map_err(|source| StorageError::Io {
        path: tmp_path.clone(),
        source,
    })?;

    if durability == WriteDurability::Durable {
        file.sync_all().map_err(|source| StorageError::Io {
            path: tmp_path.clone(),
            source,
        })?;
    }
    drop(file);

    if let Err(source) = rename_overwrite(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    if durability == WriteDurability::Durable {
        #[cfg(unix)]
        {
            let dir = fs::File::open(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            dir.sync_all().map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}
