use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reframe_core::{AttachmentField, AttachmentRef, ProcessedFile};
use tracing::debug;
use url::Url;

use crate::{HostStore, ServiceError};

/// A host store laid out on disk as `<base>/<record_id>/<field_id>/<file>`.
///
/// Records are the subdirectories of `base`, fields are the subdirectories of
/// a record, and each file in a field directory is one attachment. Tokens are
/// the attachment's path relative to `base`.
pub struct LocalHostStore {
    base_dir: PathBuf,
}

impl LocalHostStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn field_dir(&self, record_id: &str, field_id: &str) -> Result<PathBuf, ServiceError> {
        check_segment(record_id)?;
        check_segment(field_id)?;
        Ok(self.base_dir.join(record_id).join(field_id))
    }
}

/// Ids become path segments, so they must not escape the base directory.
fn check_segment(id: &str) -> Result<(), ServiceError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(ServiceError::InvalidInput(format!("invalid id: {id:?}")));
    }
    Ok(())
}

/// Sorted names of the entries of `dir` that are directories (or files).
/// Hidden entries, including in-progress writes, are skipped.
async fn entry_names(dir: &Path, want_dirs: bool) -> Result<Vec<String>, ServiceError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => {
            return Err(ServiceError::Internal(format!(
                "list {}: {e}",
                dir.display()
            )))
        }
    };
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ServiceError::Internal(format!("read_dir entry: {e}")))?
    {
        let ft = entry
            .file_type()
            .await
            .map_err(|e| ServiceError::Internal(format!("file_type: {e}")))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if ft.is_dir() == want_dirs && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl HostStore for LocalHostStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        match tokio::fs::metadata(&self.base_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ServiceError::InvalidInput(format!(
                "{} is not a directory",
                self.base_dir.display()
            ))),
            Err(e) => Err(ServiceError::NotFound(format!(
                "{}: {e}",
                self.base_dir.display()
            ))),
        }
    }

    async fn list_record_ids(&self) -> Result<Vec<String>, ServiceError> {
        entry_names(&self.base_dir, true).await
    }

    async fn list_attachment_fields(&self) -> Result<Vec<AttachmentField>, ServiceError> {
        let mut fields = BTreeSet::new();
        for record in self.list_record_ids().await? {
            fields.extend(entry_names(&self.base_dir.join(&record), true).await?);
        }
        Ok(fields
            .into_iter()
            .map(|id| AttachmentField {
                display_name: id.clone(),
                field_id: id,
            })
            .collect())
    }

    async fn read_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
    ) -> Result<Vec<AttachmentRef>, ServiceError> {
        let record_dir = self.base_dir.join(record_id);
        let dir = self.field_dir(record_id, field_id)?;
        if !tokio::fs::try_exists(&record_dir).await.unwrap_or(false) {
            return Err(ServiceError::NotFound(format!("record {record_id}")));
        }
        Ok(entry_names(&dir, false)
            .await?
            .into_iter()
            .map(|name| AttachmentRef::new(format!("{record_id}/{field_id}/{name}"), name))
            .collect())
    }

    async fn resolve_attachment_urls(
        &self,
        tokens: &[String],
        field_id: &str,
        record_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let prefix = format!("{record_id}/{field_id}/");
        let base = tokio::fs::canonicalize(&self.base_dir)
            .await
            .map_err(|e| ServiceError::Internal(format!("{}: {e}", self.base_dir.display())))?;
        tokens
            .iter()
            .map(|token| {
                let name = token
                    .strip_prefix(&prefix)
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "token {token} does not belong to {prefix}"
                        ))
                    })?;
                check_segment(name)?;
                let path = base.join(record_id).join(field_id).join(name);
                Url::from_file_path(&path)
                    .map(String::from)
                    .map_err(|_| ServiceError::Internal(format!("{} is not absolute", path.display())))
            })
            .collect()
    }

    async fn write_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        files: Vec<ProcessedFile>,
    ) -> Result<bool, ServiceError> {
        let dir = self.field_dir(record_id, field_id)?;
        let mut names = HashSet::new();
        for file in &files {
            check_segment(&file.name)?;
            if !names.insert(file.name.as_str()) {
                return Err(ServiceError::InvalidInput(format!(
                    "duplicate file name {} for record {record_id} field {field_id}",
                    file.name
                )));
            }
        }

        let record_dir = self.base_dir.join(record_id);
        let staging = record_dir.join(format!(".{field_id}.staging"));
        let retired = record_dir.join(format!(".{field_id}.retired"));
        remove_dir_if_exists(&staging).await?;
        remove_dir_if_exists(&retired).await?;
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| ServiceError::Internal(format!("mkdir {}: {e}", staging.display())))?;

        if let Err(e) = write_files(&staging, files).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        // Swap the staged cell in; the old contents survive until it is in place.
        let had_previous = tokio::fs::try_exists(&dir).await.unwrap_or(false);
        if had_previous {
            rename(&dir, &retired).await?;
        }
        if let Err(e) = rename(&staging, &dir).await {
            if had_previous {
                let _ = tokio::fs::rename(&retired, &dir).await;
            }
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }
        remove_dir_if_exists(&retired).await?;
        Ok(true)
    }
}

async fn write_files(dir: &Path, files: Vec<ProcessedFile>) -> Result<(), ServiceError> {
    for file in files {
        let path = dir.join(&file.name);
        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(|e| ServiceError::Internal(format!("write {}: {e}", path.display())))?;
        debug!("staged {}", path.display());
    }
    Ok(())
}

async fn rename(from: &Path, to: &Path) -> Result<(), ServiceError> {
    tokio::fs::rename(from, to).await.map_err(|e| {
        ServiceError::Internal(format!(
            "rename {} -> {}: {e}",
            from.display(),
            to.display()
        ))
    })
}

async fn remove_dir_if_exists(dir: &Path) -> Result<(), ServiceError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ServiceError::Internal(format!(
            "clear {}: {e}",
            dir.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn seed(base: &Path, record: &str, field: &str, files: &[(&str, &str)]) {
        let dir = base.join(record).join(field);
        std::fs::create_dir_all(&dir).unwrap();
        for (name, data) in files {
            std::fs::write(dir.join(name), data).unwrap();
        }
    }

    #[tokio::test]
    async fn lists_records_and_fields_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "rec-b", "photos", &[("a.jpg", "x")]);
        seed(tmp.path(), "rec-a", "photos", &[]);
        seed(tmp.path(), "rec-a", "scans", &[]);
        std::fs::write(tmp.path().join("stray.txt"), b"ignored").unwrap();
        let store = LocalHostStore::new(tmp.path());

        assert_eq!(store.list_record_ids().await.unwrap(), vec!["rec-a", "rec-b"]);
        let fields: Vec<String> = store
            .list_attachment_fields()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.field_id)
            .collect();
        assert_eq!(fields, vec!["photos", "scans"]);
    }

    #[tokio::test]
    async fn read_cell_returns_attachments_with_tokens() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "photos", &[("b.png", "2"), ("a.jpg", "1")]);
        let store = LocalHostStore::new(tmp.path());

        let cell = store.read_attachment_cell("r1", "photos").await.unwrap();
        assert_eq!(
            cell,
            vec![
                AttachmentRef::new("r1/photos/a.jpg", "a.jpg"),
                AttachmentRef::new("r1/photos/b.png", "b.png"),
            ]
        );
    }

    #[tokio::test]
    async fn read_missing_field_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "photos", &[]);
        let store = LocalHostStore::new(tmp.path());
        assert!(store.read_attachment_cell("r1", "other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_missing_record_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalHostStore::new(tmp.path());
        let err = store.read_attachment_cell("nope", "photos").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_ids_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalHostStore::new(tmp.path());
        let err = store.read_attachment_cell("..", "photos").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = store
            .write_attachment_cell("r1", "a/b", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn resolve_produces_file_urls_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "photos", &[("a.jpg", "1"), ("b.jpg", "2")]);
        let store = LocalHostStore::new(tmp.path());

        let tokens = vec!["r1/photos/b.jpg".to_string(), "r1/photos/a.jpg".to_string()];
        let urls = store
            .resolve_attachment_urls(&tokens, "photos", "r1")
            .await
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("file://") && urls[0].ends_with("/r1/photos/b.jpg"));
        assert!(urls[1].ends_with("/r1/photos/a.jpg"));
    }

    #[tokio::test]
    async fn resolve_rejects_foreign_tokens() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "photos", &[]);
        let store = LocalHostStore::new(tmp.path());
        let tokens = vec!["r2/photos/a.jpg".to_string()];
        let err = store
            .resolve_attachment_urls(&tokens, "photos", "r1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn write_replaces_cell_contents() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "thumbs", &[("old.jpg", "old")]);
        let store = LocalHostStore::new(tmp.path());

        let written = store
            .write_attachment_cell(
                "r1",
                "thumbs",
                vec![ProcessedFile::jpeg("new_10x10.jpg".into(), Bytes::from_static(b"new"))],
            )
            .await
            .unwrap();
        assert!(written);

        let cell = store.read_attachment_cell("r1", "thumbs").await.unwrap();
        assert_eq!(cell.len(), 1);
        assert_eq!(cell[0].name, "new_10x10.jpg");
        assert_eq!(
            std::fs::read(tmp.path().join("r1/thumbs/new_10x10.jpg")).unwrap(),
            b"new"
        );
    }

    #[tokio::test]
    async fn duplicate_names_are_refused_and_cell_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "thumbs", &[("old.jpg", "old")]);
        let store = LocalHostStore::new(tmp.path());

        let err = store
            .write_attachment_cell(
                "r1",
                "thumbs",
                vec![
                    ProcessedFile::jpeg("shot_10x10.jpg".into(), Bytes::from_static(b"one")),
                    ProcessedFile::jpeg("shot_10x10.jpg".into(), Bytes::from_static(b"two")),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(msg) if msg.contains("shot_10x10.jpg")));

        let cell = store.read_attachment_cell("r1", "thumbs").await.unwrap();
        assert_eq!(cell, vec![AttachmentRef::new("r1/thumbs/old.jpg", "old.jpg")]);
    }

    #[tokio::test]
    async fn failed_write_leaves_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "thumbs", &[("old.jpg", "old")]);
        let store = LocalHostStore::new(tmp.path());

        // Longer than any filesystem accepts for a single name.
        let too_long = format!("{}.jpg", "x".repeat(400));
        let err = store
            .write_attachment_cell(
                "r1",
                "thumbs",
                vec![
                    ProcessedFile::jpeg("fine_10x10.jpg".into(), Bytes::from_static(b"ok")),
                    ProcessedFile::jpeg(too_long, Bytes::from_static(b"nope")),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        assert_eq!(
            std::fs::read(tmp.path().join("r1/thumbs/old.jpg")).unwrap(),
            b"old"
        );
        assert!(!tmp.path().join("r1/thumbs/fine_10x10.jpg").exists());
        assert!(!tmp.path().join("r1/.thumbs.staging").exists());
        let fields: Vec<String> = store
            .list_attachment_fields()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.field_id)
            .collect();
        assert_eq!(fields, vec!["thumbs"]);
    }

    #[tokio::test]
    async fn write_creates_missing_field_without_leftovers() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "r1", "photos", &[]);
        let store = LocalHostStore::new(tmp.path());

        store
            .write_attachment_cell(
                "r1",
                "thumbs",
                vec![ProcessedFile::jpeg("a_5x5.jpg".into(), Bytes::from_static(b"a"))],
            )
            .await
            .unwrap();
        let mut entries: Vec<String> = std::fs::read_dir(tmp.path().join("r1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["photos", "thumbs"]);
    }

    #[tokio::test]
    async fn health_check_requires_directory() {
        let tmp = tempfile::tempdir().unwrap();
        LocalHostStore::new(tmp.path()).health_check().await.unwrap();

        let err = LocalHostStore::new(tmp.path().join("missing"))
            .health_check()
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
