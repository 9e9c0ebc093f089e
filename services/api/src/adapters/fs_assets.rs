//! services/api/src/adapters/fs_assets.rs
//!
//! This module contains the filesystem implementation of the `AssetStore` port.
//! Uploaded files are written under the upload root, partitioned by media
//! class (`images/`, `videos/`, `docs/`), and exposed to clients under
//! `/uploads/<partition>/<name>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use course_sync_core::domain::{AssetDescriptor, MediaClass};
use course_sync_core::ports::{AssetStore, IncomingFile, PortError, PortResult};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix under which the upload root is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone, Debug)]
pub struct FsAssetStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsAssetStore {
    /// Creates the store and its partition directories.
    pub async fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> std::io::Result<Self> {
        let root = root.into();
        for class in [MediaClass::Image, MediaClass::Video, MediaClass::Document] {
            tokio::fs::create_dir_all(root.join(class.dir_name())).await?;
        }
        Ok(Self {
            root,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn public_path(&self, class: MediaClass, file_name: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.public_base_url.as_deref().unwrap_or(""),
            PUBLIC_PREFIX,
            class.dir_name(),
            file_name
        )
    }

    /// Maps a public path back to a file under the upload root. Returns `None`
    /// for anything that is not exactly `<prefix>/<partition>/<name>`.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let local = match self.public_base_url.as_deref() {
            Some(base) => public_path.strip_prefix(base).unwrap_or(public_path),
            None => public_path,
        };
        let rest = local.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let (dir, name) = rest.split_once('/')?;
        let class = MediaClass::from_dir_name(dir)?;
        let safe = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.starts_with('.');
        safe.then(|| self.root.join(class.dir_name()).join(name))
    }
}

/// `<unix-millis>-<9 random digits><original extension>`.
fn generate_name(original_name: &str) -> String {
    let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    format!("{}-{:09}{}", Utc::now().timestamp_millis(), suffix, extension)
}

/// Writes `bytes` through `writer` into the just-created `target`. If the
/// write fails the partial file is removed before the error is returned.
async fn fill_new_file<W>(mut writer: W, target: &Path, bytes: &[u8]) -> PortResult<()>
where
    W: AsyncWrite + Unpin,
{
    let written: std::io::Result<()> = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    match written {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(target).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %target.display(), error = %remove_err, "Failed to remove partially written asset");
                }
            }
            Err(PortError::Unexpected(format!(
                "Failed to write {}: {}",
                target.display(),
                e
            )))
        }
    }
}

//=========================================================================================
// `AssetStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn store(&self, file: &IncomingFile) -> PortResult<AssetDescriptor> {
        let class = MediaClass::from_content_type(&file.content_type);
        let name = generate_name(&file.original_name);
        let target = self.root.join(class.dir_name()).join(&name);

        // `create_new` refuses to clobber an existing file.
        let handle = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to create {}: {}", target.display(), e)))?;
        fill_new_file(handle, &target, &file.bytes).await?;

        debug!(file = %file.original_name, stored_as = %target.display(), "Asset stored");
        Ok(AssetDescriptor {
            name: file.original_name.clone(),
            path: self.public_path(class, &name),
            content_type: file.content_type.clone(),
            size: file.bytes.len() as u64,
            uploaded_at: Utc::now(),
        })
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        let target = self.resolve(path).ok_or_else(|| {
            PortError::InvalidInput(format!("Refusing to delete '{}': not an upload path", path))
        })?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!(
                "Failed to delete {}: {}",
                target.display(),
                e
            ))),
        }
    }
}
