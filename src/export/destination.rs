//! Where exported artifacts end up
//!
//! The preferred target is a previously granted folder. If that grant has
//! been denied or revoked, delivery falls back to a user-facing save
//! mechanism. A user backing out of that mechanism is not an error.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::assembler::Artifact;
use crate::error::{EngineError, Result};

/// A persistent, previously granted location
#[async_trait]
pub trait ExportDestination: Send + Sync {
    fn describe(&self) -> String;

    /// Write the artifact; a denied or revoked grant is `EngineError::Permission`
    async fn write(&self, artifact: &Artifact) -> Result<PathBuf>;
}

/// A save flow that involves the user; may end in `EngineError::UserCancelled`
#[async_trait]
pub trait SaveMechanism: Send + Sync {
    async fn save(&self, artifact: &Artifact) -> Result<PathBuf>;
}

/// Writes into a folder the user granted earlier
#[derive(Debug, Clone)]
pub struct DirectoryDestination {
    root: PathBuf,
}

impl DirectoryDestination {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ExportDestination for DirectoryDestination {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn write(&self, artifact: &Artifact) -> Result<PathBuf> {
        // A vanished folder means the grant no longer holds
        if !tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(EngineError::Permission {
                path: self.root.clone(),
            });
        }

        let path = self.root.join(&artifact.name);
        match tokio::fs::write(&path, &artifact.bytes).await {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(EngineError::Permission { path })
            }
            Err(e) => Err(EngineError::Io(e)),
        }
    }
}

/// Fallback that drops files into the user's downloads folder
#[derive(Debug, Clone)]
pub struct DownloadsFolder {
    dir: Option<PathBuf>,
}

impl DownloadsFolder {
    pub fn new() -> Self {
        Self {
            dir: dirs::download_dir().or_else(dirs::home_dir),
        }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl Default for DownloadsFolder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SaveMechanism for DownloadsFolder {
    async fn save(&self, artifact: &Artifact) -> Result<PathBuf> {
        let dir = self.dir.as_ref().ok_or_else(|| {
            EngineError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "no downloads or home directory",
            ))
        })?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&artifact.name);
        tokio::fs::write(&path, &artifact.bytes).await?;
        Ok(path)
    }
}

/// How an artifact was delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the granted location
    SavedToLocation(PathBuf),
    /// Saved through the user-facing mechanism
    SavedByUser(PathBuf),
    /// The user backed out; nothing was written
    Cancelled,
}

pub struct Exporter {
    primary: Option<Box<dyn ExportDestination>>,
    fallback: Box<dyn SaveMechanism>,
}

impl Exporter {
    pub fn new(
        primary: Option<Box<dyn ExportDestination>>,
        fallback: Box<dyn SaveMechanism>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub async fn deliver(&self, artifact: &Artifact) -> Result<Delivery> {
        if let Some(primary) = &self.primary {
            match primary.write(artifact).await {
                Ok(path) => {
                    info!("💾 Saved {}", path.display());
                    return Ok(Delivery::SavedToLocation(path));
                }
                Err(EngineError::Permission { path }) => {
                    warn!(
                        "⚠️  No write access to {} ({}), asking user instead",
                        primary.describe(),
                        path.display()
                    );
                }
                Err(e) => return Err(e),
            }
        }

        match self.fallback.save(artifact).await {
            Ok(path) => {
                info!("💾 Saved {}", path.display());
                Ok(Delivery::SavedByUser(path))
            }
            Err(e) if e.is_silent() => {
                debug!("Save of {} ended quietly: {}", artifact.name, e);
                Ok(Delivery::Cancelled)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("primary", &self.primary.as_ref().map(|p| p.describe()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn artifact(name: &str) -> Artifact {
        Artifact {
            name: name.to_string(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        }
    }

    /// Records saves, or cancels every one of them
    struct ScriptedSave {
        cancel: bool,
        saved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SaveMechanism for ScriptedSave {
        async fn save(&self, artifact: &Artifact) -> Result<PathBuf> {
            if self.cancel {
                return Err(EngineError::UserCancelled);
            }
            self.saved.lock().unwrap().push(artifact.name.clone());
            Ok(PathBuf::from("/picked").join(&artifact.name))
        }
    }

    fn scripted(cancel: bool) -> Box<ScriptedSave> {
        Box::new(ScriptedSave {
            cancel,
            saved: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_granted_directory_receives_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(
            Some(Box::new(DirectoryDestination::new(dir.path()))),
            scripted(false),
        );

        let delivery = exporter.deliver(&artifact("a.png")).await.unwrap();

        let expected = dir.path().join("a.png");
        assert_eq!(delivery, Delivery::SavedToLocation(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_revoked_directory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("revoked");
        let destination = DirectoryDestination::new(&gone);

        let err = destination.write(&artifact("a.png")).await.unwrap_err();
        assert!(matches!(err, EngineError::Permission { .. }));

        let exporter = Exporter::new(Some(Box::new(destination)), scripted(false));
        let delivery = exporter.deliver(&artifact("a.png")).await.unwrap();
        assert_eq!(delivery, Delivery::SavedByUser(PathBuf::from("/picked/a.png")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_only_directory_falls_back() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores directory modes; nothing to check there
        if std::fs::write(locked.join("root-check"), b"x").is_ok() {
            return;
        }

        let destination = DirectoryDestination::new(&locked);
        let err = destination.write(&artifact("a.png")).await.unwrap_err();
        assert!(matches!(err, EngineError::Permission { ref path } if path == &locked.join("a.png")));

        let exporter = Exporter::new(Some(Box::new(destination)), scripted(false));
        let delivery = exporter.deliver(&artifact("a.png")).await.unwrap();
        assert_eq!(delivery, Delivery::SavedByUser(PathBuf::from("/picked/a.png")));

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_other_write_errors_do_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should go makes the write fail without a permission error
        std::fs::create_dir(dir.path().join("a.png")).unwrap();
        let exporter = Exporter::new(
            Some(Box::new(DirectoryDestination::new(dir.path()))),
            scripted(false),
        );

        let err = exporter.deliver(&artifact("a.png")).await.unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[tokio::test]
    async fn test_cancel_is_not_an_error() {
        let exporter = Exporter::new(None, scripted(true));
        let delivery = exporter.deliver(&artifact("a.png")).await.unwrap();
        assert_eq!(delivery, Delivery::Cancelled);
    }

    #[tokio::test]
    async fn test_downloads_folder_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Downloads");
        let saved = DownloadsFolder::at(&target)
            .save(&artifact("b.png"))
            .await
            .unwrap();
        assert_eq!(saved, target.join("b.png"));
        assert!(saved.exists());
    }
}
