//! Artifact store
//!
//! Synthesized templates live under `.fleetstack/out/<stack>.template.json`.
//! The previous template is kept next to it as `<stack>.template.json.backup`.

use crate::error::{Result, SynthError};
use crate::template::{EngineTemplate, FORMAT_VERSION};
use std::path::{Path, PathBuf};
use tokio::fs;

const ARTIFACT_DIR: &str = ".fleetstack/out";
const TEMPLATE_SUFFIX: &str = ".template.json";
const BACKUP_SUFFIX: &str = ".backup";

pub struct ArtifactStore {
    /// Project root directory
    project_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.project_root.join(ARTIFACT_DIR)
    }

    pub fn template_path(&self, stack: &str) -> PathBuf {
        self.artifact_dir()
            .join(format!("{}{}", stack, TEMPLATE_SUFFIX))
    }

    pub fn backup_path(&self, stack: &str) -> PathBuf {
        self.artifact_dir()
            .join(format!("{}{}{}", stack, TEMPLATE_SUFFIX, BACKUP_SUFFIX))
    }

    async fn ensure_artifact_dir(&self) -> Result<()> {
        let dir = self.artifact_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created artifact directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the last synthesized template of a stack
    pub async fn load(&self, stack: &str) -> Result<Option<EngineTemplate>> {
        let path = self.template_path(stack);
        if !path.exists() {
            tracing::debug!(stack, "No previous template");
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let template: EngineTemplate = serde_json::from_str(&content)?;

        if template.metadata.format_version > FORMAT_VERSION {
            return Err(SynthError::UnsupportedVersion {
                path,
                found: template.metadata.format_version,
                supported: FORMAT_VERSION,
            });
        }

        tracing::debug!(
            stack,
            resources = template.resources.len(),
            "Loaded previous template"
        );
        Ok(Some(template))
    }

    /// Write a template, moving the previous one to the backup path.
    /// Returns the path written.
    pub async fn save(&self, template: &EngineTemplate) -> Result<PathBuf> {
        self.ensure_artifact_dir().await?;

        let stack = template.stack_name();
        let path = self.template_path(stack);
        let backup = self.backup_path(stack);

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!(stack, "Created template backup");
        }

        let content = serde_json::to_string_pretty(template)?;
        fs::write(&path, content).await?;

        tracing::info!(
            stack,
            path = %path.display(),
            resources = template.resources.len(),
            "Saved template"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetstack_core::{ResourceGraph, ResourceNode};
    use serde_json::json;
    use tempfile::tempdir;

    fn template(bucket_count: usize) -> EngineTemplate {
        let mut graph = ResourceGraph::new("Demo");
        for i in 0..bucket_count {
            graph
                .insert(ResourceNode::new(
                    format!("Bucket{}", i),
                    "AWS::S3::Bucket",
                    json!({}),
                ))
                .unwrap();
        }
        EngineTemplate::from_graph(&graph).unwrap()
    }

    #[tokio::test]
    async fn test_save_load() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());

        let path = store.save(&template(2)).await.unwrap();
        assert!(path.ends_with(".fleetstack/out/Demo.template.json"));

        let loaded = store.load("Demo").await.unwrap().unwrap();
        assert_eq!(loaded.resources.len(), 2);
        assert!(loaded.same_content(&template(2)));
    }

    #[tokio::test]
    async fn test_missing_template() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());

        assert!(store.load("Demo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_previous_template_is_backed_up() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());

        store.save(&template(1)).await.unwrap();
        store.save(&template(3)).await.unwrap();

        let backup = std::fs::read_to_string(store.backup_path("Demo")).unwrap();
        let backup: EngineTemplate = serde_json::from_str(&backup).unwrap();
        assert_eq!(backup.resources.len(), 1);

        let current = store.load("Demo").await.unwrap().unwrap();
        assert_eq!(current.resources.len(), 3);
    }

    #[tokio::test]
    async fn test_newer_format_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());

        let mut newer = template(1);
        newer.metadata.format_version = FORMAT_VERSION + 1;
        store.save(&newer).await.unwrap();

        let result = store.load("Demo").await;
        assert!(matches!(
            result,
            Err(SynthError::UnsupportedVersion { found, .. }) if found == FORMAT_VERSION + 1
        ));
    }
}
