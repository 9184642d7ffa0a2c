use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::info;

use super::Sink;
use crate::{workflow::Snapshot, Result};

/// Writes each generated artifact as `<run id>-<index>.png` next to a
/// `<run id>.json` summary.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let writes = snapshot
            .context
            .generated_artifacts
            .iter()
            .enumerate()
            .map(|(index, artifact)| {
                let path = self.dir.join(format!("{}-{}.png", snapshot.id, index));
                async move {
                    tokio::fs::write(&path, &artifact.data).await?;
                    Ok::<_, crate::Error>(path)
                }
            });
        let mut written = try_join_all(writes).await?;

        let summary = self.dir.join(format!("{}.json", snapshot.id));
        tokio::fs::write(&summary, serde_json::to_vec_pretty(&snapshot.to_json(false))?).await?;
        written.push(summary);

        Ok(written)
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn send(&self, snapshot: &Snapshot) -> Result<()> {
        let written = self.write(snapshot).await?;
        info!("Wrote {} file(s) to {}", written.len(), self.dir.display());
        Ok(())
    }
}
