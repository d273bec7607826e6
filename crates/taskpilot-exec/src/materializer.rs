use tokio::fs;
use tracing::debug;

use crate::{ExecCallback, ExecConfig, ExecEvent, FileWriteError};
use taskpilot_plan::FileSpec;

/// Writes a plan's files to disk in order
pub struct FileMaterializer<'a> {
    config: &'a ExecConfig,
}

impl<'a> FileMaterializer<'a> {
    pub fn new(config: &'a ExecConfig) -> Self {
        Self { config }
    }

    pub async fn materialize(&self, files: &[FileSpec]) -> Result<(), FileWriteError> {
        self.materialize_with_callback(files, None).await
    }

    /// Write every file, creating parent directories and overwriting existing files.
    ///
    /// Stops at the first failure. Files written before it are left in place.
    pub async fn materialize_with_callback(
        &self,
        files: &[FileSpec],
        on_event: Option<ExecCallback>,
    ) -> Result<(), FileWriteError> {
        for (index, file) in files.iter().enumerate() {
            let path = self.config.resolve(&file.path);
            let fail = |source| FileWriteError {
                index,
                path: path.clone(),
                source,
            };

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await.map_err(fail)?;
            }
            fs::write(&path, file.content.as_bytes())
                .await
                .map_err(fail)?;

            debug!(index, path = %path.display(), bytes = file.content.len(), "Wrote file");
            if let Some(ref callback) = on_event {
                callback(ExecEvent::FileWritten {
                    index,
                    path: &path,
                    bytes: file.content.len(),
                });
            }
        }

        Ok(())
    }
}
