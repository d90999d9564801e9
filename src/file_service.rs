use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[derive(Clone)]
pub struct FileService {
    upload_path: String,
}

impl FileService {
    pub fn new(upload_path: String) -> Self {
        Self { upload_path }
    }

    /// Strips everything but `[A-Za-z0-9._-]` from the client-supplied name.
    /// A name that sanitizes to nothing gets a random replacement.
    pub fn sanitize_filename(filename: &str) -> String {
        let sanitized: String = filename
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();

        if sanitized.trim_matches('.').is_empty() {
            let suffix = Uuid::new_v4().simple().to_string();
            format!("uploaded_file_{}", &suffix[..8])
        } else {
            sanitized
        }
    }

    pub async fn save_upload(&self, filename: &str, data: &[u8]) -> Result<String> {
        let file_path = Path::new(&self.upload_path).join(filename);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&file_path, data).await?;

        Ok(file_path.to_string_lossy().to_string())
    }

    /// Resolves the path a client handed back from `/upload`. The direct path
    /// is accepted as-is whenever it names an existing file, even outside the
    /// uploads directory; clients echo back the absolute path `/upload`
    /// returned, and that round trip is trusted. Only when the direct path is
    /// gone does the lookup fall back to the uploads directory, and then using
    /// only the file name component (never any directory the client supplied).
    pub fn resolve_path(&self, file_path: &str, filename: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(file_path);
        if direct.is_file() {
            return Some(direct);
        }

        let name = Path::new(filename).file_name()?;
        let fallback = Path::new(&self.upload_path).join(name);
        if fallback.is_file() {
            tracing::info!("Corrected file path to: {}", fallback.display());
            Some(fallback)
        } else {
            None
        }
    }

    pub async fn read_file(&self, file_path: &Path) -> Result<Vec<u8>> {
        let data = fs::read(file_path).await?;
        Ok(data)
    }
}
