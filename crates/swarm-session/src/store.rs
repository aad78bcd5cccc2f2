use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use swarm_core::{SavedRun, SwarmError, SwarmResult};
use tracing::warn;
use uuid::Uuid;

/// Storage for completed runs.
///
/// `list` returns runs newest first.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(&self, run: &SavedRun) -> SwarmResult<Uuid>;
    async fn list(&self) -> SwarmResult<Vec<SavedRun>>;
    async fn get(&self, id: Uuid) -> SwarmResult<Option<SavedRun>>;
    async fn delete(&self, id: Uuid) -> SwarmResult<()>;
}

fn newest_first(runs: &mut [SavedRun]) {
    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// File-based run store: one pretty-printed JSON file per run.
pub struct FileRunStore {
    dir: PathBuf,
}

impl FileRunStore {
    pub async fn new(dir: PathBuf) -> SwarmResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn run_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, path: PathBuf) -> SwarmResult<SavedRun> {
        let data = tokio::fs::read_to_string(&path).await?;
        serde_json::from_str(&data).map_err(|e| {
            SwarmError::Session(format!("Failed to parse run {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&self, run: &SavedRun) -> SwarmResult<Uuid> {
        let json = serde_json::to_string_pretty(run)?;
        tokio::fs::write(self.run_path(run.id), json).await?;
        Ok(run.id)
    }

    async fn list(&self) -> SwarmResult<Vec<SavedRun>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut runs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_run = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| Uuid::parse_str(stem).is_ok())
                && path.extension().is_some_and(|ext| ext == "json");
            if !is_run {
                continue;
            }
            match self.read(path).await {
                Ok(run) => runs.push(run),
                Err(e) => warn!(error = %e, "Skipping unreadable saved run"),
            }
        }
        newest_first(&mut runs);
        Ok(runs)
    }

    async fn get(&self, id: Uuid) -> SwarmResult<Option<SavedRun>> {
        let path = self.run_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.read(path).await?))
    }

    async fn delete(&self, id: Uuid) -> SwarmResult<()> {
        let path = self.run_path(id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// In-memory run store, for tests and embedders without a disk.
#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<Vec<SavedRun>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, run: &SavedRun) -> SwarmResult<Uuid> {
        let mut runs = self.runs.write();
        runs.retain(|r| r.id != run.id);
        runs.push(run.clone());
        Ok(run.id)
    }

    async fn list(&self) -> SwarmResult<Vec<SavedRun>> {
        let mut runs = self.runs.read().clone();
        newest_first(&mut runs);
        Ok(runs)
    }

    async fn get(&self, id: Uuid) -> SwarmResult<Option<SavedRun>> {
        Ok(self.runs.read().iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> SwarmResult<()> {
        self.runs.write().retain(|r| r.id != id);
        Ok(())
    }
}
