//! In-memory workspace collaborators.
//!
//! `MemoryFileStore` keeps files in a map, `MemoryVcs` tracks a committed tree
//! and an index over that store, and `ScriptedSandbox` replays canned command
//! outputs. Used by tests and by hosts that want a dry run.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use stepwise_core::error::WorkspaceError;
use stepwise_core::workspace::{
    CommandOutput, CommandSandbox, DirEntry, FileStore, Vcs, VcsStatus, Workspace,
};
use stepwise_security::normalize_relative;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(path: &str) -> Result<String, WorkspaceError> {
    normalize_relative(path).map_err(|e| WorkspaceError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// A file store backed by a sorted map of path to bytes.
///
/// Directories are implicit: a directory exists while some file lives under it.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    max_file_bytes: Option<u64>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = Some(max);
        self
    }

    /// Seed a file without going through the trait (no quota check).
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        if let Ok(path) = normalize(path) {
            lock(&self.files).insert(path, contents.into());
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize(path).ok()?;
        lock(&self.files).get(&path).cloned()
    }

    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        lock(&self.files).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.files).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.files).is_empty()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceError> {
        let key = normalize(path)?;
        lock(&self.files)
            .get(&key)
            .cloned()
            .ok_or_else(|| WorkspaceError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceError> {
        let key = normalize(path)?;
        if key.is_empty() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "cannot write to the workspace root".into(),
            });
        }
        if let Some(max) = self.max_file_bytes
            && bytes.len() as u64 > max
        {
            return Err(WorkspaceError::QuotaExceeded(format!(
                "{path} ({} bytes, limit {max})",
                bytes.len()
            )));
        }

        let mut files = lock(&self.files);
        let dir_prefix = format!("{key}/");
        if files.keys().any(|k| k.starts_with(&dir_prefix)) {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "is a directory".into(),
            });
        }
        files.insert(key, bytes.to_vec());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
        let key = normalize(path)?;
        let files = lock(&self.files);
        if files.contains_key(&key) {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "not a directory".into(),
            });
        }

        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };
        let mut entries: BTreeMap<String, DirEntry> = BTreeMap::new();
        for (file, bytes) in files.range(prefix.clone()..) {
            let Some(rest) = file.strip_prefix(&prefix) else {
                break;
            };
            let (name, is_dir) = match rest.split_once('/') {
                Some((dir, _)) => (dir, true),
                None => (rest, false),
            };
            let entry_path = format!("{prefix}{name}");
            entries.entry(entry_path.clone()).or_insert(DirEntry {
                name: name.to_string(),
                path: entry_path,
                is_dir,
                size: if is_dir { 0 } else { bytes.len() as u64 },
            });
        }

        if entries.is_empty() && !key.is_empty() {
            return Err(WorkspaceError::NotFound(path.to_string()));
        }
        Ok(entries.into_values().collect())
    }

    async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
        let key = normalize(path)?;
        lock(&self.files)
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| WorkspaceError::NotFound(path.to_string()))
    }
}

#[derive(Debug, Default)]
struct VcsState {
    head: BTreeMap<String, Vec<u8>>,
    index: BTreeMap<String, Vec<u8>>,
    commits: Vec<(String, String)>,
}

/// Version control over a `MemoryFileStore`: a committed tree plus an index.
#[derive(Debug)]
pub struct MemoryVcs {
    files: Option<Arc<MemoryFileStore>>,
    branch: String,
    state: Mutex<VcsState>,
}

impl MemoryVcs {
    pub fn new(files: Arc<MemoryFileStore>) -> Self {
        Self {
            files: Some(files),
            branch: "main".into(),
            state: Mutex::new(VcsState::default()),
        }
    }

    /// A repository that reports `NotInitialized` for every operation.
    pub fn uninitialized() -> Self {
        Self {
            files: None,
            branch: "main".into(),
            state: Mutex::new(VcsState::default()),
        }
    }

    /// `(commit id, message)` pairs, oldest first.
    pub fn commits(&self) -> Vec<(String, String)> {
        lock(&self.state).commits.clone()
    }

    fn store(&self) -> Result<&MemoryFileStore, WorkspaceError> {
        self.files.as_deref().ok_or(WorkspaceError::NotInitialized)
    }
}

#[async_trait]
impl Vcs for MemoryVcs {
    async fn status(&self) -> Result<VcsStatus, WorkspaceError> {
        let working = self.store()?.snapshot();
        let state = lock(&self.state);

        let mut status = VcsStatus {
            branch: Some(self.branch.clone()),
            ..VcsStatus::default()
        };
        let staged: BTreeSet<&String> = state
            .index
            .keys()
            .chain(state.head.keys())
            .filter(|p| state.index.get(*p) != state.head.get(*p))
            .collect();
        status.staged = staged.into_iter().cloned().collect();

        for (path, bytes) in &working {
            match state.index.get(path) {
                Some(indexed) if indexed != bytes => status.modified.push(path.clone()),
                Some(_) => {}
                None => status.untracked.push(path.clone()),
            }
        }
        for path in state.index.keys() {
            if !working.contains_key(path) {
                status.modified.push(path.clone());
            }
        }
        status.modified.sort();
        Ok(status)
    }

    async fn stage_all(&self) -> Result<(), WorkspaceError> {
        let working = self.store()?.snapshot();
        lock(&self.state).index = working;
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<String, WorkspaceError> {
        self.store()?;
        let mut state = lock(&self.state);
        if state.index == state.head {
            return Err(WorkspaceError::NothingStaged);
        }
        state.head = state.index.clone();
        let id = format!("{:07x}", 0x51ce_000 + state.commits.len());
        state.commits.push((id.clone(), message.to_string()));
        Ok(id)
    }
}

/// A command sandbox that replays queued results and records what was run.
///
/// When the queue is empty, commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    queue: Mutex<VecDeque<Result<CommandOutput, WorkspaceError>>>,
    history: Mutex<Vec<String>>,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, stdout: &str, stderr: &str, exit_code: i32) {
        lock(&self.queue).push_back(Ok(CommandOutput {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }));
    }

    pub fn push_error(&self, error: WorkspaceError) {
        lock(&self.queue).push_back(Err(error));
    }

    /// Commands run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.history).clone()
    }
}

#[async_trait]
impl CommandSandbox for ScriptedSandbox {
    async fn run(&self, command: &str) -> Result<CommandOutput, WorkspaceError> {
        lock(&self.history).push(command.to_string());
        lock(&self.queue).pop_front().unwrap_or_else(|| {
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            })
        })
    }
}

/// A fully in-memory workspace with handles to each collaborator.
#[derive(Debug, Clone)]
pub struct MemoryWorkspace {
    pub files: Arc<MemoryFileStore>,
    pub vcs: Arc<MemoryVcs>,
    pub sandbox: Arc<ScriptedSandbox>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::with_files(MemoryFileStore::new())
    }

    pub fn with_files(files: MemoryFileStore) -> Self {
        let files = Arc::new(files);
        Self {
            vcs: Arc::new(MemoryVcs::new(files.clone())),
            files,
            sandbox: Arc::new(ScriptedSandbox::new()),
        }
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.files.clone(), self.vcs.clone(), self.sandbox.clone())
    }
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
