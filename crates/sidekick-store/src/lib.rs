use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MEMORY_FILE: &str = "memory.json";
pub const PENDING_FILE: &str = "pending.json";
pub const TRIGGER_FILE: &str = "trigger.json";
const PASS_LOCK_FILE: &str = "pass.lock";

/// Compute a deterministic project ID from a working-directory path.
/// project_id = blake3(normalize_path(input)) → hex string (first 32 chars).
pub fn project_id(cwd: &Path) -> String {
    let normalized = normalize_path(cwd);
    let hash = blake3::hash(normalized.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Normalize a path: canonicalize, lowercase on Windows, forward slashes.
fn normalize_path(p: &Path) -> String {
    let abs = p
        .canonicalize()
        .unwrap_or_else(|_| p.to_path_buf())
        .to_string_lossy()
        .to_string();
    #[cfg(windows)]
    let abs = abs.to_lowercase();
    abs.replace('\\', "/")
}

/// Return the per-user store root.
///
/// `SIDEKICK_HOME` wins; otherwise `<data_dir>/sidekick` (e.g.
/// `~/.local/share/sidekick`), falling back to `~/.sidekick`.
pub fn store_root() -> PathBuf {
    if let Some(home) = std::env::var_os("SIDEKICK_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("sidekick")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".sidekick")
    } else {
        PathBuf::from(".sidekick-store")
    }
}

/// State directory of one project: `<root>/projects/<project_id>/`.
///
/// Holds `memory.json`, `pending.json` and `trigger.json`. Every write goes
/// through [`write_atomic`], so readers see either the previous or the new
/// version of a file, never a partial one.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
    project_id: String,
    dir: PathBuf,
}

impl ProjectStore {
    /// Store for the project rooted at `cwd` under `root`. Does not touch disk.
    pub fn new(root: &Path, cwd: &Path) -> Self {
        Self::with_id(root, project_id(cwd))
    }

    pub fn with_id(root: &Path, project_id: String) -> Self {
        let dir = root.join("projects").join(&project_id);
        Self {
            root: root.to_path_buf(),
            project_id,
            dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the project directory if needed.
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn memory_path(&self) -> PathBuf {
        self.dir.join(MEMORY_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    pub fn trigger_path(&self) -> PathBuf {
        self.dir.join(TRIGGER_FILE)
    }

    /// Directory for operator-visible diagnostic markers (store-wide).
    pub fn diagnostics_dir(&self) -> PathBuf {
        self.root.join("diagnostics")
    }

    /// Read a JSON record. `Ok(None)` when the file is absent, `Err` when
    /// it exists but cannot be read or parsed.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> anyhow::Result<Option<T>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Read a JSON record, substituting `T::default()` for absent or corrupt files.
    pub fn read_json_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        match self.read_json(path) {
            Ok(Some(v)) => v,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "replacing corrupt state with default");
                T::default()
            }
        }
    }

    /// Serialize `value` and atomically replace `path` with it.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(value)?;
        write_atomic(path, data.as_bytes())
    }

    /// Remove a file; absence is not an error.
    pub fn remove(&self, path: &Path) -> anyhow::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Try to take the per-project pass lock without blocking.
    /// `Ok(None)` means another pass currently holds it.
    pub fn try_lock_pass(&self) -> anyhow::Result<Option<LockGuard>> {
        try_lock_file(&self.dir.join(PASS_LOCK_FILE))
    }
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// File-based exclusive lock guard. Released on drop.
pub struct LockGuard {
    _file: fs::File,
}

fn open_lock(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    Ok(file)
}

/// Acquire an exclusive file lock if nobody else holds it.
pub fn try_lock_file(path: &Path) -> anyhow::Result<Option<LockGuard>> {
    let file = open_lock(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(LockGuard { _file: file })),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u64,
    }

    #[test]
    fn project_id_is_deterministic() {
        let id1 = project_id(Path::new("/tmp/test-repo"));
        let id2 = project_id(Path::new("/tmp/test-repo"));
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 32);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id1, project_id(Path::new("/tmp/other-repo")));
    }

    #[test]
    fn store_root_is_not_empty() {
        let root = store_root();
        assert!(!root.as_os_str().is_empty());
    }

    #[test]
    fn project_store_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(tmp.path(), Path::new("/work/app"));
        assert_eq!(
            store.dir(),
            tmp.path().join("projects").join(project_id(Path::new("/work/app")))
        );
        assert_eq!(store.memory_path().file_name().unwrap(), "memory.json");
        assert_eq!(store.pending_path().file_name().unwrap(), "pending.json");
        assert!(!store.dir().exists());
        store.ensure_dir().unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn write_atomic_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("test.txt");
        write_atomic(&path, b"hello world").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
        write_atomic(&path, b"replaced").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "replaced");
    }

    #[test]
    fn json_round_trip_and_corrupt_default() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::with_id(tmp.path(), "p1".into());
        let path = store.trigger_path();

        assert_eq!(store.read_json::<Counter>(&path).unwrap(), None);
        store.write_json(&path, &Counter { count: 7 }).unwrap();
        assert_eq!(store.read_json_or_default::<Counter>(&path), Counter { count: 7 });

        fs::write(&path, "{garbage").unwrap();
        assert!(store.read_json::<Counter>(&path).is_err());
        assert_eq!(store.read_json_or_default::<Counter>(&path), Counter::default());
    }

    #[test]
    fn remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::with_id(tmp.path(), "p1".into());
        store.remove(&store.pending_path()).unwrap();
    }

    #[test]
    fn pass_lock_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::with_id(tmp.path(), "p1".into());
        let guard = store.try_lock_pass().unwrap();
        assert!(guard.is_some());
        drop(guard);
        assert!(store.try_lock_pass().unwrap().is_some());
    }

    #[test]
    fn try_lock_file_reports_contention() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("nested").join("test.lock");
        let guard = try_lock_file(&lock_path).unwrap();
        assert!(guard.is_some());
        assert!(lock_path.exists());
        assert!(try_lock_file(&lock_path).unwrap().is_none());
        drop(guard);
        assert!(try_lock_file(&lock_path).unwrap().is_some());
    }
}
