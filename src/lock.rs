use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;
use crate::log_warn;

/// Exclusive write access to one library file for the length of an import.
///
/// Held through an OS file lock on `<library>.lock`. The importer's PID sits
/// in `<library>.pid` so a second import can say who is in the way. Both are
/// released when the guard goes out of scope.
#[must_use = "the library is unlocked as soon as LibraryLock is dropped"]
pub struct LibraryLock {
    file: fslock::LockFile,
    library: PathBuf,
    pid_path: PathBuf,
}

impl LibraryLock {
    /// Library file this lock protects.
    pub fn library(&self) -> &Path {
        &self.library
    }
}

impl std::fmt::Debug for LibraryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryLock")
            .field("library", &self.library)
            .finish()
    }
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            log_warn!("Could not unlock {}: {}", self.library.display(), e);
        }
        if let Err(e) = fs::remove_file(&self.pid_path) {
            log_warn!("Could not remove {}: {}", self.pid_path.display(), e);
        }
    }
}

/// `<library>.lock` and `<library>.pid`, next to the library file.
pub fn lock_paths(library_path: &Path) -> (PathBuf, PathBuf) {
    let with_suffix = |suffix: &str| {
        let mut name = library_path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    };
    (with_suffix(".lock"), with_suffix(".pid"))
}

/// Lock the library at `library_path` for this process, creating its
/// directory when needed. Fails with `CatalogError::Lock` if another process
/// already holds it.
pub fn try_acquire(library_path: &Path) -> Result<LibraryLock, CatalogError> {
    if let Some(dir) = library_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| CatalogError::Lock(format!("Cannot create {}: {}", dir.display(), e)))?;
    }

    let (lock_path, pid_path) = lock_paths(library_path);
    let mut file = fslock::LockFile::open(&lock_path).map_err(|e| {
        CatalogError::Lock(format!("Cannot open {}: {}", lock_path.display(), e))
    })?;

    let locked = file
        .try_lock()
        .map_err(|e| CatalogError::Lock(format!("Cannot lock {}: {}", lock_path.display(), e)))?;
    if !locked {
        let holder = recorded_pid(&pid_path);
        return Err(CatalogError::Lock(contention_message(
            holder,
            holder.map(is_pid_alive).unwrap_or(false),
            &lock_path,
            &pid_path,
        )));
    }

    fs::write(&pid_path, std::process::id().to_string()).map_err(|e| {
        CatalogError::Lock(format!("Cannot write {}: {}", pid_path.display(), e))
    })?;

    Ok(LibraryLock {
        file,
        library: library_path.to_path_buf(),
        pid_path,
    })
}

fn recorded_pid(pid_path: &Path) -> Option<i32> {
    fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
}

fn contention_message(holder: Option<i32>, alive: bool, lock_path: &Path, pid_path: &Path) -> String {
    match holder {
        Some(pid) if alive => format!("Another playdex import is running (PID {})", pid),
        Some(pid) => format!(
            "Library lock is held but PID {} has exited. Remove {} and {} to recover",
            pid,
            lock_path.display(),
            pid_path.display()
        ),
        None => format!(
            "Another playdex process holds the library lock. If it is stale, remove {}",
            lock_path.display()
        ),
    }
}

fn is_pid_alive(pid: i32) -> bool {
    // Signal 0 only checks that the process exists.
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_pid_alive(std::process::id() as i32));
    }

    #[test]
    fn absent_process_is_not_alive() {
        assert!(!is_pid_alive(99_999_999));
    }

    #[test]
    fn lock_paths_append_suffixes() {
        let (lock, pid) = lock_paths(Path::new("/data/library.yaml"));
        assert_eq!(lock, PathBuf::from("/data/library.yaml.lock"));
        assert_eq!(pid, PathBuf::from("/data/library.yaml.pid"));
    }

    #[test]
    fn recorded_pid_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("library.yaml.pid");

        assert_eq!(recorded_pid(&pid_path), None);
        fs::write(&pid_path, "not a pid").unwrap();
        assert_eq!(recorded_pid(&pid_path), None);
        fs::write(&pid_path, " 4242\n").unwrap();
        assert_eq!(recorded_pid(&pid_path), Some(4242));
    }

    #[test]
    fn contention_message_for_dead_holder_names_both_files() {
        let message = contention_message(
            Some(4242),
            false,
            Path::new("/data/library.yaml.lock"),
            Path::new("/data/library.yaml.pid"),
        );
        assert!(message.contains("PID 4242 has exited"));
        assert!(message.contains("/data/library.yaml.lock"));
        assert!(message.contains("/data/library.yaml.pid"));
    }
}
