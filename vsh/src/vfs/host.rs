use std::ffi::OsString;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::path::{file_name, join, normalize_path};
use super::{FileInfo, Vfs, VfsError, VfsResult};

/// Virtual filesystem backed by a host directory.
///
/// Every virtual path maps under the root; symlinks that lead outside it
/// are rejected.
#[derive(Debug, Clone)]
pub struct HostFs {
    root: PathBuf,
}

impl HostFs {
    /// Use `root` as the virtual `/`, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> VfsResult<Self> {
        let root = root.as_ref();
        let display = root.to_string_lossy().into_owned();
        fs::create_dir_all(root).map_err(|e| VfsError::io(&display, e))?;
        let root = root.canonicalize().map_err(|e| VfsError::io(&display, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Virtual path for a host path inside the root.
    pub fn virtual_path(&self, host: &Path) -> Option<String> {
        let relative = host.strip_prefix(&self.root).ok()?;
        Some(normalize_path(&format!("/{}", relative.to_string_lossy())))
    }

    fn resolve(&self, path: &str) -> VfsResult<(String, PathBuf)> {
        let normalized = normalize_path(path);
        let relative = normalized.trim_start_matches('/');
        let host = safe_resolve(&self.root, relative)
            .ok_or_else(|| VfsError::Escape(normalized.clone()))?;
        Ok((normalized, host))
    }

    fn info(path: &str, metadata: &Metadata) -> FileInfo {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());

        FileInfo {
            name: file_name(path).to_string(),
            path: path.to_string(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            mtime,
        }
    }
}

/// Join `relative` under the canonical `root`; `None` if the result escapes.
fn safe_resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let joined = root.join(relative);

    let resolved = if joined.exists() {
        joined.canonicalize().ok()?
    } else {
        resolve_nonexistent_path(root, &joined)?
    };

    resolved.starts_with(root).then_some(resolved)
}

fn resolve_nonexistent_path(root: &Path, path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut missing_segments: Vec<OsString> = Vec::new();

    while !existing.exists() {
        missing_segments.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }

    let mut rebuilt = existing.canonicalize().ok()?;
    if !rebuilt.starts_with(root) {
        return None;
    }
    for segment in missing_segments.iter().rev() {
        rebuilt.push(segment);
    }
    Some(rebuilt)
}

fn create_parent(path: &str, host: &Path) -> VfsResult<()> {
    if let Some(parent) = host.parent() {
        fs::create_dir_all(parent).map_err(|e| VfsError::io(path, e))?;
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if fs::metadata(from)?.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(from, to).map(|_| ())
    }
}

impl Vfs for HostFs {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        let (path, host) = self.resolve(path)?;
        let metadata = fs::metadata(&host).map_err(|e| VfsError::io(&path, e))?;
        Ok(Self::info(&path, &metadata))
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let (path, host) = self.resolve(path)?;
        if host.is_dir() {
            return Err(VfsError::IsADirectory(path));
        }
        fs::read(&host).map_err(|e| VfsError::io(&path, e))
    }

    fn read_head(&self, path: &str, len: usize) -> VfsResult<Vec<u8>> {
        let (path, host) = self.resolve(path)?;
        if host.is_dir() {
            return Err(VfsError::IsADirectory(path));
        }
        let file = File::open(&host).map_err(|e| VfsError::io(&path, e))?;
        let mut head = Vec::with_capacity(len);
        file.take(len as u64)
            .read_to_end(&mut head)
            .map_err(|e| VfsError::io(&path, e))?;
        Ok(head)
    }

    fn write(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let (path, host) = self.resolve(path)?;
        create_parent(&path, &host)?;
        fs::write(&host, data).map_err(|e| VfsError::io(&path, e))
    }

    fn append(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let (path, host) = self.resolve(path)?;
        create_parent(&path, &host)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&host)
            .map_err(|e| VfsError::io(&path, e))?;
        file.write_all(data).map_err(|e| VfsError::io(&path, e))
    }

    fn touch(&self, path: &str) -> VfsResult<()> {
        let (path, host) = self.resolve(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&host)
            .map_err(|e| VfsError::io(&path, e))?;
        file.set_modified(SystemTime::now())
            .map_err(|e| VfsError::io(&path, e))
    }

    fn mkdir(&self, path: &str, parents: bool) -> VfsResult<()> {
        let (path, host) = self.resolve(path)?;
        let result = if parents {
            fs::create_dir_all(&host)
        } else {
            fs::create_dir(&host)
        };
        result.map_err(|e| VfsError::io(&path, e))
    }

    fn remove(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let (path, host) = self.resolve(path)?;
        if path == "/" {
            return Err(VfsError::IsADirectory(path));
        }
        let metadata = fs::metadata(&host).map_err(|e| VfsError::io(&path, e))?;
        let result = match (metadata.is_dir(), recursive) {
            (true, true) => fs::remove_dir_all(&host),
            (true, false) => fs::remove_dir(&host),
            (false, _) => fs::remove_file(&host),
        };
        result.map_err(|e| VfsError::io(&path, e))
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let (from, from_host) = self.resolve(from)?;
        let (to, mut to_host) = self.resolve(to)?;
        if to_host.is_dir() {
            to_host = self.resolve(&join(&to, file_name(&from)))?.1;
        }
        create_parent(&to, &to_host)?;
        fs::rename(&from_host, &to_host).map_err(|e| VfsError::io(&from, e))
    }

    fn copy(&self, from: &str, to: &str) -> VfsResult<()> {
        let (from, from_host) = self.resolve(from)?;
        let (to, mut to_host) = self.resolve(to)?;
        if !from_host.exists() {
            return Err(VfsError::NotFound(from));
        }
        if to_host.is_dir() {
            to_host = self.resolve(&join(&to, file_name(&from)))?.1;
        }
        if to_host.starts_with(&from_host) && from_host.is_dir() {
            return Err(VfsError::Io {
                path: to,
                source: io::Error::new(io::ErrorKind::InvalidInput, "cannot copy a directory into itself"),
            });
        }
        create_parent(&to, &to_host)?;
        copy_tree(&from_host, &to_host).map_err(|e| VfsError::io(&to, e))
    }

    fn readdir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        let (path, host) = self.resolve(path)?;
        if !host.exists() {
            return Err(VfsError::NotFound(path));
        }
        if !host.is_dir() {
            return Err(VfsError::NotADirectory(path));
        }

        let mut entries = fs::read_dir(&host)
            .map_err(|e| VfsError::io(&path, e))?
            .map(|entry| {
                let entry = entry.map_err(|e| VfsError::io(&path, e))?;
                let child = join(&path, &entry.file_name().to_string_lossy());
                let metadata =
                    fs::metadata(entry.path()).map_err(|e| VfsError::io(&child, e))?;
                Ok(Self::info(&child, &metadata))
            })
            .collect::<VfsResult<Vec<_>>>()?;

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn host_path(&self, path: &str) -> VfsResult<PathBuf> {
        self.resolve(path).map(|(_, host)| host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, HostFs) {
        let temp = tempfile::tempdir().unwrap();
        let vfs = HostFs::open(temp.path()).unwrap();
        (temp, vfs)
    }

    #[test]
    fn stat_file_returns_correct_info() {
        let (_temp, vfs) = setup();
        vfs.write("/sys/bin/sample.txt", b"hello").unwrap();

        let info = vfs.stat("/sys/bin/sample.txt").unwrap();
        assert_eq!(info.name, "sample.txt");
        assert_eq!(info.path, "/sys/bin/sample.txt");
        assert_eq!(info.size, 5);
        assert!(!info.is_dir);
        assert!(vfs.is_dir("/sys/bin"));
    }

    #[test]
    fn stat_nonexistent_is_not_found() {
        let (_temp, vfs) = setup();
        assert!(matches!(vfs.stat("/missing"), Err(VfsError::NotFound(p)) if p == "/missing"));
        assert!(!vfs.exists("/missing"));
    }

    #[test]
    fn readdir_lists_entries_sorted_by_name() {
        let (_temp, vfs) = setup();
        vfs.write("/z.txt", b"z").unwrap();
        vfs.mkdir("/a_dir", false).unwrap();
        vfs.write("/m.txt", b"m").unwrap();

        let names: Vec<String> = vfs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a_dir", "m.txt", "z.txt"]);
    }

    #[test]
    fn list_glob_filters_by_extension() {
        let (_temp, vfs) = setup();
        vfs.write("/src/main.go", b"package main").unwrap();
        vfs.write("/src/util.go", b"package main").unwrap();
        vfs.write("/src/README", b"docs").unwrap();
        vfs.mkdir("/src/pkg.go", false).unwrap();

        let matches = vfs.list_glob("/src", "go").unwrap();
        assert_eq!(matches, vec!["/src/main.go", "/src/util.go"]);
    }

    #[test]
    fn read_head_is_bounded() {
        let (_temp, vfs) = setup();
        vfs.write("/f", b"0123456789").unwrap();
        assert_eq!(vfs.read_head("/f", 4).unwrap(), b"0123");
        assert_eq!(vfs.read_head("/f", 40).unwrap(), b"0123456789");
    }

    #[test]
    fn dotdot_cannot_leave_root() {
        let (temp, vfs) = setup();
        let host = vfs.host_path("/../../etc/passwd").unwrap();
        assert!(host.starts_with(temp.path().canonicalize().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_rejected() {
        let (temp, vfs) = setup();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();

        assert!(matches!(vfs.stat("/escape"), Err(VfsError::Escape(_))));
        assert!(matches!(vfs.write("/escape/x", b"x"), Err(VfsError::Escape(_))));
    }

    #[test]
    fn append_and_touch() {
        let (_temp, vfs) = setup();
        vfs.write("/log", b"hello").unwrap();
        vfs.append("/log", b" world").unwrap();
        vfs.touch("/log").unwrap();
        vfs.touch("/new").unwrap();

        assert_eq!(vfs.read("/log").unwrap(), b"hello world");
        assert_eq!(vfs.read("/new").unwrap(), b"");
    }

    #[test]
    fn rename_into_directory_keeps_name() {
        let (_temp, vfs) = setup();
        vfs.write("/old.txt", b"abc").unwrap();
        vfs.mkdir("/dir", false).unwrap();

        vfs.rename("/old.txt", "/dir").unwrap();
        assert!(!vfs.exists("/old.txt"));
        assert_eq!(vfs.read("/dir/old.txt").unwrap(), b"abc");
    }

    #[test]
    fn copy_directory_tree() {
        let (_temp, vfs) = setup();
        vfs.write("/src/a/b/f.txt", b"x").unwrap();

        vfs.copy("/src", "/dst").unwrap();
        assert_eq!(vfs.read("/dst/a/b/f.txt").unwrap(), b"x");
        assert!(vfs.copy("/src", "/src/a").is_err());
    }

    #[test]
    fn remove_requires_recursive_for_non_empty_dirs() {
        let (_temp, vfs) = setup();
        vfs.write("/tree/a/f.txt", b"x").unwrap();

        assert!(vfs.remove("/tree", false).is_err());
        vfs.remove("/tree", true).unwrap();
        assert!(!vfs.exists("/tree"));
        assert!(vfs.remove("/", true).is_err());
    }

    #[test]
    fn virtual_path_maps_host_back() {
        let (_temp, vfs) = setup();
        vfs.mkdir("/home/me", true).unwrap();
        let host = vfs.host_path("/home/me").unwrap();
        assert_eq!(vfs.virtual_path(&host).as_deref(), Some("/home/me"));
        assert_eq!(vfs.virtual_path(Path::new("/definitely/elsewhere")), None);
    }
}
