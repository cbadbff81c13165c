//! Zip extraction that refuses entries escaping the destination

use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use super::{GhaError, GhaResult};

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Relative path an entry may be written to, or `None` if it is unsafe
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.contains('\0') {
        return None;
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }

    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Extract every entry of `reader` under `dest`
///
/// All entry names are checked before anything is written, so a malicious
/// archive leaves `dest` untouched. Returns the extracted file paths.
pub fn extract_zip<R: Read + Seek>(reader: R, dest: &Path) -> GhaResult<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(reader)?;

    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name().to_string();
        let relative = match safe_relative_path(&name) {
            Some(rel) => rel,
            None => {
                tracing::warn!(entry = %name, "rejecting archive with unsafe entry");
                return Err(GhaError::ZipSlipDetected { entry: name });
            }
        };
        let target = dest.join(&relative);
        if !target.starts_with(dest) {
            return Err(GhaError::ZipSlipDetected { entry: name });
        }
        plan.push((index, target, entry.is_dir()));
    }

    let mut written = Vec::new();
    for (index, target, is_dir) in plan {
        if is_dir {
            create_dir(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let mut entry = archive.by_index(index)?;
        let mut out = create_file(&target)?;
        io::copy(&mut entry, &mut out).map_err(|source| GhaError::Io {
            path: target.clone(),
            source,
        })?;
        written.push(target);
    }

    tracing::debug!(files = written.len(), dest = %dest.display(), "extracted archive");
    Ok(written)
}

fn create_dir(path: &Path) -> GhaResult<()> {
    let io_err = |source| GhaError::Io {
        path: path.to_path_buf(),
        source,
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(path)
            .map_err(io_err)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path).map_err(io_err)
    }
}

fn create_file(path: &Path) -> GhaResult<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options.open(path).map_err(|source| GhaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("a/b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(safe_relative_path("./a.txt"), Some(PathBuf::from("a.txt")));
        assert!(safe_relative_path("../../etc/passwd").is_none());
        assert!(safe_relative_path("a/../../b").is_none());
        assert!(safe_relative_path("/etc/passwd").is_none());
        assert!(safe_relative_path("..\\evil.txt").is_none());
        assert!(safe_relative_path("").is_none());
    }

    #[test]
    fn test_extracts_nested_files() {
        let archive = build_zip(&[
            ("reports/", b""),
            ("reports/sbom.json", b"{}"),
            ("top.txt", b"hello"),
        ]);
        let dest = TempDir::new().unwrap();

        let files = extract_zip(Cursor::new(archive), dest.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(fs::read(dest.path().join("reports/sbom.json")).unwrap(), b"{}");
        assert_eq!(fs::read(dest.path().join("top.txt")).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_extracted_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let archive = build_zip(&[("dir/file.txt", b"x")]);
        let dest = TempDir::new().unwrap();
        extract_zip(Cursor::new(archive), dest.path()).unwrap();

        let file_mode = fs::metadata(dest.path().join("dir/file.txt")).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o644);
        assert!(dest.path().join("dir").is_dir());
    }

    #[test]
    fn test_zip_slip_rejected_and_nothing_written() {
        let archive = build_zip(&[("good.txt", b"ok"), ("../../etc/passwd", b"root::0:0")]);
        let root = TempDir::new().unwrap();
        let dest = root.path().join("a").join("b");
        fs::create_dir_all(&dest).unwrap();

        let err = extract_zip(Cursor::new(archive), &dest).unwrap_err();
        match err {
            GhaError::ZipSlipDetected { entry } => assert_eq!(entry, "../../etc/passwd"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!root.path().join("etc").exists());
        assert!(!dest.join("good.txt").exists());
    }

    #[test]
    fn test_absolute_entry_rejected() {
        let archive = build_zip(&[("/tmp/evil.txt", b"x")]);
        let dest = TempDir::new().unwrap();
        assert!(matches!(
            extract_zip(Cursor::new(archive), dest.path()),
            Err(GhaError::ZipSlipDetected { .. })
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let dest = TempDir::new().unwrap();
        assert!(matches!(
            extract_zip(Cursor::new(b"not a zip".to_vec()), dest.path()),
            Err(GhaError::Zip(_))
        ));
    }
}
