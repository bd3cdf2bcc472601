use crate::infrastructure::error::InfrastructureError;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `content` in one step.
///
/// The content goes to a temporary file in the target directory (created if
/// missing) which is then renamed over the target, so readers see either the
/// old file or the new one, never a torn write.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_ref())?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_creates_missing_directories() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("nested/deeper/state.json");

        atomic_write(&file_path, "{}")?;

        assert_eq!(fs::read_to_string(file_path)?, "{}");
        Ok(())
    }

    #[test]
    fn test_replaces_existing_content() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("state.json");

        atomic_write(&file_path, "first")?;
        atomic_write(&file_path, "second")?;

        assert_eq!(fs::read_to_string(&file_path)?, "second");
        // No temp files left behind.
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
