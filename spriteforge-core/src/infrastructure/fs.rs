use crate::infrastructure::error::InfrastructureError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write content to a file atomically using a temporary file.
///
/// This function:
/// 1. Creates a temporary file in the same directory as the target path.
/// 2. Writes the content and fsyncs it.
/// 3. Persists (renames) the temporary file to the target path.
///
/// This ensures that the target file is either fully written or not written at all,
/// preventing partial data corruption. A reader always sees the prior
/// content or the full new content.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    // Create a temporary file in the same directory to ensure atomic rename works across filesystems
    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(InfrastructureError::Io)?;

    // Write content
    temp_file
        .write_all(content.as_ref())
        .map_err(InfrastructureError::Io)?;

    // Flush to disk before the rename becomes visible
    temp_file
        .as_file()
        .sync_all()
        .map_err(InfrastructureError::Io)?;

    // Atomic rename (persist)
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Serialize to pretty JSON and write atomically. Every JSON state file in
/// a run directory goes through here.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), InfrastructureError> {
    let content = serde_json::to_string_pretty(data)?;
    atomic_write(path, content)
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, InfrastructureError> {
    if !path.exists() {
        return Err(InfrastructureError::StateNotFound(
            path.to_string_lossy().into_owned(),
        ));
    }
    std::fs::read(path).map_err(InfrastructureError::Io)
}

/// Read and deserialize a JSON state file. A shape mismatch is a hard
/// error the caller surfaces to the operator, never a panic.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let bytes = read_bytes(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Append one line to a JSONL log, creating the file on first use. The
/// audit log is append-only by contract; atomic replace would lose history.
pub fn append_jsonl<T: Serialize>(path: &Path, entry: &T) -> Result<(), InfrastructureError> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(InfrastructureError::Io)?;
    file.write_all(line.as_bytes()).map_err(InfrastructureError::Io)?;
    Ok(())
}

/// Move a corrupted artifact aside instead of deleting it. Returns the
/// quarantine path.
pub fn quarantine(path: &Path) -> Result<PathBuf, InfrastructureError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let quarantine_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("quarantine");
    std::fs::create_dir_all(&quarantine_dir).map_err(InfrastructureError::Io)?;

    let mut target = quarantine_dir.join(&file_name);
    let mut counter = 1;
    while target.exists() {
        target = quarantine_dir.join(format!("{file_name}.{counter}"));
        counter += 1;
    }
    std::fs::rename(path, &target).map_err(InfrastructureError::Io)?;
    Ok(target)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_state_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("state.json");
        let content = r#"{"run_id":"run_1","current_state":"INIT","approved_frames":[]}"#;

        atomic_write(&file_path, content)?;

        assert!(file_path.exists());
        // No temp file left behind after the rename.
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        let read_content = fs::read_to_string(file_path)?;
        assert_eq!(read_content, content);
        Ok(())
    }

    #[test]
    fn test_atomic_write_replaces_prior_checkpoint() -> Result<()> {
        // Every transition rewrites state.json in place; a reader must
        // only ever see the latest full snapshot.
        let dir = tempdir()?;
        let file_path = dir.path().join("state.json");

        atomic_write(&file_path, r#"{"current_state":"GENERATING","current_attempt":1}"#)?;
        atomic_write(&file_path, r#"{"current_state":"AUDITING","current_attempt":1}"#)?;

        let read_content = fs::read_to_string(file_path)?;
        assert_eq!(
            read_content,
            r#"{"current_state":"AUDITING","current_attempt":1}"#
        );
        Ok(())
    }

    #[test]
    fn test_json_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("state.json");

        let data = serde_json::json!({"run_id": "run_1", "frames": [0, 1]});
        write_json(&path, &data)?;

        let loaded: serde_json::Value = read_json(&path)?;
        assert_eq!(loaded, data);
        Ok(())
    }

    #[test]
    fn test_read_json_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let err = read_json::<serde_json::Value>(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, InfrastructureError::StateNotFound(_)));
    }

    #[test]
    fn test_append_jsonl_accumulates_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("audit_log.jsonl");

        append_jsonl(&path, &serde_json::json!({"attempt": 1}))?;
        append_jsonl(&path, &serde_json::json!({"attempt": 2}))?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn test_quarantine_moves_file_aside() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("frame_0001.png");
        fs::write(&path, b"corrupt")?;

        let moved = quarantine(&path)?;
        assert!(!path.exists());
        assert!(moved.exists());
        assert!(moved.to_string_lossy().contains("quarantine"));

        // A second quarantine of the same name must not clobber the first.
        fs::write(&path, b"corrupt2")?;
        let moved2 = quarantine(&path)?;
        assert_ne!(moved, moved2);
        Ok(())
    }
}
