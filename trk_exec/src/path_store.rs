//! # Path store
//!
//! Loads saved reference paths for replay. Paths are stored as `path1.json`, `path2.json`, ... in a
//! single directory, which is the layout used when paths are archived into a session.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::PathSpeed;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathStoreError {
    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Could not read {0:?}: {1}")]
    ReadError(PathBuf, std::io::Error),

    #[error("Could not parse {0:?}: {1}")]
    ParseError(PathBuf, serde_json::Error),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Load `path1.json`, `path2.json`, ... from the directory, stopping at the first missing index.
pub fn load_paths_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<PathSpeed>, PathStoreError> {
    let dir = dir.as_ref();

    if !dir.is_dir() {
        return Err(PathStoreError::NotADirectory(dir.to_path_buf()));
    }

    let mut paths = Vec::new();

    for index in 1.. {
        let file = dir.join(format!("path{}.json", index));

        if !file.exists() {
            break;
        }

        let content =
            fs::read_to_string(&file).map_err(|e| PathStoreError::ReadError(file.clone(), e))?;
        let path = serde_json::from_str(&content)
            .map_err(|e| PathStoreError::ParseError(file.clone(), e))?;

        paths.push(path);
    }

    info!("Loaded {} path(s) from {:?}", paths.len(), dir);

    Ok(paths)
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::{Header, Pose2};

    fn write_path(dir: &Path, index: usize, num: usize) {
        let path = PathSpeed {
            header: Header::now("map"),
            poses: (0..num).map(|i| Pose2::new(i as f64, 0.0, 0.0)).collect(),
            speed_ms: 0.3,
        };

        fs::write(
            dir.join(format!("path{}.json", index)),
            serde_json::to_string(&path).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_load_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_path(dir.path(), 1, 3);
        write_path(dir.path(), 2, 5);
        // Not loaded since path3 is missing
        write_path(dir.path(), 4, 7);

        let paths = load_paths_from_dir(dir.path()).unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].poses.len(), 3);
        assert_eq!(paths[1].poses.len(), 5);
        assert_eq!(paths[1].header.frame_id, "map");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        assert!(load_paths_from_dir(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join("path1.json"), "{ not json").unwrap();
        assert!(matches!(
            load_paths_from_dir(dir.path()),
            Err(PathStoreError::ParseError(_, _))
        ));

        assert!(matches!(
            load_paths_from_dir(dir.path().join("missing")),
            Err(PathStoreError::NotADirectory(_))
        ));
    }
}
