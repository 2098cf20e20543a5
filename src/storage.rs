// SPDX-License-Identifier: GPL-3.0-only

//! Output file path resolution for recordings
//!
//! Recordings are written to unique files in the host's temporary directory;
//! moving them to a permanent location is the host's business.

use crate::errors::{CameraError, RecordingError};
use crate::recording::VideoFileType;
use std::path::PathBuf;
use tracing::debug;

/// Resolve and create a unique temporary file for a recording
///
/// The file is created eagerly so permission and disk problems surface
/// before the container writer is allocated.
pub fn create_temp_recording_file(file_type: VideoFileType) -> Result<PathBuf, CameraError> {
    let name = format!(
        "recording-{}-{}.{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S"),
        short_unique_id(),
        file_type.extension()
    );
    let path = std::env::temp_dir().join(name);

    std::fs::File::create(&path)
        .map_err(|e| RecordingError::CreateTempFileFailed(e.to_string()))?;

    debug!(path = %path.display(), "Created temporary recording file");
    Ok(path)
}

fn short_unique_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_is_created_with_extension() {
        let path = create_temp_recording_file(VideoFileType::Mp4).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "mp4");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_temp_files_are_unique() {
        let a = create_temp_recording_file(VideoFileType::Mov).unwrap();
        let b = create_temp_recording_file(VideoFileType::Mov).unwrap();
        assert_ne!(a, b);
        std::fs::remove_file(&a).unwrap();
        std::fs::remove_file(&b).unwrap();
    }
}
