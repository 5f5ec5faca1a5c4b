//! Durable, monotonic persistence of the run state

use super::state::RunState;
use crate::error::CheckpointError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes `RunState` snapshots by atomic replace. Never goes backwards.
#[derive(Debug)]
pub struct Checkpointer {
    path: PathBuf,
    last_seq: u64,
    last_sealed: usize,
    last_written: Option<Vec<u8>>,
}

impl Checkpointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seq: 0,
            last_sealed: 0,
            last_written: None,
        }
    }

    /// Continue the sequence of a state loaded from disk
    pub fn resume_from(path: impl Into<PathBuf>, state: &RunState) -> Self {
        Self {
            path: path.into(),
            last_seq: state.checkpoint,
            last_sealed: state.sealed_count(),
            last_written: None,
        }
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Bump the checkpoint number and write the state.
    ///
    /// A state equal to the last one written is left alone: the file and the
    /// sequence number stay as they are.
    pub fn persist(&mut self, state: &mut RunState) -> Result<(), CheckpointError> {
        let sealed = state.sealed_count();
        if sealed < self.last_sealed {
            return Err(CheckpointError::Regression {
                last_seq: self.last_seq,
                last_sealed: self.last_sealed,
                seq: state.checkpoint.max(self.last_seq) + 1,
                sealed,
            });
        }

        if let Some(written) = &self.last_written {
            let requested = state.checkpoint;
            state.checkpoint = self.last_seq;
            if to_bytes(state)? == *written {
                log::debug!("Checkpoint #{} unchanged, not rewriting", self.last_seq);
                return Ok(());
            }
            state.checkpoint = requested;
        }

        let seq = state.checkpoint.max(self.last_seq) + 1;
        state.checkpoint = seq;
        let bytes = to_bytes(state)?;
        write_atomic(&self.path, &bytes)?;

        self.last_seq = seq;
        self.last_sealed = sealed;
        self.last_written = Some(bytes);
        log::debug!(
            "Checkpoint #{} written ({} sealed) to {}",
            seq,
            sealed,
            self.path.display()
        );
        Ok(())
    }
}

/// Load a persisted run state
pub fn load(path: &Path) -> Result<RunState, CheckpointError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Serialize a run state to its on-disk form
pub fn to_bytes(state: &RunState) -> Result<Vec<u8>, CheckpointError> {
    Ok(serde_json::to_vec_pretty(state)?)
}

/// Temp file in the target directory, fsync, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{PersonaProfile, Proficiency, TaskDescription, TestCase};
    use crate::runner::state::{TestRecorder, TestStatus};

    fn cases() -> Vec<TestCase> {
        ["t1", "t2"]
            .iter()
            .map(|t| {
                TestCase::new(
                    PersonaProfile::new("Sam", Proficiency::High),
                    TaskDescription::new(t),
                )
            })
            .collect()
    }

    #[test]
    fn test_round_trip_is_field_for_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-results.json");
        let cases = cases();
        let mut state = RunState::new("run-1", "https://example.com", &cases);
        state.seal(TestRecorder::start(&cases[0]).seal(TestStatus::Completed, None, None));

        let mut checkpointer = Checkpointer::new(&path);
        checkpointer.persist(&mut state).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.checkpoint, 1);
    }

    #[test]
    fn test_persisting_unchanged_state_keeps_file_and_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-results.json");
        let cases = cases();
        let mut state = RunState::new("run-1", "https://example.com", &cases);
        state.seal(TestRecorder::start(&cases[0]).seal(TestStatus::Completed, None, None));

        let mut checkpointer = Checkpointer::new(&path);
        checkpointer.persist(&mut state).unwrap();
        let first = fs::read(&path).unwrap();

        checkpointer.persist(&mut state).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(state.checkpoint, 1);
        assert_eq!(checkpointer.last_seq(), 1);
        assert_eq!(to_bytes(&load(&path).unwrap()).unwrap(), second);
    }

    #[test]
    fn test_refuses_to_go_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-results.json");
        let cases = cases();

        let mut newer = RunState::new("run-1", "https://example.com", &cases);
        newer.seal(TestRecorder::start(&cases[0]).seal(TestStatus::Completed, None, None));
        let mut older = RunState::new("run-1", "https://example.com", &cases);

        let mut checkpointer = Checkpointer::new(&path);
        checkpointer.persist(&mut newer).unwrap();
        let err = checkpointer.persist(&mut older).unwrap_err();
        assert!(matches!(err, CheckpointError::Regression { sealed: 0, .. }));

        // the file still holds the newer state
        assert_eq!(load(&path).unwrap().sealed_count(), 1);
    }

    #[test]
    fn test_sequence_is_monotonic_and_no_temp_file_remains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("test-results.json");
        let cases = cases();
        let mut state = RunState::new("run-1", "https://example.com", &cases);

        let mut checkpointer = Checkpointer::new(&path);
        checkpointer.persist(&mut state).unwrap();
        state.seal(TestRecorder::start(&cases[0]).seal(TestStatus::Completed, None, None));
        checkpointer.persist(&mut state).unwrap();
        assert_eq!(state.checkpoint, 2);
        assert_eq!(checkpointer.last_seq(), 2);

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["test-results.json".to_string()]);
    }

    #[test]
    fn test_resume_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-results.json");
        let mut state = RunState::new("run-1", "https://example.com", &cases());
        state.checkpoint = 7;

        let mut checkpointer = Checkpointer::resume_from(&path, &state);
        checkpointer.persist(&mut state).unwrap();
        assert_eq!(state.checkpoint, 8);
    }
}
