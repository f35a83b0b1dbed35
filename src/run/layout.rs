use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::BenchError;

/// High-water mark of allocated run ids, kept in the destination directory.
pub const LAST_RUN_MARKER: &str = ".last_run";

/// A numbered directory (`001`, `002`, ...) holding one invocation's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    id: u32,
    path: PathBuf,
}

impl RunDirectory {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> String {
        format_run_id(self.id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of a provider's artifact inside the run.
    pub fn artifact_path(&self, provider: &str) -> PathBuf {
        self.path.join(format!("{provider}.json"))
    }
}

fn format_run_id(id: u32) -> String {
    format!("{id:03}")
}

/// Creates the destination if needed and checks that it accepts new files.
pub fn ensure_destination(root: &Path) -> Result<(), BenchError> {
    fs::create_dir_all(root)
        .map_err(|e| BenchError::config(format!("cannot create {}", root.display()), e))?;
    let check = root.join(".write_check");
    fs::write(&check, b"")
        .map_err(|e| BenchError::config(format!("{} is not writable", root.display()), e))?;
    let _ = fs::remove_file(&check);
    Ok(())
}

/// Next unused run id: one past the larger of the highest numeric-suffixed
/// name in `root` and the persisted high-water mark.
pub fn next_run_id(root: &Path) -> Result<u32, BenchError> {
    let scanned = scan_max_id(root)?;
    Ok(scanned.max(read_marker(root)) + 1)
}

/// Allocates and creates a fresh run directory.
///
/// The directory is created non-recursively; if another invocation took the
/// same id first, allocation moves on to the next one.
pub fn allocate_run_dir(root: &Path) -> Result<RunDirectory, BenchError> {
    let mut id = next_run_id(root)?;
    loop {
        let path = root.join(format_run_id(id));
        match fs::create_dir(&path) {
            Ok(()) => {
                write_marker(root, id)?;
                log::info!("Allocated run directory {}", path.display());
                return Ok(RunDirectory { id, path });
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                log::debug!("{} already taken, trying next id", path.display());
                id += 1;
            }
            Err(err) => {
                return Err(BenchError::config(
                    format!("cannot create run directory {}", path.display()),
                    err,
                ))
            }
        }
    }
}

fn scan_max_id(root: &Path) -> Result<u32, BenchError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(BenchError::config(
                format!("cannot list {}", root.display()),
                err,
            ))
        }
    };
    Ok(entries
        .filter_map(Result::ok)
        .filter_map(|entry| numeric_suffix(&entry.file_name().to_string_lossy()))
        .max()
        .unwrap_or(0))
}

/// Trailing digit run of a name, ignoring a file extension.
fn numeric_suffix(name: &str) -> Option<u32> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    let digits_start = stem
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    stem[digits_start..].parse().ok()
}

fn read_marker(root: &Path) -> u32 {
    fs::read_to_string(root.join(LAST_RUN_MARKER))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

fn write_marker(root: &Path, id: u32) -> Result<(), BenchError> {
    let id = id.max(read_marker(root));
    fs::write(root.join(LAST_RUN_MARKER), format!("{id}\n")).map_err(|e| {
        BenchError::config(format!("cannot update run marker in {}", root.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case("001", Some(1))]
    #[case("042", Some(42))]
    #[case("inference_data_007.json", Some(7))]
    #[case("run12", Some(12))]
    #[case(".last_run", None)]
    #[case("claude.json", None)]
    #[case("notes", None)]
    fn parses_numeric_suffixes(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(numeric_suffix(name), expected);
    }

    #[test]
    fn empty_destination_starts_at_one() {
        let dir = tempdir().expect("tempdir");
        assert_eq!(next_run_id(dir.path()).expect("scan"), 1);
        assert_eq!(next_run_id(&dir.path().join("missing")).expect("scan"), 1);
        let run = allocate_run_dir(dir.path()).expect("allocate");
        assert_eq!(run.name(), "001");
        assert!(run.path().is_dir());
    }

    #[test]
    fn continues_after_existing_runs() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("001")).expect("mkdir");
        fs::create_dir(dir.path().join("002")).expect("mkdir");
        assert_eq!(next_run_id(dir.path()).expect("scan"), 3);
        assert_eq!(allocate_run_dir(dir.path()).expect("allocate").name(), "003");
    }

    #[test]
    fn ids_are_never_reused_after_deletion() {
        let dir = tempdir().expect("tempdir");
        let first = allocate_run_dir(dir.path()).expect("allocate");
        let second = allocate_run_dir(dir.path()).expect("allocate");
        fs::remove_dir(first.path()).expect("rm");
        assert_eq!(allocate_run_dir(dir.path()).expect("allocate").id(), 3);

        fs::remove_dir(second.path()).expect("rm");
        fs::remove_dir(dir.path().join("003")).expect("rm");
        assert_eq!(allocate_run_dir(dir.path()).expect("allocate").id(), 4);
    }

    #[test]
    fn marker_and_existing_names_both_count() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(LAST_RUN_MARKER), "4\n").expect("marker");
        fs::create_dir(dir.path().join("005")).expect("mkdir");
        assert_eq!(allocate_run_dir(dir.path()).expect("allocate").id(), 6);
    }

    #[test]
    fn file_in_place_of_destination_is_a_configuration_error() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("outputs");
        fs::write(&blocker, "not a directory").expect("write");
        assert!(ensure_destination(&blocker).unwrap_err().is_fatal());
    }
}
