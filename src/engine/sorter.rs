use crate::error::EngineError;
use log::{debug, info};
use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// The system `sort` utility run over map output so that every key's lines
/// arrive contiguously. Collation is forced to byte order: keys end at the
/// first space, which sorts below every key character.
pub struct ExternalSort {
    child: Child,
}

impl ExternalSort {
    /// Start sorting `input` (stdin when `None`). The caller reads the
    /// returned stream to the end, then calls [`ExternalSort::wait`].
    pub fn spawn(
        program: &str,
        input: Option<&Path>,
    ) -> Result<(Self, BufReader<ChildStdout>), EngineError> {
        let mut cmd = Command::new(program);
        // Stable sort on the key field only keeps map emission order within a group.
        cmd.args(["-s", "-t", " ", "-k", "1,1"])
            .env("LC_ALL", "C")
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        match input {
            Some(path) => {
                info!("Sorting lines from {} ...", path.display());
                cmd.arg(path).stdin(Stdio::null());
            }
            None => {
                info!("Sorting lines from stdin ...");
                cmd.stdin(Stdio::inherit());
            }
        }
        debug!("spawning {:?}", cmd);
        let mut child = cmd.spawn().map_err(EngineError::SortSpawn)?;
        let stdout = child.stdout.take().ok_or(EngineError::SortStdout)?;
        Ok((Self { child }, BufReader::with_capacity(1 << 20, stdout)))
    }

    pub fn wait(mut self) -> Result<(), EngineError> {
        let status = self.child.wait().map_err(EngineError::SortSpawn)?;
        if status.success() {
            Ok(())
        } else {
            Err(EngineError::SortFailed(status))
        }
    }

    /// Stop the child after a failure on the reading side.
    pub fn abort(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::GroupReader;
    use std::io::Write;

    #[test]
    fn sorted_output_groups_keys_contiguously() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "19/5/12 b").unwrap();
        writeln!(file, "19/5/1 x").unwrap();
        writeln!(file, "19/5/13 c").unwrap();
        writeln!(file, "19/5/12 a").unwrap();
        writeln!(file, "19/5/1 y").unwrap();
        file.flush().unwrap();

        let (sort, stdout) = ExternalSort::spawn("sort", Some(file.path())).unwrap();
        let mut reader = GroupReader::new(stdout);
        let mut groups = Vec::new();
        while let Some(g) = reader.next_group().unwrap() {
            groups.push((g.key, g.payloads));
        }
        sort.wait().unwrap();
        assert_eq!(
            groups,
            vec![
                ("19/5/1".to_string(), vec!["x".to_string(), "y".to_string()]),
                ("19/5/12".to_string(), vec!["b".to_string(), "a".to_string()]),
                ("19/5/13".to_string(), vec!["c".to_string()]),
            ]
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = ExternalSort::spawn("definitely-not-a-sort-binary", None);
        assert!(matches!(result, Err(EngineError::SortSpawn(_))));
    }

    #[test]
    fn failing_sort_is_reported() {
        let (sort, stdout) =
            ExternalSort::spawn("sort", Some(Path::new("/nonexistent/input.txt"))).unwrap();
        drop(stdout);
        assert!(matches!(sort.wait(), Err(EngineError::SortFailed(_))));
    }
}
