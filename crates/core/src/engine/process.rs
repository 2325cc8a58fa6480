//! Engine process supervision
//!
//! Locates an engine binary, runs it as a background child process with
//! piped stdio, and owns its lifetime. The raw pipes never leave this
//! module: all protocol traffic goes through [`EngineWriter`] and
//! [`EngineReader`], which are also constructible from in-memory streams so
//! sessions can be exercised without a real process.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::engine::protocol::UciCommand;
use crate::error::{Error, Result};

#[cfg(windows)]
const ENGINE_NAMES: &[&str] = &["stockfish.exe", "stockfish"];
#[cfg(not(windows))]
const ENGINE_NAMES: &[&str] = &["stockfish"];

/// Resolves the engine binary to run.
///
/// An explicit path always wins over discovery; it must point at an
/// existing executable.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if is_executable(path) => Ok(path.to_path_buf()),
        Some(_) => Err(Error::NotFound),
        None => discover(),
    }
}

/// Searches for an engine binary in the documented order: the bundled
/// `resources` directory next to the running executable, then the
/// executable's own directory, then the system `PATH`. Returns the first
/// existing executable match.
pub fn discover() -> Result<PathBuf> {
    discover_in(&application_roots(), env::var_os("PATH"))
}

fn application_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            roots.push(dir.join("resources"));
            roots.push(dir.to_path_buf());
        }
    }
    roots
}

fn discover_in(roots: &[PathBuf], path_var: Option<OsString>) -> Result<PathBuf> {
    for root in roots {
        for name in ENGINE_NAMES {
            let candidate = root.join(name);
            if is_executable(&candidate) {
                debug!(path = %candidate.display(), "found engine binary");
                return Ok(candidate);
            }
        }
    }
    if let Some(path_var) = path_var {
        for dir in env::split_paths(&path_var) {
            for name in ENGINE_NAMES {
                let candidate = dir.join(name);
                if is_executable(&candidate) {
                    debug!(path = %candidate.display(), "found engine binary on PATH");
                    return Ok(candidate);
                }
            }
        }
    }
    Err(Error::NotFound)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A running engine child process.
pub struct EngineProcess {
    child: Child,
    path: PathBuf,
}

impl EngineProcess {
    /// Launches the binary with piped stdin/stdout. Stderr is discarded,
    /// never parsed as protocol. On Windows the child gets no console
    /// window.
    pub fn spawn(path: &Path) -> Result<(EngineProcess, EngineWriter, EngineReader)> {
        let mut command = Command::new(path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {}", path.display(), e)))?;

        // Catch binaries that died before producing any output.
        if let Ok(Some(status)) = child.try_wait() {
            return Err(Error::Spawn(format!(
                "{}: exited immediately with {}",
                path.display(),
                status
            )));
        }

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn("engine stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn("engine stdout not captured".to_string()))?;

        debug!(path = %path.display(), pid = child.id(), "engine process started");
        let process = EngineProcess { child, path: path.to_path_buf() };
        Ok((process, EngineWriter::new(stdin), EngineReader::new(stdout)))
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits up to `grace` for the child to exit on its own (a `quit`
    /// should already have been sent), then kills it. Only forced-kill
    /// path in the crate.
    pub async fn wait_or_kill(&mut self, grace: Duration) {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "engine exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for engine exit"),
            Err(_) => {
                warn!(path = %self.path.display(), "engine ignored quit, killing");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill engine process");
                }
            }
        }
    }
}

/// Single-writer path to the engine's stdin.
///
/// Each [`send`](EngineWriter::send) writes one whole command line plus
/// terminator and flushes, so commands are never interleaved mid-line.
pub struct EngineWriter {
    inner: Box<dyn AsyncWrite + Send + Unpin>,
}

impl EngineWriter {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        EngineWriter { inner: Box::new(writer) }
    }

    pub async fn send(&mut self, command: &UciCommand) -> Result<()> {
        let line = command.encode();
        debug!(command = %line, "-> engine");
        self.inner.write_all(format!("{}\n", line).as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

/// Line-oriented reader over the engine's stdout.
pub struct EngineReader {
    lines: Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>,
}

impl EngineReader {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let boxed: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        EngineReader { lines: BufReader::new(boxed).lines() }
    }

    /// Reads the next newline-terminated line. `Ok(None)` means the stream
    /// closed: the engine exited.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_binary(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_discovery_order() {
        let resources = tempfile::tempdir().unwrap();
        let app_dir = tempfile::tempdir().unwrap();
        let path_dir = tempfile::tempdir().unwrap();

        let bundled = fake_binary(resources.path(), "stockfish");
        let beside_app = fake_binary(app_dir.path(), "stockfish");
        let on_path = fake_binary(path_dir.path(), "stockfish");

        let roots = vec![resources.path().to_path_buf(), app_dir.path().to_path_buf()];
        let path_var = Some(path_dir.path().to_path_buf().into_os_string());

        // bundled resources win
        assert_eq!(discover_in(&roots, path_var.clone()).unwrap(), bundled);

        // then the application directory
        std::fs::remove_file(&bundled).unwrap();
        assert_eq!(discover_in(&roots, path_var.clone()).unwrap(), beside_app);

        // then PATH
        std::fs::remove_file(&beside_app).unwrap();
        assert_eq!(discover_in(&roots, path_var).unwrap(), on_path);
    }

    #[test]
    fn test_discovery_empty_is_not_found() {
        let empty = tempfile::tempdir().unwrap();
        let result = discover_in(
            &[empty.path().to_path_buf()],
            Some(empty.path().to_path_buf().into_os_string()),
        );
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stockfish"), "not a binary").unwrap();
        let result = discover_in(&[dir.path().to_path_buf()], None);
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let result = locate(Some(Path::new("/definitely/not/here/stockfish")));
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let result = EngineProcess::spawn(Path::new("/definitely/not/here/stockfish"));
        assert!(matches!(result, Err(Error::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_or_kill_escalates() {
        // cat blocks on stdin forever, so the grace period has to expire
        // and the kill path runs.
        let (mut process, _writer, _reader) =
            EngineProcess::spawn(Path::new("/bin/cat")).unwrap();
        process.wait_or_kill(Duration::from_millis(100)).await;
        assert!(matches!(process.child.try_wait(), Ok(Some(_))));
    }
}
