//! Advisory locking around the backlog directory so concurrent `flow
//! backlog` invocations don't interleave writes.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

const LOCK_FILE: &str = ".lock";
const TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct BacklogLock {
    file: File,
    path: PathBuf,
}

impl BacklogLock {
    /// Blocks until the lock is acquired or `TIMEOUT` elapses.
    pub fn acquire(backlog_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(backlog_dir)?;
        let path = backlog_dir.join(LOCK_FILE);
        let file = OpenOptions::new().create(true).write(true).open(&path)?;

        let deadline = Instant::now() + TIMEOUT;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(BacklogLock { file, path }),
                Err(_) if Instant::now() < deadline => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        format!("could not acquire backlog lock at {}: {e}", path.display()),
                    ));
                }
            }
        }
    }
}

impl Drop for BacklogLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = &self.path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = BacklogLock::acquire(dir.path()).unwrap();
        }
        let _lock_again = BacklogLock::acquire(dir.path()).unwrap();
    }
}
