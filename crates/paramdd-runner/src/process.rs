//! Oracle child-process lifecycle
//!
//! Every oracle process lives in a global registry while it runs, so a
//! SIGINT handler can kill and reap it from another thread. The
//! [`ProcessGuard`] owning the registry slot blocks on the child's exit,
//! enforces the timeout, and kills the child if it is dropped early.
//!
//! Waiting blocks until the child exits (or the current slice ends), so the
//! caller sees the exit as it happens and can time the run precisely.

use std::collections::HashMap;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Longest single blocking wait on a child
///
/// Bounds how long [`kill_all_registered`] can stall on a child that another
/// thread is waiting for.
pub const WAIT_SLICE: Duration = Duration::from_millis(50);

type SharedChild = Arc<Mutex<Child>>;

/// Global registry of running oracle processes, keyed by slot
static PROCESS_REGISTRY: OnceLock<Mutex<HashMap<u64, SharedChild>>> = OnceLock::new();

static NEXT_SLOT: AtomicU64 = AtomicU64::new(0);

fn get_registry() -> &'static Mutex<HashMap<u64, SharedChild>> {
    PROCESS_REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_child(child: &SharedChild) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

fn kill_and_reap(child: &SharedChild) {
    let mut child = lock_child(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Kill and reap all registered child processes
///
/// Returns the number of processes cleaned up.
#[must_use]
pub fn kill_all_registered() -> usize {
    let drained: Vec<SharedChild> = get_registry().lock().map_or_else(
        |_| Vec::new(),
        |mut registry| registry.drain().map(|(_, child)| child).collect(),
    );
    for child in &drained {
        kill_and_reap(child);
    }
    drained.len()
}

/// Number of oracle processes currently registered
#[must_use]
pub fn registered_count() -> usize {
    get_registry().lock().map_or(0, |registry| registry.len())
}

/// How a guarded process finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Process exited on its own
    Exited(ExitStatus),
    /// Deadline passed; the process was killed and reaped
    TimedOut,
    /// Process was reaped by [`kill_all_registered`] while we waited
    Reaped,
}

/// RAII guard for a registered child process
///
/// If the guard is dropped while the child is still registered, the child is
/// killed and reaped.
#[derive(Debug)]
pub struct ProcessGuard {
    slot: u64,
    pid: u32,
    child: SharedChild,
}

impl ProcessGuard {
    /// Spawn `command` and register the child
    ///
    /// # Errors
    ///
    /// Returns the spawn error if the process cannot be started.
    pub fn spawn(command: &mut Command) -> std::io::Result<Self> {
        let child = command.spawn()?;
        let pid = child.id();
        let child = Arc::new(Mutex::new(child));
        let slot = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
        match get_registry().lock() {
            Ok(mut registry) => {
                registry.insert(slot, Arc::clone(&child));
            }
            Err(_) => {
                kill_and_reap(&child);
                return Err(std::io::Error::other("Process registry poisoned"));
            }
        }
        Ok(Self { slot, pid, child })
    }

    /// Check the child once without blocking
    ///
    /// Returns `Ok(None)` while it is still running.
    ///
    /// # Errors
    ///
    /// Returns an error if `try_wait` fails.
    pub fn try_wait(&self) -> std::io::Result<Option<WaitOutcome>> {
        let status = lock_child(&self.child).try_wait()?;
        Ok(status.map(|status| self.finish(status)))
    }

    /// Block until exit, killing the child once `timeout` has elapsed
    ///
    /// Returns as soon as the child exits.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the child fails.
    pub fn wait_timeout(&self, timeout: Duration) -> std::io::Result<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(if self.kill() {
                    WaitOutcome::TimedOut
                } else {
                    WaitOutcome::Reaped
                });
            }
            // The lock is released between slices so another thread can reap.
            let status = lock_child(&self.child).wait_timeout(remaining.min(WAIT_SLICE))?;
            if let Some(status) = status {
                return Ok(self.finish(status));
            }
        }
    }

    /// Kill and reap the child if it is still registered
    ///
    /// Returns `false` if something else already reaped it.
    pub fn kill(&self) -> bool {
        if !self.unregister() {
            return false;
        }
        kill_and_reap(&self.child);
        true
    }

    /// Get the process ID
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// An exit seen after the slot was taken by someone else was a reap
    fn finish(&self, status: ExitStatus) -> WaitOutcome {
        if self.unregister() {
            WaitOutcome::Exited(status)
        } else {
            WaitOutcome::Reaped
        }
    }

    fn unregister(&self) -> bool {
        get_registry()
            .lock()
            .ok()
            .and_then(|mut registry| registry.remove(&self.slot))
            .is_some()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.kill() {
            tracing::debug!(pid = self.pid, "Killed abandoned oracle process");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    fn quiet(program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }

    #[test]
    fn test_wait_timeout_success() {
        let guard = ProcessGuard::spawn(&mut quiet("true")).expect("Failed to spawn");
        match guard.wait_timeout(Duration::from_secs(5)).expect("Wait failed") {
            WaitOutcome::Exited(status) => assert!(status.success()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_wait_timeout_failure_status() {
        let guard = ProcessGuard::spawn(&mut quiet("false")).expect("Failed to spawn");
        match guard.wait_timeout(Duration::from_secs(5)).expect("Wait failed") {
            WaitOutcome::Exited(status) => assert!(!status.success()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_wait_timeout_kills_hung_process() {
        let mut cmd = quiet("sleep");
        cmd.arg("60");
        let guard = ProcessGuard::spawn(&mut cmd).expect("Failed to spawn");
        let pid = guard.pid();
        let start = Instant::now();
        let outcome = guard
            .wait_timeout(Duration::from_millis(100))
            .expect("Wait failed");
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
        std::thread::sleep(Duration::from_millis(50));
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }

    #[test]
    fn test_drop_kills_running_process() {
        let mut cmd = quiet("sleep");
        cmd.arg("60");
        let guard = ProcessGuard::spawn(&mut cmd).expect("Failed to spawn");
        let pid = guard.pid();
        drop(guard);
        std::thread::sleep(Duration::from_millis(100));
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }

    #[test]
    fn test_killed_process_reports_reaped() {
        let mut cmd = quiet("sleep");
        cmd.arg("60");
        let guard = ProcessGuard::spawn(&mut cmd).expect("Failed to spawn");
        assert!(registered_count() >= 1);
        assert!(guard.kill());
        assert!(!guard.kill());
        assert_eq!(guard.try_wait().expect("Poll failed"), Some(WaitOutcome::Reaped));
    }

    #[test]
    fn test_exit_seen_without_slice_delay() {
        let fastest = (0..5)
            .map(|_| {
                let start = Instant::now();
                let guard = ProcessGuard::spawn(&mut quiet("true")).expect("Failed to spawn");
                let outcome = guard.wait_timeout(Duration::from_secs(5)).expect("Wait failed");
                assert!(matches!(outcome, WaitOutcome::Exited(_)));
                start.elapsed()
            })
            .min()
            .expect("at least one run");
        assert!(fastest < Duration::from_millis(5), "fastest run took {fastest:?}");
    }

    #[test]
    fn test_kill_from_other_thread_ends_wait() {
        let mut cmd = quiet("sleep");
        cmd.arg("60");
        let guard = ProcessGuard::spawn(&mut cmd).expect("Failed to spawn");
        let start = Instant::now();
        let outcome = std::thread::scope(|scope| {
            let waiter = scope.spawn(|| guard.wait_timeout(Duration::from_secs(30)));
            std::thread::sleep(Duration::from_millis(100));
            assert!(guard.kill());
            waiter.join().expect("Waiter panicked")
        })
        .expect("Wait failed");
        assert_eq!(outcome, WaitOutcome::Reaped);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let err = ProcessGuard::spawn(&mut quiet("/nonexistent/paramdd-oracle")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
