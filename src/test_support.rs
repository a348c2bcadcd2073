use std::env as stdenv;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Serializes tests that change the process working directory.
pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn make_unique_temp_dir(tag: &str) -> io::Result<PathBuf> {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let mut p = stdenv::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    p.push(format!("cli_shell_{}_{}_{}_{}", tag, std::process::id(), nanos, n));
    fs::create_dir_all(&p)?;
    Ok(p)
}

/// A temporary directory holding one data file; removed on drop.
pub(crate) struct TestEnvironment {
    pub temp_dir: PathBuf,
    pub file_path: PathBuf,
}

impl TestEnvironment {
    pub fn file_name(&self) -> String {
        self.file_path.to_string_lossy().to_string()
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.temp_dir);
    }
}

/// Creates an isolated temporary directory with `test_data.txt` inside it.
pub(crate) fn setup_test_environment(content: &str) -> io::Result<TestEnvironment> {
    let temp_dir = make_unique_temp_dir("data")?;
    let file_path = temp_dir.join("test_data.txt");
    let mut f = fs::File::create(&file_path)?;
    write!(f, "{}", content)?;
    drop(f);

    Ok(TestEnvironment {
        temp_dir,
        file_path,
    })
}
