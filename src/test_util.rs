use std::path::Path;
use std::sync::Mutex;

static HOME_MUTEX: Mutex<()> = Mutex::new(());

/// Runs `func` with `HOME` pointed at a fresh temp dir and the base dir override unset.
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    let old_base = std::env::var("BILINGUAL_READER_DIR").ok();
    // SAFETY: serialized by HOME_MUTEX; tests touching the environment go through here.
    unsafe {
        std::env::set_var("HOME", dir.path());
        std::env::remove_var("BILINGUAL_READER_DIR");
    }
    let result = func(dir.path());
    unsafe {
        match old_home {
            Some(old) => std::env::set_var("HOME", old),
            None => std::env::remove_var("HOME"),
        }
        if let Some(old) = old_base {
            std::env::set_var("BILINGUAL_READER_DIR", old);
        }
    }
    result
}
