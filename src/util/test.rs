use std::sync::Once;

static LOGGER_INITIALIZED: Once = Once::new();

/// Initialize `env_logger` on the first call, and do nothing thereafter.  This is useful in tests
/// where the order of the tests is not defined, but each requires `env_logger`.
pub fn init_env_logger() {
    LOGGER_INITIALIZED.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
