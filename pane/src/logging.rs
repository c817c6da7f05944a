use log::{Level, debug};

/// Route `log` records to the browser console and, with the
/// `console_error_panic_hook` feature, panics as well.
pub fn init(level: Level) {
    if console_log::init_with_level(level).is_err() {
        debug!("logger already installed");
    }

    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
