use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

use crate::downloader::ProgressFn;

const BAR_TEMPLATE: &str =
    "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";

fn new_bar(src: &str, total: u64) -> ProgressBar {
    let (bar, template) = if total > 0 {
        (ProgressBar::new(total), BAR_TEMPLATE)
    } else {
        (ProgressBar::new_spinner(), SPINNER_TEMPLATE)
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=> "));
    }
    let name = src.rsplit('/').next().unwrap_or(src).to_owned();
    bar.set_message(format!("downloading {name}"));
    bar
}

/// Returns the default progress function, which draws an `indicatif` bar on stderr.
pub fn default_progress_fn() -> ProgressFn {
    let current_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    Arc::new(move |src: &str, current: u64, total: u64, _mib_per_sec: f64, complete: bool| {
        let Ok(mut guard) = current_bar.lock() else {
            return;
        };
        let bar = guard.get_or_insert_with(|| new_bar(src, total));
        bar.set_position(current);
        if complete {
            bar.finish_and_clear();
            *guard = None;
        }
    })
}

/// Average throughput in MiB/s.
pub fn mib_per_sec(bytes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        (bytes as f64) / (1024.0 * 1024.0) / elapsed_secs
    } else {
        0.0
    }
}
