//! Hand-off to the desktop environment.

use std::process::{Command, Stdio};

/// Opens `url` in the default browser without waiting for it.
///
/// # Errors
/// - If no opener could be started
pub fn open_url(url: &str) -> anyhow::Result<()> {
    tracing::info!("Opening {}", url);

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = Command::new("open");
        c.arg(url);
        c
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to open {url}: {e}"))?;
    Ok(())
}
