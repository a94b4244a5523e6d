//! [`ExternalOpener`] that shells out to the platform's URL handler.

use std::process::{Child, Command, Stdio};

use super::ExternalOpener;

/// Opens URLs with `open` (macOS), the URL protocol handler (Windows) or
/// `xdg-open`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl SystemOpener {
    /// Builds the opener command for `os` (a `std::env::consts::OS` value).
    ///
    /// Windows goes through `rundll32` rather than `cmd /C start`, so `&`
    /// in a `mailto:` query is passed through instead of splitting the
    /// command line.
    fn command(os: &str, url: &str) -> Command {
        let mut cmd = match os {
            "macos" => Command::new("open"),
            "windows" => {
                let mut cmd = Command::new("rundll32");
                cmd.arg("url.dll,FileProtocolHandler");
                cmd
            }
            _ => Command::new("xdg-open"),
        };
        cmd.arg(url);
        cmd
    }
}

/// Waits for the launcher on a background thread so it never lingers as a
/// zombie.
fn reap(mut child: Child) {
    std::thread::spawn(move || {
        if let Err(e) = child.wait() {
            tracing::debug!(error = %e, "Waiting for URL opener failed");
        }
    });
}

impl ExternalOpener for SystemOpener {
    fn open(&self, url: &str) {
        let spawned = Self::command(std::env::consts::OS, url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                tracing::debug!(url, "Handed URL to system opener");
                reap(child);
            }
            Err(e) => tracing::warn!(url, error = %e, "Failed to open URL"),
        }
    }
}
