//! Opening the wallet page in the user's browser.

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Best-effort "bring the wallet page to the front". Failures never affect
/// the signing request itself.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Uses the platform opener (`open`, `xdg-open`, `cmd /C start`).
/// Must be called from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let mut command = if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(url);
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };

        spawn_reaped(command)?;
        debug!(url, "Launched browser");
        Ok(())
    }
}

/// Spawns `command` with null stdio and waits on it in the background so
/// the exited opener never lingers as a zombie.
fn spawn_reaped(mut command: Command) -> io::Result<JoinHandle<Option<ExitStatus>>> {
    // stdout belongs to the JSON-RPC channel in tool mode
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                if !status.success() {
                    warn!(%status, "Browser opener exited with failure");
                }
                Some(status)
            }
            Err(e) => {
                warn!(error = %e, "Failed to wait on browser opener");
                None
            }
        }
    }))
}

/// For headless runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBrowser;

impl BrowserLauncher for NoopBrowser {
    fn open(&self, _url: &str) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_opener_is_reaped() {
        let reaper = spawn_reaped(Command::new("true")).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), reaper)
            .await
            .expect("opener should be waited on")
            .unwrap();
        assert!(status.unwrap().success());
    }

    #[tokio::test]
    async fn test_failed_opener_exit_is_collected() {
        let reaper = spawn_reaped(Command::new("false")).unwrap();
        let status = reaper.await.unwrap().unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_missing_opener_is_an_error() {
        assert!(spawn_reaped(Command::new("no-such-browser-opener-xyz")).is_err());
    }
}
