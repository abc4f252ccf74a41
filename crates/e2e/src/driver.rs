//! WebDriver management - spawning chromedriver and waiting until it accepts sessions

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::wait::wait_until;

/// Handle to a chromedriver process started by the harness
pub struct DriverHandle {
    child: Child,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    message: String,
}

impl DriverHandle {
    /// Spawn chromedriver and wait for its status endpoint to report ready
    pub async fn spawn(config: &DriverConfig) -> E2eResult<Self> {
        info!("Spawning {} on port {}", config.binary_path.display(), config.port);

        let child = Command::new(&config.binary_path)
            .arg(format!("--port={}", config.port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                E2eError::DriverStartup(format!(
                    "Failed to spawn {}: {}",
                    config.binary_path.display(),
                    e
                ))
            })?;

        let mut handle = DriverHandle {
            child,
            url: config.url(),
        };

        if !wait_for_ready(&handle.url, config.startup_timeout).await? {
            handle.stop();
            return Err(E2eError::DriverStartup(format!(
                "{} not ready after {:?}",
                handle.url, config.startup_timeout
            )));
        }

        info!("WebDriver ready at {}", handle.url);
        Ok(handle)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Kill the driver process
    pub fn stop(&mut self) {
        debug!("Stopping WebDriver (pid: {})", self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll `<url>/status` until the driver reports it can create sessions
pub async fn wait_for_ready(url: &str, timeout: Duration) -> E2eResult<bool> {
    let status_url = format!("{}/status", url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    wait_until(timeout, Duration::from_millis(100), || {
        let request = client.get(&status_url).send();
        async move {
            match request.await {
                Ok(resp) if resp.status().is_success() => match resp.json::<StatusResponse>().await {
                    Ok(status) => {
                        if !status.value.ready {
                            debug!("WebDriver not ready: {}", status.value.message);
                        }
                        Ok(status.value.ready)
                    }
                    Err(e) => {
                        debug!("Unreadable WebDriver status: {}", e);
                        Ok(false)
                    }
                },
                // Connection refused is expected while the driver is starting
                _ => Ok(false),
            }
        }
    })
    .await
}

/// Configuration for the WebDriver process
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Spawn chromedriver ourselves instead of using one already running
    pub spawn: bool,

    /// Path to the chromedriver binary
    pub binary_path: PathBuf,

    pub port: u16,

    /// Timeout for driver startup
    pub startup_timeout: Duration,
}

impl DriverConfig {
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            spawn: false,
            binary_path: PathBuf::from("chromedriver"),
            port: 9515,
            startup_timeout: Duration::from_secs(10),
        }
    }
}
