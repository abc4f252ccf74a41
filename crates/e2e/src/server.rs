//! Server management - spawning, health checking and stopping the Yadoms server

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::error::{E2eError, E2eResult};
use crate::wait::wait_until;

/// Pid of the server started by the harness, kept across runs
const PID_FILE: &str = "yadoms-e2e.pid";

/// Server stdout/stderr
const LOG_FILE: &str = "yadoms-e2e.log";

/// Handle to a running server process
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
    pid_file: PathBuf,
    shutdown_grace: Duration,
    stopped: bool,
}

impl ServerHandle {
    /// Spawn the yadoms server
    pub async fn start(config: &ServerConfig) -> E2eResult<Self> {
        let base_url = config.base_url();

        info!("Spawning server on port {}", config.port);

        std::fs::create_dir_all(&config.working_dir)?;
        let log = File::create(config.working_dir.join(LOG_FILE))?;

        let mut cmd = Command::new(&config.binary_path);
        cmd.current_dir(&config.working_dir)
            .arg("--port")
            .arg(config.port.to_string())
            .args(&config.extra_args)
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let pid_file = config.pid_file();
        std::fs::write(&pid_file, child.id().to_string())?;

        let mut handle = ServerHandle {
            child,
            base_url: base_url.clone(),
            port: config.port,
            pid_file,
            shutdown_grace: config.shutdown_grace,
            stopped: false,
        };

        // Wait for server to be healthy
        if let Err(e) = handle.wait_for_healthy(config).await {
            let _ = handle.shutdown().await;
            return Err(e);
        }

        info!("Server is healthy at {}", base_url);
        Ok(handle)
    }

    /// Wait for the server to answer HTTP requests
    async fn wait_for_healthy(&mut self, config: &ServerConfig) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, config.health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let mut attempts = 0;
        let healthy = wait_until(config.startup_timeout, Duration::from_millis(100), || {
            attempts += 1;
            let first = attempts == 1;
            let exited = self.child.try_wait();
            let request = client.get(&health_url).send();
            async move {
                match exited {
                    Ok(Some(status)) => {
                        return Err(E2eError::ServerStartup(format!("server exited early with {}", status)));
                    }
                    Err(e) => return Err(E2eError::from(e)),
                    Ok(None) => {}
                }
                match request.await {
                    Ok(resp) if resp.status().is_success() => Ok(true),
                    Ok(resp) => {
                        warn!("Health check returned {}", resp.status());
                        Ok(false)
                    }
                    Err(e) => {
                        if first {
                            info!("Waiting for server to start...");
                        }
                        // Connection refused is expected while server is starting
                        if !e.is_connect() {
                            warn!("Health check error: {}", e);
                        }
                        Ok(false)
                    }
                }
            }
        })
        .await?;

        if healthy {
            Ok(())
        } else {
            Err(E2eError::ServerHealthCheck(attempts))
        }
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Point the browser at the server's web client
    pub async fn open_client(&self, browser: &BrowserSession) -> E2eResult<()> {
        info!("Opening web client at {}", self.base_url);
        browser.goto(&self.base_url).await
    }

    /// Stop the server, blocking the calling thread during the grace period.
    ///
    /// Used from `Drop`; async callers use [`ServerHandle::shutdown`].
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        info!("Stopping server (pid: {})", self.child.id());

        // Try graceful shutdown first
        if self.send_sigterm() {
            let deadline = std::time::Instant::now() + self.shutdown_grace;
            while std::time::Instant::now() < deadline {
                if let Ok(Some(_)) = self.child.try_wait() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }

        self.reap()
    }

    /// Stop the server without blocking the runtime
    pub async fn shutdown(&mut self) -> E2eResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        info!("Shutting down server (pid: {})", self.child.id());

        if self.send_sigterm() {
            let child = &mut self.child;
            let exited = wait_until(self.shutdown_grace, Duration::from_millis(50), || {
                let status = child.try_wait();
                async move { Ok(matches!(status, Ok(Some(_)))) }
            })
            .await?;

            if !exited {
                warn!("Server ignored SIGTERM for {:?}, killing", self.shutdown_grace);
            }
        }

        self.reap()
    }

    #[cfg(unix)]
    fn send_sigterm(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM).is_ok()
    }

    #[cfg(not(unix))]
    fn send_sigterm(&self) -> bool {
        false
    }

    /// Force kill if still running, then forget the pid
    fn reap(&mut self) -> E2eResult<()> {
        let _ = self.child.kill();
        let _ = self.child.wait();

        remove_pid_file(&self.pid_file)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Make sure no server is left over from a previous run.
///
/// Terminates the process named by the pid file, if it is still alive and
/// still runs the server binary, then waits for the web port to stop
/// accepting connections.
pub async fn ensure_stopped(config: &ServerConfig) -> E2eResult<()> {
    let pid_file = config.pid_file();

    if pid_file.exists() {
        match read_pid_file(&pid_file)? {
            Some(pid) => {
                warn!("Found pid file for a previous server (pid: {})", pid);
                terminate(pid, &config.binary_path, config.shutdown_grace).await;
            }
            None => warn!("Ignoring unusable pid file {}", pid_file.display()),
        }
        remove_pid_file(&pid_file)?;
    }

    let port = config.port;
    let released = wait_until(config.startup_timeout, Duration::from_millis(100), || async move {
        Ok(!port_in_use(port).await)
    })
    .await?;

    if !released {
        return Err(E2eError::ServerStillRunning(port));
    }

    debug!("Port {} is free", port);
    Ok(())
}

/// Whether something accepts TCP connections on the local port
pub async fn port_in_use(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

fn read_pid_file(path: &Path) -> E2eResult<Option<i32>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_pid(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A single positive process id. `0` and negative values address process
/// groups in kill(2), so they are never accepted.
fn parse_pid(content: &str) -> Option<i32> {
    content.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}

fn remove_pid_file(path: &Path) -> E2eResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Whether `pid` runs `binary_path`; `None` when the platform cannot tell
#[cfg(target_os = "linux")]
fn runs_binary(pid: i32, binary_path: &Path) -> Option<bool> {
    let cmdline = std::fs::read(format!("/proc/{}/cmdline", pid)).ok()?;
    let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
    let argv0 = Path::new(std::str::from_utf8(argv0).ok()?);

    Some(argv0.file_name().is_some() && argv0.file_name() == binary_path.file_name())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn runs_binary(_pid: i32, _binary_path: &Path) -> Option<bool> {
    None
}

#[cfg(unix)]
async fn terminate(pid: i32, binary_path: &Path, grace: Duration) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(pid);
    if kill(pid, None).is_err() {
        debug!("Process {} already gone", pid);
        return;
    }

    if runs_binary(pid.as_raw(), binary_path) == Some(false) {
        warn!(
            "Process {} does not run {}, leaving it alone",
            pid,
            binary_path.display()
        );
        return;
    }

    info!("Terminating leftover server (pid: {})", pid);
    let _ = kill(pid, Signal::SIGTERM);

    let exited = wait_until(grace, Duration::from_millis(50), || async move {
        Ok(kill(pid, None).is_err())
    })
    .await
    .unwrap_or(false);

    if !exited {
        warn!("Server (pid: {}) ignored SIGTERM, killing", pid);
        let _ = kill(pid, Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
async fn terminate(pid: i32, _binary_path: &Path, _grace: Duration) {
    warn!("Cannot signal leftover server (pid: {}) on this platform", pid);
}

/// Configuration for spawning a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the yadoms binary
    pub binary_path: PathBuf,

    /// Directory the server runs in (configuration, database, scripts)
    pub working_dir: PathBuf,

    /// Web server port
    pub port: u16,

    /// Additional command line arguments
    pub extra_args: Vec<String>,

    /// Path requested to decide the server is up
    pub health_path: String,

    /// Timeout for server startup
    pub startup_timeout: Duration,

    /// Time allowed between SIGTERM and SIGKILL
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.working_dir.join(PID_FILE)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("builds/yadoms"),
            working_dir: PathBuf::from("builds"),
            port: 8080,
            extra_args: Vec::new(),
            health_path: "/".to_string(),
            startup_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}
