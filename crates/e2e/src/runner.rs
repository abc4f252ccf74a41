//! Test runner that prepares the server, opens a browser and runs navigation cases

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::browser::{BrowserConfig, BrowserSession};
use crate::driver::{DriverConfig, DriverHandle};
use crate::error::{E2eError, E2eResult};
use crate::server::{self, ServerConfig, ServerHandle};
use crate::suite::DashboardSuite;
use crate::{database, deploy, navigation, scripts};

/// A single test case against the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCase {
    /// Each menu entry shows its own page
    RightPagesDisplayed,
    /// Rapid clicks leave exactly one page displayed
    QuickNavigation,
    /// The given page is displayed alone once its entry is clicked
    ExclusivePage(String),
}

impl NavigationCase {
    /// The default selection run by the harness
    pub fn all() -> Vec<Self> {
        vec![
            NavigationCase::RightPagesDisplayed,
            NavigationCase::QuickNavigation,
            NavigationCase::ExclusivePage("dashboard-devices".to_string()),
        ]
    }

    pub fn name(&self) -> String {
        match self {
            NavigationCase::RightPagesDisplayed => "right-pages-displayed".to_string(),
            NavigationCase::QuickNavigation => "quick-navigation".to_string(),
            NavigationCase::ExclusivePage(page) => format!("exclusive-page:{}", page),
        }
    }
}

/// Case selection accepted by the harness command line (`--case`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaseSelection {
    RightPagesDisplayed,
    QuickNavigation,
    DevicesPage,
    All,
}

impl CaseSelection {
    pub fn cases(self) -> Vec<NavigationCase> {
        match self {
            CaseSelection::RightPagesDisplayed => vec![NavigationCase::RightPagesDisplayed],
            CaseSelection::QuickNavigation => vec![NavigationCase::QuickNavigation],
            CaseSelection::DevicesPage => {
                vec![NavigationCase::ExclusivePage("dashboard-devices".to_string())]
            }
            CaseSelection::All => NavigationCase::all(),
        }
    }
}

impl fmt::Display for NavigationCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running all cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Files the harness prepares before each case
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    /// Root of the named configuration profiles
    pub profiles_dir: PathBuf,

    /// Server SQLite database
    pub database_path: PathBuf,

    /// Automation rule script store
    pub scripts_dir: PathBuf,
}

impl Default for HarnessPaths {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("tests/resources/configs"),
            database_path: PathBuf::from("builds/yadoms.db3"),
            scripts_dir: PathBuf::from("builds/scripts"),
        }
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub driver: DriverConfig,
    pub browser: BrowserConfig,
    pub paths: HarnessPaths,
    pub suite: DashboardSuite,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            driver: DriverConfig::default(),
            browser: BrowserConfig::default(),
            paths: HarnessPaths::default(),
            suite: DashboardSuite::default(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,

    /// chromedriver started by the runner, shared by all cases
    driver: Option<DriverHandle>,

    /// Server of the current case
    server: Option<ServerHandle>,

    /// Browser of the current case
    browser: Option<BrowserSession>,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            driver: None,
            server: None,
            browser: None,
        }
    }

    /// Bring the server to a known state and open a browser on it
    pub async fn set_up(&mut self) -> E2eResult<()> {
        server::ensure_stopped(&self.config.server).await?;
        database::reset(&self.config.paths.database_path)?;
        deploy::deploy(
            &self.config.paths.profiles_dir,
            &self.config.suite.profile,
            &self.config.server.working_dir,
        )?;
        scripts::delete_all(&self.config.paths.scripts_dir)?;

        let server = self.server.insert(ServerHandle::start(&self.config.server).await?);

        let mut browser_config = self.config.browser.clone();
        if self.config.driver.spawn {
            if self.driver.is_none() {
                self.driver = Some(DriverHandle::spawn(&self.config.driver).await?);
            }
            if let Some(driver) = &self.driver {
                browser_config.webdriver_url = driver.url().to_string();
            }
        }

        let browser = BrowserSession::launch(browser_config).await?;
        server.open_client(&browser).await?;
        self.browser = Some(browser);
        Ok(())
    }

    /// Close the browser and stop the server, whatever happened before
    pub async fn tear_down(&mut self) -> E2eResult<()> {
        let closed = match self.browser.take() {
            Some(browser) => browser.close().await,
            None => Ok(()),
        };

        let stopped = match self.server.take() {
            Some(mut server) => server.shutdown().await,
            None => Ok(()),
        };

        closed.and(stopped)
    }

    /// Run one case between set-up and tear-down
    pub async fn run_case(&mut self, case: &NavigationCase) -> CaseResult {
        let started_at = Utc::now();
        let start = Instant::now();
        info!("=== {} ===", case);

        let mut outcome = self.set_up().await;
        if outcome.is_ok() {
            outcome = self.execute(case).await;
        }

        let mut screenshot_path = None;
        if outcome.is_err() {
            if let Some(browser) = &self.browser {
                match browser.screenshot(&case.name().replace(':', "-")).await {
                    Ok(path) => screenshot_path = Some(path),
                    Err(e) => warn!("Could not capture failure screenshot: {}", e),
                }
            }
        }

        if let Err(e) = self.tear_down().await {
            warn!("Tear-down of '{}' failed: {}", case, e);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                info!("✓ {} ({} ms)", case, duration_ms);
                CaseResult {
                    name: case.name(),
                    success: true,
                    started_at,
                    duration_ms,
                    error: None,
                    screenshot_path,
                }
            }
            Err(e) => {
                error!("✗ {} - {}", case, e);
                CaseResult {
                    name: case.name(),
                    success: false,
                    started_at,
                    duration_ms,
                    error: Some(e.to_string()),
                    screenshot_path,
                }
            }
        }
    }

    async fn execute(&self, case: &NavigationCase) -> E2eResult<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| E2eError::AssertionFailed("no browser session".to_string()))?;
        let suite = &self.config.suite;

        match case {
            NavigationCase::RightPagesDisplayed => navigation::check_right_pages_displayed(browser, suite).await,
            NavigationCase::QuickNavigation => {
                let page = navigation::check_quick_navigation(browser, suite).await?;
                info!("Quick navigation settled on '{}'", page);
                Ok(())
            }
            NavigationCase::ExclusivePage(page_id) => {
                navigation::check_exclusive_page(browser, suite, page_id).await
            }
        }
    }

    /// Run a list of cases, each with a fresh server and browser
    pub async fn run_cases(&mut self, cases: &[NavigationCase]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} case(s) of '{}'...", cases.len(), self.config.suite.name);

        for case in cases {
            results.push(self.run_case(case).await);
        }

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        SuiteResult {
            suite: self.config.suite.name.clone(),
            total: cases.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        if let Some(mut server) = self.server.take() {
            let _ = server.stop();
        }
    }
}
