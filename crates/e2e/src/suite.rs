//! Declarative description of the dashboard under test

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Dashboard layout and expectations, usually loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSuite {
    /// Name used in results
    #[serde(default = "default_name")]
    pub name: String,

    /// Configuration profile deployed before each case
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Main menu button that opens the dashboard
    #[serde(default = "default_open_button_id")]
    pub open_button_id: String,

    /// Root element of the dashboard
    #[serde(default = "default_dashboard_id")]
    pub dashboard_id: String,

    /// Container whose children are the menu entries
    #[serde(default = "default_menu_id")]
    pub menu_id: String,

    /// Container whose `div` children are the sub-pages
    #[serde(default = "default_sub_window_id")]
    pub sub_window_id: String,

    /// Sub-page ids, in menu order
    #[serde(default = "default_expected_pages")]
    pub expected_pages: Vec<String>,

    /// How long a page may take to show up after a click
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_name() -> String {
    "dashboard-navigation".to_string()
}

fn default_profile() -> String {
    crate::deploy::NOMINAL_PROFILE.to_string()
}

fn default_open_button_id() -> String {
    "btn-dashboard".to_string()
}

fn default_dashboard_id() -> String {
    "main-dashboard".to_string()
}

fn default_menu_id() -> String {
    "dashboard-btns".to_string()
}

fn default_sub_window_id() -> String {
    "main-dashboard-sub-window-content".to_string()
}

fn default_expected_pages() -> Vec<String> {
    [
        "dashboard-summary",
        "dashboard-system-configuration",
        "dashboard-plugins",
        "dashboard-devices",
        "dashboard-automation-center",
        "dashboard-recipients",
        "dashboard-install-update",
        "dashboard-maintenance",
        "dashboard-about",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_page_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for DashboardSuite {
    fn default() -> Self {
        Self {
            name: default_name(),
            profile: default_profile(),
            open_button_id: default_open_button_id(),
            dashboard_id: default_dashboard_id(),
            menu_id: default_menu_id(),
            sub_window_id: default_sub_window_id(),
            expected_pages: default_expected_pages(),
            page_timeout_ms: default_page_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DashboardSuite {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.expected_pages.is_empty() {
            return Err(E2eError::SuiteParse(format!(
                "{}: expected_pages must not be empty",
                self.name
            )));
        }
        if let Some(blank) = self.expected_pages.iter().position(|p| p.trim().is_empty()) {
            return Err(E2eError::SuiteParse(format!(
                "{}: expected_pages[{}] is blank",
                self.name, blank
            )));
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Position of a page in the menu
    pub fn page_index(&self, page_id: &str) -> Option<usize> {
        self.expected_pages.iter().position(|p| p == page_id)
    }
}
