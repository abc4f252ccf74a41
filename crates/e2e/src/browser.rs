//! Browser session over WebDriver

use std::path::PathBuf;
use std::time::Duration;
use fantoccini::elements::Element;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::E2eResult;

/// An open browser session with an implicit wait configured
pub struct BrowserSession {
    client: Client,
    screenshot_dir: PathBuf,
}

impl BrowserSession {
    /// Open a new Chrome session on the WebDriver endpoint
    pub async fn launch(config: BrowserConfig) -> E2eResult<Self> {
        info!("Opening browser session on {}", config.webdriver_url);

        let client = ClientBuilder::native()
            .capabilities(config.capabilities())
            .connect(&config.webdriver_url)
            .await?;

        // Element lookups retry for up to this long before failing
        client
            .update_timeouts(TimeoutConfiguration::new(None, None, Some(config.implicit_wait)))
            .await?;

        debug!("Implicit wait set to {:?}", config.implicit_wait);

        Ok(Self {
            client,
            screenshot_dir: config.screenshot_dir,
        })
    }

    /// Navigate to an absolute URL
    pub async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("Navigating to {}", url);
        self.client.goto(url).await?;
        Ok(())
    }

    /// Find an element anywhere in the document by its id
    pub async fn find_by_id(&self, id: &str) -> E2eResult<Element> {
        Ok(self.client.find(Locator::Id(id)).await?)
    }

    /// Save a PNG screenshot of the current page under the screenshot directory
    pub async fn screenshot(&self, name: &str) -> E2eResult<PathBuf> {
        let png = self.client.screenshot().await?;
        std::fs::create_dir_all(&self.screenshot_dir)?;

        let path = self.screenshot_dir.join(format!("{}.png", name));
        std::fs::write(&path, &png)?;

        info!("Screenshot saved to {} (sha256 {})", path.display(), sha256_hex(&png));
        Ok(path)
    }

    /// End the WebDriver session and close the browser
    pub async fn close(self) -> E2eResult<()> {
        info!("Closing browser session");
        if let Err(e) = self.client.close().await {
            warn!("Browser did not close cleanly: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Configuration for the browser session
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver)
    pub webdriver_url: String,

    /// Run Chrome without a visible window
    pub headless: bool,

    pub window_width: u32,
    pub window_height: u32,

    /// Implicit wait applied to every element lookup
    pub implicit_wait: Duration,

    /// Where failure screenshots go
    pub screenshot_dir: PathBuf,
}

impl BrowserConfig {
    /// W3C capabilities requesting a Chrome session
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut args = vec![
            "--disable-gpu".to_string(),
            format!("--window-size={},{}", self.window_width, self.window_height),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_width: 1280,
            window_height: 720,
            implicit_wait: Duration::from_secs(10),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
