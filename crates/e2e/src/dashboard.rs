//! Dashboard page object
//!
//! The dashboard is a menu (`#dashboard-btns`) whose entries each show one
//! sub-page inside `#main-dashboard-sub-window-content`, hiding the others.

use fantoccini::elements::Element;
use fantoccini::Locator;
use tracing::{debug, info};

use crate::browser::BrowserSession;
use crate::error::{E2eError, E2eResult};
use crate::suite::DashboardSuite;

/// Direct children of the menu container
const MENU_ENTRIES_XPATH: &str = "./child::*";

/// Direct `div` children of the sub-window
const SUB_PAGES_XPATH: &str = "div";

/// Visibility of one sub-page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub id: String,
    pub visible: bool,
}

/// An opened dashboard
pub struct Dashboard {
    root: Element,
    menu_id: String,
    sub_window_id: String,
}

impl Dashboard {
    /// Click the dashboard button of the main menu and return the dashboard root
    pub async fn open(browser: &BrowserSession, suite: &DashboardSuite) -> E2eResult<Self> {
        info!("Entering dashboard");
        browser.find_by_id(&suite.open_button_id).await?.click().await?;

        let root = browser.find_by_id(&suite.dashboard_id).await?;
        Ok(Self {
            root,
            menu_id: suite.menu_id.clone(),
            sub_window_id: suite.sub_window_id.clone(),
        })
    }

    /// The clickable menu entries, in display order
    pub async fn menu_entries(&self) -> E2eResult<Vec<Element>> {
        let menu = self.root.find(Locator::Id(&self.menu_id)).await?;
        let entries = menu.find_all(Locator::XPath(MENU_ENTRIES_XPATH)).await?;
        debug!("Dashboard menu has {} entries", entries.len());
        Ok(entries)
    }

    /// The container holding every sub-page
    pub async fn sub_window(&self) -> E2eResult<Element> {
        Ok(self.root.find(Locator::Id(&self.sub_window_id)).await?)
    }

    /// A sub-page by id, searched below the sub-window
    pub async fn page(&self, sub_window: &Element, page_id: &str) -> E2eResult<Element> {
        let xpath = page_xpath(page_id);
        Ok(sub_window.find(Locator::XPath(&xpath)).await?)
    }

    /// Id and visibility of every sub-page
    pub async fn page_states(&self, sub_window: &Element) -> E2eResult<Vec<PageState>> {
        let mut states = Vec::new();
        for page in sub_window.find_all(Locator::XPath(SUB_PAGES_XPATH)).await? {
            states.push(PageState {
                id: page.attr("id").await?.unwrap_or_default(),
                visible: page.is_displayed().await?,
            });
        }
        Ok(states)
    }

    /// Ids of the sub-pages currently displayed
    pub async fn displayed_pages(&self, sub_window: &Element) -> E2eResult<Vec<String>> {
        Ok(self
            .page_states(sub_window)
            .await?
            .into_iter()
            .filter(|state| state.visible)
            .map(|state| state.id)
            .collect())
    }
}

/// Click the menu entry at `index`, logging its label
pub async fn click_entry(entries: &[Element], index: usize) -> E2eResult<()> {
    let entry = entries.get(index).ok_or_else(|| {
        E2eError::AssertionFailed(format!(
            "no dashboard menu entry at index {} ({} entries)",
            index,
            entries.len()
        ))
    })?;
    info!("click on {} page (index {})", entry.text().await?.trim(), index);
    entry.click().await?;
    Ok(())
}

/// Relative XPath selecting a descendant `div` with the given id
fn page_xpath(page_id: &str) -> String {
    if page_id.contains('\'') {
        format!(".//div[@id=\"{}\"]", page_id)
    } else {
        format!(".//div[@id='{}']", page_id)
    }
}
