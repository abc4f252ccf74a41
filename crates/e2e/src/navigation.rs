//! Dashboard navigation checks
//!
//! Two regressions are guarded here: each menu entry must show its own
//! sub-page, and clicking through the menu quickly must not leave several
//! sub-pages displayed at once.

use tracing::{error, info};

use crate::browser::BrowserSession;
use crate::dashboard::{click_entry, Dashboard, PageState};
use crate::error::{E2eError, E2eResult};
use crate::suite::DashboardSuite;
use crate::wait::wait_until;

/// Click every menu entry in order and wait for the matching sub-page after each click
pub async fn check_right_pages_displayed(browser: &BrowserSession, suite: &DashboardSuite) -> E2eResult<()> {
    let dashboard = Dashboard::open(browser, suite).await?;
    let entries = dashboard.menu_entries().await?;
    verify_menu_matches(entries.len(), &suite.expected_pages)?;

    info!("Display all dashboard pages sequentially");
    let sub_window = dashboard.sub_window().await?;

    for (index, page_id) in suite.expected_pages.iter().enumerate() {
        click_entry(&entries, index).await?;

        let page = dashboard.page(&sub_window, page_id).await?;
        let displayed = wait_until(suite.page_timeout(), suite.poll_interval(), || {
            let page = page.clone();
            async move { page.is_displayed().await.map_err(E2eError::from) }
        })
        .await?;

        if !displayed {
            return Err(E2eError::AssertionFailed(format!(
                "page '{}' (index {}) not displayed within {:?}",
                page_id,
                index,
                suite.page_timeout()
            )));
        }
    }

    Ok(())
}

/// Click every menu entry without waiting, then require a single displayed sub-page.
///
/// Returns the id of the page left displayed.
pub async fn check_quick_navigation(browser: &BrowserSession, suite: &DashboardSuite) -> E2eResult<String> {
    let dashboard = Dashboard::open(browser, suite).await?;
    let entries = dashboard.menu_entries().await?;

    for index in 0..entries.len() {
        click_entry(&entries, index).await?;
    }

    let sub_window = dashboard.sub_window().await?;
    let displayed = dashboard.displayed_pages(&sub_window).await?;
    verify_single_page(&displayed)
}

/// Click the entry of `page_id` and require that page alone to be displayed
pub async fn check_exclusive_page(
    browser: &BrowserSession,
    suite: &DashboardSuite,
    page_id: &str,
) -> E2eResult<()> {
    let index = suite.page_index(page_id).ok_or_else(|| {
        E2eError::AssertionFailed(format!("'{}' is not a known dashboard page", page_id))
    })?;

    let dashboard = Dashboard::open(browser, suite).await?;
    let entries = dashboard.menu_entries().await?;
    verify_menu_matches(entries.len(), &suite.expected_pages)?;

    click_entry(&entries, index).await?;

    let sub_window = dashboard.sub_window().await?;
    let page = dashboard.page(&sub_window, page_id).await?;
    let displayed = wait_until(suite.page_timeout(), suite.poll_interval(), || {
        let page = page.clone();
        async move { page.is_displayed().await.map_err(E2eError::from) }
    })
    .await?;

    if !displayed {
        return Err(E2eError::AssertionFailed(format!(
            "page '{}' not displayed within {:?}",
            page_id,
            suite.page_timeout()
        )));
    }

    verify_exclusive(page_id, &dashboard.page_states(&sub_window).await?)
}

/// The menu must have one entry per expected page
pub fn verify_menu_matches(entry_count: usize, expected_pages: &[String]) -> E2eResult<()> {
    if entry_count != expected_pages.len() {
        return Err(E2eError::AssertionFailed(format!(
            "dashboard menu has {} entries, expected {}",
            entry_count,
            expected_pages.len()
        )));
    }
    Ok(())
}

/// Exactly one page may be displayed; returns its id
pub fn verify_single_page(displayed: &[String]) -> E2eResult<String> {
    match displayed {
        [page] => Ok(page.clone()),
        _ => {
            error!("[FAIL] {} pages displayed, expected 1", displayed.len());
            Err(E2eError::AssertionFailed(format!(
                "{} pages displayed, expected 1 ({})",
                displayed.len(),
                displayed.join(", ")
            )))
        }
    }
}

/// `page_id` must be visible and every sibling hidden
pub fn verify_exclusive(page_id: &str, states: &[PageState]) -> E2eResult<()> {
    let target_visible = states.iter().any(|s| s.id == page_id && s.visible);
    if !target_visible {
        return Err(E2eError::AssertionFailed(format!("page '{}' is not displayed", page_id)));
    }

    let intruders: Vec<&str> = states
        .iter()
        .filter(|s| s.id != page_id && s.visible)
        .map(|s| s.id.as_str())
        .collect();

    if !intruders.is_empty() {
        return Err(E2eError::AssertionFailed(format!(
            "page '{}' displayed together with: {}",
            page_id,
            intruders.join(", ")
        )));
    }
    Ok(())
}
