//! Yadoms Dashboard E2E Test Framework
//!
//! This crate drives a browser against a freshly prepared Yadoms server:
//! - Stops leftovers, resets the database, deploys a configuration profile
//!   and empties the script store
//! - Spawns the server as a subprocess and waits for it to answer
//! - Opens a WebDriver (chromedriver) session with an implicit wait
//! - Clicks through the dashboard menu and checks which sub-pages are displayed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── set_up()                                             │
//! │    │     ├── server::ensure_stopped()                       │
//! │    │     ├── database::reset()                              │
//! │    │     ├── deploy::deploy("nominal")                      │
//! │    │     ├── scripts::delete_all()                          │
//! │    │     ├── ServerHandle::start()                          │
//! │    │     └── BrowserSession::launch() + open_client()       │
//! │    ├── run_case(NavigationCase) -> CaseResult               │
//! │    └── tear_down()                                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  navigation                                                 │
//! │    ├── check_right_pages_displayed                          │
//! │    ├── check_quick_navigation                               │
//! │    └── check_exclusive_page                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod dashboard;
pub mod database;
pub mod deploy;
pub mod driver;
pub mod error;
pub mod navigation;
pub mod runner;
pub mod scripts;
pub mod server;
pub mod suite;
pub mod wait;

pub use error::{E2eError, E2eResult};
pub use runner::{NavigationCase, TestRunner};
pub use suite::DashboardSuite;
