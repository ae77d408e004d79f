//! Demoreel Browser
//!
//! Chrome DevTools Protocol client used by the pipeline stages and the
//! interactive session controller. Each [`Browser`] owns a throwaway Chrome
//! process with its own profile and debugging socket; [`Page`] wraps one
//! attached target and exposes navigation, input dispatch, screenshots and
//! JS evaluation. [`StorageSnapshot`] captures and restores login state.

mod client;
mod error;
mod launch;
mod page;
mod protocol;
mod storage;

pub use client::CdpClient;
pub use error::BrowserError;
pub use launch::{Browser, BrowserConfig};
pub use page::Page;
pub use storage::{CdpCookie, OriginStorage, StorageSnapshot};
