//! Browser-backed channels
//!
//! One headed Chromium with a persistent profile holds a tab per chat site,
//! so logins survive between runs.

use super::sites::{self, SiteSpec};
use super::{ChannelAdapter, ChannelError, ChannelProfile};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long to look for each input selector before trying the next
const SELECTOR_WAIT: Duration = Duration::from_secs(2);

/// Give the page a moment to take the pasted text before submitting
const SUBMIT_DELAY: Duration = Duration::from_millis(500);

/// Puts text into the focused input surface in one go, so newlines in the
/// message do not submit it early.
const INSERT_SCRIPT: &str = r"(() => {
  const el = document.querySelector(__SELECTOR__);
  if (!el) return false;
  el.focus();
  document.execCommand('selectAll', false, null);
  document.execCommand('insertText', false, __TEXT__);
  if ('value' in el && el.value !== __TEXT__) {
    el.value = __TEXT__;
    el.dispatchEvent(new Event('input', { bubbles: true }));
  }
  return true;
})()";

/// Reads the newest reply, skipping anything that is part of an input
/// surface. Code blocks win over prose when present.
const OBSERVE_SCRIPT: &str = r"(() => {
  const selectors = __SELECTORS__;
  const isInput = (el) =>
    el.isContentEditable ||
    el.tagName.toLowerCase() === 'textarea' ||
    (typeof el.className === 'string' && el.className.includes('input')) ||
    el.closest('[contenteditable=true]') !== null;
  for (const selector of selectors) {
    let found;
    try {
      found = Array.from(document.querySelectorAll(selector));
    } catch (e) {
      continue;
    }
    const replies = found.filter((el) => !isInput(el));
    if (replies.length === 0) continue;
    const el = replies[replies.length - 1];
    let blocks = el.querySelectorAll('code');
    if (blocks.length === 0) blocks = el.querySelectorAll('pre');
    if (blocks.length > 0) {
      return Array.from(blocks).map((b) => b.textContent.trim()).join('\n');
    }
    return (el.innerText || el.textContent || '').trim();
  }
  return '';
})()";

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn insert_script(selector: &str, text: &str) -> String {
    INSERT_SCRIPT
        .replace("__SELECTOR__", &js_string(selector))
        .replace("__TEXT__", &js_string(text))
}

fn observe_script(selectors: &[String]) -> String {
    let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    OBSERVE_SCRIPT.replace("__SELECTORS__", &list)
}

/// The shared browser process
pub struct BrowserHub {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserHub {
    /// Launch Chromium with a persistent profile directory
    pub async fn launch(profile_dir: &Path, headless: bool) -> Result<Self, ChannelError> {
        std::fs::create_dir_all(profile_dir).map_err(|e| {
            ChannelError::Browser(format!(
                "Failed to create profile dir {}: {e}",
                profile_dir.display()
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .viewport(None);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ChannelError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ChannelError::Browser(format!("Failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        tracing::info!(profile = %profile_dir.display(), headless, "Browser launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a tab for `site`. A failed navigation is only a warning: the
    /// user can still navigate the tab by hand before the session starts.
    pub async fn open(&self, site: &SiteSpec) -> Result<BrowserChannel, ChannelError> {
        if !site.is_drivable() {
            let known: Vec<&str> = sites::builtin_names().collect();
            return Err(ChannelError::Browser(format!(
                "Site {} has no input or reply selectors configured (built-in sites: {})",
                site.name,
                known.join(", ")
            )));
        }

        let page = self.browser.new_page("about:blank").await?;
        if let Some(url) = &site.url {
            tracing::info!(site = %site.name, %url, "Loading site");
            if let Err(e) = page.goto(url.as_str()).await {
                tracing::warn!(
                    site = %site.name,
                    %url,
                    error = %e,
                    "Failed to load site, navigate the tab manually"
                );
            }
        }

        Ok(BrowserChannel {
            name: site.name.clone(),
            page,
            input_selectors: site.input_selectors.clone(),
            response_selectors: site.response_selectors.clone(),
            profile: site.profile(),
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }
        self.handler_task.abort();
    }
}

/// One chat site in one browser tab
pub struct BrowserChannel {
    name: String,
    page: Page,
    input_selectors: Vec<String>,
    response_selectors: Vec<String>,
    profile: ChannelProfile,
}

impl BrowserChannel {
    async fn try_input(&self, selector: &str, text: &str) -> Result<(), ChannelError> {
        let element = tokio::time::timeout(SELECTOR_WAIT, self.page.find_element(selector))
            .await
            .map_err(|_| ChannelError::send_failure(&self.name, format!("{selector} timed out")))??;
        element.click().await?;

        let inserted = self
            .page
            .evaluate(insert_script(selector, text))
            .await?
            .into_value::<bool>()
            .unwrap_or(false);
        if !inserted {
            return Err(ChannelError::send_failure(
                &self.name,
                format!("{selector} vanished before text was inserted"),
            ));
        }

        tokio::time::sleep(SUBMIT_DELAY).await;
        element.press_key("Enter").await?;
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for BrowserChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> &ChannelProfile {
        &self.profile
    }

    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        for selector in &self.input_selectors {
            match self.try_input(selector, text).await {
                Ok(()) => {
                    tracing::info!(
                        channel = %self.name,
                        %selector,
                        chars = text.len(),
                        "Message sent"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(
                        channel = %self.name,
                        %selector,
                        error = %e,
                        "Input selector failed"
                    );
                }
            }
        }
        Err(ChannelError::send_failure(
            &self.name,
            format!("none of {} input selectors worked", self.input_selectors.len()),
        ))
    }

    async fn observe_latest(&self, _prior: &str) -> Result<String, ChannelError> {
        self.page
            .evaluate(observe_script(&self.response_selectors))
            .await
            .map_err(|e| ChannelError::observe(&self.name, e.to_string()))?
            .into_value::<String>()
            .map_err(|e| ChannelError::observe(&self.name, e.to_string()))
    }

    async fn focus(&self) {
        if let Err(e) = self.page.bring_to_front().await {
            tracing::debug!(channel = %self.name, error = %e, "Failed to bring tab to front");
        }
    }
}
