use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

use super::{PageDocument, PageRequest, PageSource, SourceKind};
#[cfg(feature = "browser")]
use crate::error::ScrapeError;
use crate::error::ScrapeResult;

/// Finds the first button whose visible text contains one of the candidates
/// and clicks it. Returns the clicked button's text, or null.
#[cfg(feature = "browser")]
const CLICK_FIRST_MATCH_SCRIPT: &str = r#"(candidates) => {
    const buttons = Array.from(document.querySelectorAll('button'));
    for (const button of buttons) {
        const text = button.innerText || button.textContent || '';
        if (candidates.some((c) => text.includes(c))) {
            try { button.click(); return text.trim(); } catch (e) { return null; }
        }
    }
    return null;
}"#;

/// Scripted headless browser fetcher using Playwright.
///
/// Every call launches its own browser and closes it before returning,
/// including on error paths. Nothing is pooled between calls.
#[cfg(feature = "browser")]
#[derive(Debug, Clone)]
pub struct BrowserClient {
    user_agent: String,
    page_load_timeout: std::time::Duration,
}

#[cfg(feature = "browser")]
impl BrowserClient {
    pub fn new(user_agent: impl Into<String>, page_load_timeout: std::time::Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            page_load_timeout,
        }
    }

    async fn render(&self, request: &PageRequest) -> ScrapeResult<String> {
        let playwright = playwright::Playwright::initialize()
            .await
            .map_err(|e| ScrapeError::render(format!("Failed to start Playwright: {}", e)))?;

        let browser = playwright
            .chromium()
            .launcher()
            .headless(true)
            .launch()
            .await
            .map_err(|e| ScrapeError::render(format!("Failed to launch browser: {}", e)))?;

        let result = async {
            let context = browser
                .context_builder()
                .user_agent(&self.user_agent)
                .build()
                .await
                .map_err(|e| ScrapeError::render(e.to_string()))?;

            let page = context
                .new_page()
                .await
                .map_err(|e| ScrapeError::render(e.to_string()))?;

            page.set_default_navigation_timeout(self.page_load_timeout.as_millis() as u32)
                .await
                .map_err(|e| ScrapeError::render(e.to_string()))?;

            page.goto_builder(request.url.as_str())
                .goto()
                .await
                .map_err(|e| ScrapeError::render(format!("Navigation failed: {}", e)))?;

            if !request.click_candidates.is_empty() {
                match page
                    .evaluate::<Vec<String>, Option<String>>(CLICK_FIRST_MATCH_SCRIPT, request.click_candidates.clone())
                    .await
                {
                    Ok(Some(text)) => info!("Clicked button with text: {}", text),
                    Ok(None) => debug!("No matching button to click on {}", request.url),
                    Err(e) => warn!("Could not click button on {}: {}", request.url, e),
                }
            }

            if let Some(selector) = &request.wait_for {
                let found = page
                    .wait_for_selector_builder(selector)
                    .timeout(request.wait_timeout.as_millis() as f64)
                    .wait_for_selector()
                    .await
                    .map_err(|e| ScrapeError::render(format!("Timed out waiting for '{}': {}", selector, e)))?;

                if found.is_none() {
                    return Err(ScrapeError::render(format!("Element '{}' never appeared", selector)));
                }
            }

            page.content()
                .await
                .map_err(|e| ScrapeError::render(e.to_string()))
        }
        .await;

        // Clean up
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }

        result
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSource for BrowserClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Rendered
    }

    async fn fetch_page(&self, request: &PageRequest) -> ScrapeResult<PageDocument> {
        debug!("Rendering {} in headless browser", request.url);
        let markup = self.render(request).await?;
        Ok(PageDocument::new(request.url.clone(), markup))
    }
}

// Stub implementation when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[derive(Debug, Clone)]
pub struct BrowserClient;

#[cfg(not(feature = "browser"))]
impl BrowserClient {
    pub fn new(_user_agent: impl Into<String>, _page_load_timeout: std::time::Duration) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSource for BrowserClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Rendered
    }

    async fn fetch_page(&self, _request: &PageRequest) -> ScrapeResult<PageDocument> {
        Err(crate::error::ScrapeError::BrowserUnavailable)
    }
}
