//! Scriptable in-memory session for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Element, Locator, PageSession};
use crate::error::SessionError;

pub const RESULTS: &str = ".job";
pub const NEXT: &str = "a.next";
pub const LOAD_MORE: &str = "text:Load more";
pub const BASE_URL: &str = "https://careers.acme.test/jobs";

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub results: Vec<String>,
    pub html: Option<String>,
    pub script: Option<Value>,
}

impl MockPage {
    pub fn with_results(titles: &[&str]) -> Self {
        Self {
            results: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn html(html: &str) -> Self {
        Self {
            html: Some(html.to_string()),
            ..Default::default()
        }
    }
}

fn slug(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

pub struct MockSession {
    pages: Vec<MockPage>,
    current: usize,
    pending: Option<(usize, usize)>,
    render_delay: usize,
    lag: usize,
    append: bool,
    fail_on_page: Option<usize>,
    fail_navigation: bool,
    closes: Arc<AtomicUsize>,
    pub navigations: Vec<String>,
    pub clicks: Vec<Element>,
}

impl MockSession {
    pub fn new(pages: Vec<MockPage>) -> Self {
        Self {
            pages,
            current: 0,
            pending: None,
            render_delay: 0,
            lag: 0,
            append: false,
            fail_on_page: None,
            fail_navigation: false,
            closes: Arc::new(AtomicUsize::new(0)),
            navigations: Vec::new(),
            clicks: Vec::new(),
        }
    }

    /// The first `n` result queries see an empty page.
    pub fn with_render_delay(mut self, n: usize) -> Self {
        self.render_delay = n;
        self
    }

    /// Result queries needed after a click before the next page shows.
    pub fn with_lag(mut self, n: usize) -> Self {
        self.lag = n;
        self
    }

    /// Pages accumulate behind a "Load more" button instead of a next link.
    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    /// Reading page `index` (0-based) fails with a transport error.
    pub fn fail_on_page(mut self, index: usize) -> Self {
        self.fail_on_page = Some(index);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    fn visible(&self) -> Vec<&MockPage> {
        if self.append {
            self.pages.iter().take(self.current + 1).collect()
        } else {
            self.pages.get(self.current).into_iter().collect()
        }
    }

    fn has_next(&self) -> bool {
        self.pending.is_none() && self.current + 1 < self.pages.len()
    }

    fn check_failure(&self) -> Result<(), SessionError> {
        match self.fail_on_page {
            Some(n) if n == self.current => Err(SessionError::Transport("browser disconnected".into())),
            _ => Ok(()),
        }
    }

    fn tick(&mut self) {
        if let Some((target, remaining)) = self.pending {
            if remaining == 0 {
                self.current = target;
                self.pending = None;
            } else {
                self.pending = Some((target, remaining - 1));
            }
        }
    }
}

#[async_trait]
impl PageSession for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if self.fail_navigation {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".into(),
            });
        }
        self.navigations.push(url.to_string());
        if let Some(n) = url
            .split("page=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .and_then(|n| n.parse::<usize>().ok())
        {
            if n >= 1 && n <= self.pages.len() {
                self.current = n - 1;
            }
        }
        Ok(())
    }

    async fn evaluate(&mut self, _script: &str) -> Result<Value, SessionError> {
        self.check_failure()?;
        self.visible()
            .last()
            .and_then(|p| p.script.clone())
            .ok_or_else(|| SessionError::Script("ReferenceError: jobs is not defined".into()))
    }

    async fn find(&mut self, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        let spec = locator.to_string();
        let texts: Vec<String> = if spec == RESULTS {
            if self.render_delay > 0 {
                self.render_delay -= 1;
                return Ok(Vec::new());
            }
            self.tick();
            self.visible().iter().flat_map(|p| p.results.clone()).collect()
        } else if (spec == NEXT && !self.append) || (spec == LOAD_MORE && self.append) {
            if self.has_next() {
                vec![if self.append { "Load more".to_string() } else { "Next".to_string() }]
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };
        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Element {
                locator: locator.clone(),
                index,
                text,
            })
            .collect())
    }

    async fn click(&mut self, element: &Element) -> Result<(), SessionError> {
        self.clicks.push(element.clone());
        if !self.has_next() {
            return Err(SessionError::Element("element is not attached to the page document".into()));
        }
        self.pending = Some((self.current + 1, self.lag));
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, SessionError> {
        Ok(format!("{}?page={}", BASE_URL, self.current + 1))
    }

    async fn content(&mut self) -> Result<String, SessionError> {
        self.check_failure()?;
        let mut body = String::new();
        for page in self.visible() {
            match &page.html {
                Some(html) => body.push_str(html),
                None => {
                    body.push_str("<ul>");
                    for title in &page.results {
                        body.push_str(&format!(
                            r#"<li class="job"><a href="/jobs/{}">{}</a><span class="loc">Pune, India</span></li>"#,
                            slug(title),
                            title
                        ));
                    }
                    body.push_str("</ul>");
                }
            }
        }
        Ok(format!("<html><body>{}</body></html>", body))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
