//! Scripted in-memory driver and backend for integration tests
//!
//! `FakeDriver` models just enough of a browser session for the
//! orchestrator to be exercised end to end: a current page, elements keyed
//! by path, cookies and storage. It implements no DOM; elements are flat
//! records matched against descriptors. Page content is shared across
//! sessions the way a real application is, while cookies, storage and
//! navigation state belong to one session each.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use casekit_runner::common::driver::{
    CookieJar, DomDriver, SeedOutcome, StateBackend, StateMutation, StorageEntries,
};
use casekit_runner::common::error::{Error, Result};
use casekit_runner::common::selector::{ElementHandle, SelectorDescriptor, SelectorKind};
use casekit_runner::snapshot::AUTH_TOKEN_COOKIE;

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self { tag: tag.to_string(), text: String::new(), attributes: BTreeMap::new() }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Shorthand for the stable test attribute.
    pub fn data_cy(self, value: &str) -> Self {
        self.attr("data-cy", value)
    }

    fn matches(&self, descriptor: &SelectorDescriptor) -> bool {
        match descriptor.kind {
            SelectorKind::Attribute => match descriptor.value.split_once('=') {
                Some((name, value)) => self.attributes.get(name).map(String::as_str) == Some(value),
                None => self.attributes.contains_key(&descriptor.value),
            },
            SelectorKind::Css => {
                if let Some(class) = descriptor.value.strip_prefix('.') {
                    self.attributes
                        .get("class")
                        .map(|c| c.split_whitespace().any(|part| part == class))
                        .unwrap_or(false)
                } else if let Some(id) = descriptor.value.strip_prefix('#') {
                    self.attributes.get("id").map(String::as_str) == Some(id)
                } else {
                    false
                }
            }
            SelectorKind::Text => self.text.contains(&descriptor.value),
            SelectorKind::Tag => self.tag == descriptor.value,
        }
    }

    fn to_handle(&self, id: u64) -> ElementHandle {
        ElementHandle {
            id,
            tag: self.tag.clone(),
            text: self.text.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

struct DelayedElement {
    path: String,
    element: FakeElement,
    remaining_queries: u32,
}

/// Scripted application content, shared by every session.
#[derive(Default)]
struct AppState {
    pages: HashMap<String, Vec<FakeElement>>,
    delayed: Vec<DelayedElement>,
}

#[derive(Default)]
struct FakeSession {
    current_path: String,
    cookies: BTreeMap<String, String>,
    storage: BTreeMap<String, String>,
    /// Cookies a `write_cookies` cannot remove, like server-set HttpOnly
    /// cookies outside the automation layer's reach.
    sticky_cookies: Vec<String>,
    dispatched: Vec<(u64, String)>,
}

/// In-memory `DomDriver` with scripted pages
pub struct FakeDriver {
    app: Arc<Mutex<AppState>>,
    session: Mutex<FakeSession>,
    healthy: Arc<AtomicBool>,
    queries: Arc<AtomicU64>,
    accounts: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            app: Arc::new(Mutex::new(AppState::default())),
            session: Mutex::new(FakeSession::default()),
            healthy: Arc::new(AtomicBool::new(true)),
            queries: Arc::new(AtomicU64::new(0)),
            accounts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Pair this driver with a backend so a seeded login is visible on the
    /// profile page.
    pub fn backend(self: &Arc<Self>) -> Arc<FakeBackend> {
        Arc::new(FakeBackend { accounts: self.accounts.clone(), next_token: AtomicU64::new(1) })
    }

    pub fn add_element(&self, path: &str, element: FakeElement) {
        self.app.lock().pages.entry(path.to_string()).or_default().push(element);
    }

    /// Element that only starts matching after `queries` queries against
    /// its path, simulating late rendering.
    pub fn add_element_after(&self, path: &str, element: FakeElement, queries: u32) {
        self.app.lock().delayed.push(DelayedElement {
            path: path.to_string(),
            element,
            remaining_queries: queries,
        });
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn dispatched_events(&self) -> Vec<(u64, String)> {
        self.session.lock().dispatched.clone()
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.session.lock().cookies.insert(name.to_string(), value.to_string());
    }

    /// Mark a cookie as un-removable through `write_cookies`, simulating
    /// state the driver cannot restore away.
    pub fn make_sticky(&self, name: &str) {
        self.session.lock().sticky_cookies.push(name.to_string());
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.session.lock().cookies.get(name).cloned()
    }

    fn check_healthy(&self) -> Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::DriverUnavailable("connection lost".into()))
        }
    }

    fn path_of(url: &str) -> String {
        let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        match without_scheme.find('/') {
            Some(pos) => without_scheme[pos..].to_string(),
            None => "/".to_string(),
        }
    }
}

#[async_trait]
impl DomDriver for FakeDriver {
    async fn visit(&self, url: &str) -> Result<()> {
        self.check_healthy()?;
        self.session.lock().current_path = Self::path_of(url);
        Ok(())
    }

    async fn query(
        &self,
        descriptor: &SelectorDescriptor,
        _scope: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>> {
        self.check_healthy()?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let (path, token) = {
            let session = self.session.lock();
            (session.current_path.clone(), session.cookies.get(AUTH_TOKEN_COOKIE).cloned())
        };

        let mut elements = {
            let mut app = self.app.lock();

            // Promote delayed elements whose query budget ran out.
            for delayed in app.delayed.iter_mut() {
                if delayed.path == path && delayed.remaining_queries > 0 {
                    delayed.remaining_queries -= 1;
                }
            }
            let ready: Vec<FakeElement> = app
                .delayed
                .iter()
                .filter(|d| d.path == path && d.remaining_queries == 0)
                .map(|d| d.element.clone())
                .collect();
            app.delayed.retain(|d| !(d.path == path && d.remaining_queries == 0));
            app.pages.entry(path.clone()).or_default().extend(ready);

            app.pages.get(&path).cloned().unwrap_or_default()
        };

        // The profile page reflects the session's credentials, keyed by
        // the auth token cookie.
        if path == "/profile" {
            if let Some(token) = token {
                if let Some(email) = self.accounts.lock().get(&token) {
                    elements.push(
                        FakeElement::new("span").text(email).data_cy("profile-email"),
                    );
                }
            }
        }

        Ok(elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(descriptor))
            .map(|(i, e)| e.to_handle(i as u64 + 1))
            .collect())
    }

    async fn dispatch_event(&self, target: &ElementHandle, event: &str) -> Result<()> {
        self.check_healthy()?;
        self.session.lock().dispatched.push((target.id, event.to_string()));
        Ok(())
    }

    async fn read_cookies(&self) -> Result<CookieJar> {
        self.check_healthy()?;
        Ok(self.session.lock().cookies.clone())
    }

    async fn write_cookies(&self, cookies: &CookieJar) -> Result<()> {
        self.check_healthy()?;
        let mut session = self.session.lock();
        let mut next = cookies.clone();
        for name in &session.sticky_cookies {
            if let Some(value) = session.cookies.get(name) {
                next.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        session.cookies = next;
        Ok(())
    }

    async fn read_storage(&self) -> Result<StorageEntries> {
        self.check_healthy()?;
        Ok(self.session.lock().storage.clone())
    }

    async fn write_storage(&self, entries: &StorageEntries) -> Result<()> {
        self.check_healthy()?;
        self.session.lock().storage = entries.clone();
        Ok(())
    }

    async fn open_session(&self) -> Result<Arc<dyn DomDriver>> {
        self.check_healthy()?;
        Ok(Arc::new(Self {
            app: self.app.clone(),
            session: Mutex::new(FakeSession::default()),
            healthy: self.healthy.clone(),
            queries: self.queries.clone(),
            accounts: self.accounts.clone(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.check_healthy()
    }
}

/// In-memory `StateBackend` accepting `/login` seeds with the right password
pub struct FakeBackend {
    accounts: Arc<Mutex<HashMap<String, String>>>,
    next_token: AtomicU64,
}

pub const VALID_PASS: &str = "testPass";

#[async_trait]
impl StateBackend for FakeBackend {
    async fn apply(&self, mutation: &StateMutation) -> Result<SeedOutcome> {
        if mutation.endpoint.trim_start_matches('/') != "login" {
            return Ok(SeedOutcome::Rejected {
                reason: format!("no such endpoint: {}", mutation.endpoint),
            });
        }
        let email = mutation.payload.get("email").and_then(|v| v.as_str()).unwrap_or_default();
        let pass = mutation.payload.get("pass").and_then(|v| v.as_str()).unwrap_or_default();
        if email.is_empty() || pass != VALID_PASS {
            return Ok(SeedOutcome::Rejected { reason: "invalid credentials".into() });
        }
        let token = format!("tok-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
        self.accounts.lock().insert(token.clone(), email.to_string());
        Ok(SeedOutcome::Applied { auth_token: Some(token) })
    }
}
