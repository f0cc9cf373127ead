//! Shared fixtures for integration tests: scriptable mocks for the host
//! seams and a harness that wires a full session around them.

// Each test binary uses a different slice of the fixtures.
#![allow(dead_code)]

use anyhow::{bail, Result};
use arbor_sidebar::{
    BackgroundPort, CloseConfirmer, ConfigHandle, MemoryCacheStore, NativeTab, SidebarSession,
    TabId, TabSource, TreeStructureEntry, WindowId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Background process double. Readiness and the pullable structure are
/// scriptable; every call is counted.
#[derive(Default)]
pub struct MockBackground {
    pub ready: AtomicBool,
    pub pings: AtomicU32,
    pub structure: Mutex<Vec<TreeStructureEntry>>,
    pub structure_pulls: AtomicU32,
    pub opened: AtomicU32,
    pub focused: AtomicU32,
    pub blurred: AtomicU32,
}

impl MockBackground {
    pub fn ready() -> Self {
        let background = Self::default();
        background.ready.store(true, Ordering::SeqCst);
        background
    }

    pub fn with_structure(structure: Vec<TreeStructureEntry>) -> Self {
        let background = Self::ready();
        *background.structure.lock() = structure;
        background
    }
}

impl BackgroundPort for MockBackground {
    async fn ping(&self) -> Result<bool> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn pull_tree_structure(&self, _window: WindowId) -> Result<Vec<TreeStructureEntry>> {
        self.structure_pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.structure.lock().clone())
    }

    async fn notify_sidebar_opened(&self, _window: WindowId) -> Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_sidebar_focused(&self, _window: WindowId) -> Result<()> {
        self.focused.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_sidebar_blurred(&self, _window: WindowId) -> Result<()> {
        self.blurred.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Live tab list double. Mutate `tabs` between queries to simulate churn.
#[derive(Default)]
pub struct MockTabs {
    pub tabs: Mutex<Vec<NativeTab>>,
    pub queries: AtomicU32,
    pub fail: AtomicBool,
}

impl MockTabs {
    pub fn with_tabs(tabs: Vec<NativeTab>) -> Self {
        Self {
            tabs: Mutex::new(tabs),
            ..Self::default()
        }
    }
}

impl TabSource for MockTabs {
    async fn query_window_tabs(&self, _window: WindowId) -> Result<Vec<NativeTab>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("tab query failed");
        }
        Ok(self.tabs.lock().clone())
    }
}

/// Confirmation dialog double with a canned answer.
pub struct MockConfirmer {
    pub answer: AtomicBool,
    pub asked: AtomicU32,
}

impl MockConfirmer {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            asked: AtomicU32::new(0),
        }
    }
}

impl CloseConfirmer for MockConfirmer {
    async fn confirm_close(&self, _window: WindowId, _count: usize) -> Result<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.load(Ordering::SeqCst))
    }
}

pub fn native_tab(id: i64, window: i64, index: usize, url: &str) -> NativeTab {
    NativeTab::new(TabId(id), WindowId(window), index, url)
}

pub fn window_tabs(window: i64, count: i64) -> Vec<NativeTab> {
    (0..count)
        .map(|i| native_tab(i, window, i as usize, &format!("https://example.com/{i}")))
        .collect()
}

pub type TestSession = SidebarSession<MockBackground, MockTabs, MockConfirmer, MemoryCacheStore>;

pub struct TestHarness {
    pub session: TestSession,
    pub background: Arc<MockBackground>,
    pub tabs: Arc<MockTabs>,
    pub confirmer: Arc<MockConfirmer>,
    pub cache: Arc<MemoryCacheStore>,
    pub config: ConfigHandle,
}

/// Full session over mocks for `window`, with short waits so negative-path
/// tests don't sit out multi-second timeouts.
pub fn harness(window: i64, live: Vec<NativeTab>) -> TestHarness {
    harness_with(
        window,
        MockBackground::ready(),
        MockTabs::with_tabs(live),
        MockConfirmer::answering(true),
    )
}

pub fn harness_with(
    window: i64,
    background: MockBackground,
    tabs: MockTabs,
    confirmer: MockConfirmer,
) -> TestHarness {
    let config = ConfigHandle::default();
    config.update(|config| {
        config.tab_wait_timeout_ms = 50;
        config.layout_update_delay_ms = 1;
        config.restore_retry_delay_ms = 10;
    });
    let background = Arc::new(background);
    let tabs = Arc::new(tabs);
    let confirmer = Arc::new(confirmer);
    let cache = Arc::new(MemoryCacheStore::new());
    let session = SidebarSession::new(
        WindowId(window),
        config.clone(),
        background.clone(),
        tabs.clone(),
        confirmer.clone(),
        cache.clone(),
    );
    TestHarness {
        session,
        background,
        tabs,
        confirmer,
        cache,
        config,
    }
}
