//! Scripted stand-in for the remote directory.

use async_trait::async_trait;
use dircache_upstream::{DirectoryApi, FranchisePage, OutletLookup, PageOutcome};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Serves pre-scripted pages; pages without a script come back empty.
///
/// A gated directory blocks every page request until the test releases it, which
/// keeps a job `running` for as long as the test needs.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedDirectory {
    pages: HashMap<u32, FranchisePage>,
    outlets: HashMap<(String, String), Option<OutletLookup>>,
    gate: Option<Semaphore>,
    panic_on_page: Option<u32>,
    fetches: AtomicUsize,
    requested: Mutex<Vec<u32>>,
}

#[allow(dead_code)]
impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block page requests until [`release`](Self::release) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_page(
        mut self,
        page: u32,
        rows: Vec<Value>,
        total_count: Option<u64>,
        total_pages: Option<u64>,
    ) -> Self {
        self.pages.insert(
            page,
            FranchisePage {
                rows,
                total_count,
                total_pages,
                outcome: PageOutcome::Fetched,
            },
        );
        self
    }

    pub fn with_unavailable_page(mut self, page: u32) -> Self {
        self.pages.insert(page, FranchisePage::unavailable());
        self
    }

    pub fn with_outlet(mut self, fid: &str, oid: &str, lookup: Option<OutletLookup>) -> Self {
        self.outlets
            .insert((fid.to_string(), oid.to_string()), lookup);
        self
    }

    pub fn panicking_on(mut self, page: u32) -> Self {
        self.panic_on_page = Some(page);
        self
    }

    /// Let `pages` more page requests through.
    pub fn release(&self, pages: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(pages);
        }
    }

    /// Page requests started, including ones still waiting at the gate.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Pages requested, in order.
    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryApi for ScriptedDirectory {
    async fn fetch_page(&self, page: u32, _page_size: u32) -> FranchisePage {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.requested.lock().unwrap().push(page);

        if self.panic_on_page == Some(page) {
            panic!("scripted directory failure on page {page}");
        }

        self.pages.get(&page).cloned().unwrap_or(FranchisePage {
            rows: Vec::new(),
            total_count: None,
            total_pages: None,
            outcome: PageOutcome::Fetched,
        })
    }

    async fn fetch_outlet(&self, fid: &str, oid: &str) -> Option<OutletLookup> {
        self.outlets
            .get(&(fid.to_string(), oid.to_string()))
            .cloned()
            .unwrap_or_else(|| Some(OutletLookup::not_found()))
    }
}
