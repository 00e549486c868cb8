//! In-memory inscription source for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ord_harvest_models::{BlockPage, Height, Inscription, UnitResultSet};
use ord_harvest_source::{InscriptionSource, SourceError};

/// Serves canned listing pages and inscriptions, and records which
/// requests were made.
#[derive(Default)]
pub struct FakeSource {
    frontier: Height,
    height_fails: bool,
    pages: BTreeMap<Height, Vec<Vec<String>>>,
    failing_pages: BTreeSet<(Height, u32)>,
    failing_inscriptions: BTreeSet<String>,
    fetch_delay: Option<Duration>,
    page_requests: Mutex<Vec<(Height, u32)>>,
    inscription_requests: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(frontier: Height) -> Self {
        Self {
            frontier,
            ..Self::default()
        }
    }

    /// Lists `pages` for `height`; every page but the last has `more` set.
    /// Each listed ID resolves to an inscription revealed at `height`.
    pub fn with_block(mut self, height: Height, pages: &[&[&str]]) -> Self {
        self.pages.insert(
            height,
            pages
                .iter()
                .map(|page| page.iter().map(ToString::to_string).collect())
                .collect(),
        );
        self
    }

    pub fn failing_height(mut self) -> Self {
        self.height_fails = true;
        self
    }

    pub fn failing_page(mut self, height: Height, page: u32) -> Self {
        self.failing_pages.insert((height, page));
        self
    }

    pub fn failing_inscription(mut self, id: &str) -> Self {
        self.failing_inscriptions.insert(id.to_string());
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Heights whose first listing page was requested, in request order.
    pub fn listed_heights(&self) -> Vec<Height> {
        self.page_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, page)| *page == 0)
            .map(|(height, _)| *height)
            .collect()
    }

    pub fn page_requests(&self) -> Vec<(Height, u32)> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn inscription_requests(&self) -> Vec<String> {
        self.inscription_requests.lock().unwrap().clone()
    }

    fn height_of(&self, id: &str) -> Option<Height> {
        self.pages.iter().find_map(|(height, pages)| {
            pages
                .iter()
                .any(|page| page.iter().any(|listed| listed == id))
                .then_some(*height)
        })
    }
}

#[async_trait]
impl InscriptionSource for FakeSource {
    async fn current_height(&self) -> Result<Height, SourceError> {
        if self.height_fails {
            return Err(status_error("/r/blockheight"));
        }
        Ok(self.frontier)
    }

    async fn block_page(&self, height: Height, page: u32) -> Result<BlockPage, SourceError> {
        self.page_requests.lock().unwrap().push((height, page));

        if self.failing_pages.contains(&(height, page)) {
            return Err(status_error(&format!("/inscriptions/block/{height}/{page}")));
        }

        let pages = self.pages.get(&height).map_or(&[][..], Vec::as_slice);
        let index = page as usize;
        Ok(BlockPage {
            inscriptions: pages.get(index).cloned().unwrap_or_default(),
            more: index + 1 < pages.len(),
            page_index: page,
        })
    }

    async fn inscription(&self, inscription_id: &str) -> Result<Inscription, SourceError> {
        self.inscription_requests
            .lock()
            .unwrap()
            .push(inscription_id.to_string());

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_inscriptions.contains(inscription_id) {
            return Err(status_error(&format!("/e/inscription/{inscription_id}")));
        }

        let height = self
            .height_of(inscription_id)
            .ok_or_else(|| status_error(&format!("/e/inscription/{inscription_id}")))?;
        Ok(inscription(inscription_id, height))
    }
}

fn status_error(path: &str) -> SourceError {
    SourceError::Status {
        url: format!("http://ord.test{path}"),
        status: 500,
    }
}

pub fn inscription(id: &str, height: Height) -> Inscription {
    Inscription {
        inscription_id: id.to_string(),
        inscription_number: 1,
        genesis_height: height,
        timestamp: 1_690_000_000,
        content_type: Some("text/plain".to_string()),
        ..Inscription::default()
    }
}

pub fn result_set(inscriptions: &[Inscription]) -> UnitResultSet {
    inscriptions
        .iter()
        .map(|ins| (ins.inscription_id.clone(), ins.clone()))
        .collect()
}
