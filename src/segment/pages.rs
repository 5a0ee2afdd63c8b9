use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageOffset {
    pub start: usize,
    pub page_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    entries: Vec<PageOffset>,
}

impl OffsetTable {
    #[cfg(test)]
    pub fn entries(&self) -> &[PageOffset] {
        &self.entries
    }

    // Right-biased: an index on a page start belongs to that page.
    pub fn page_number(&self, index: usize) -> u32 {
        let upper = self.entries.partition_point(|entry| entry.start <= index);
        match upper.checked_sub(1) {
            Some(last) => self.entries[last].page_number,
            None => 0,
        }
    }
}

impl From<Vec<PageOffset>> for OffsetTable {
    fn from(mut entries: Vec<PageOffset>) -> Self {
        if entries.is_empty() {
            entries.push(PageOffset {
                start: 0,
                page_number: 0,
            });
        }
        Self { entries }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatedText {
    pub text: String,
    pub offsets: OffsetTable,
}

// The trailing newline keeps line-anchored patterns from fusing across pages.
pub fn aggregate_pages(pages: &[Page]) -> AggregatedText {
    let mut ordered = pages.iter().collect::<Vec<&Page>>();
    ordered.sort_by_key(|page| page.page_number);

    let capacity = ordered.iter().map(|page| page.text.len() + 1).sum();
    let mut text = String::with_capacity(capacity);
    let mut entries = Vec::with_capacity(ordered.len());

    for page in ordered {
        entries.push(PageOffset {
            start: text.len(),
            page_number: page.page_number,
        });
        text.push_str(&page.text);
        text.push('\n');
    }

    AggregatedText {
        text,
        offsets: OffsetTable::from(entries),
    }
}
