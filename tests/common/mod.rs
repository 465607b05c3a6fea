//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use autocomplete::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDoc {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<String>,
}

impl TestDoc {
    pub fn new(id: &str, name: &str) -> Self {
        TestDoc {
            id: id.to_string(),
            name: name.to_string(),
            data: None,
        }
    }
}

impl Document for TestDoc {
    type Payload = TestDoc;

    fn id(&self) -> &str {
        &self.id
    }

    fn term(&self) -> &str {
        &self.name
    }

    fn payload(&self) -> &TestDoc {
        self
    }
}

/// `{id: "123", name: "Test SEARCH term!"}`
pub fn d1() -> TestDoc {
    TestDoc::new("123", "Test SEARCH term!")
}

/// `{id: "345", name: "Another search TERM"}`
pub fn d2() -> TestDoc {
    TestDoc::new("345", "Another search TERM")
}

/// `{id: "345", name: "Test another SEARCH term 2"}`, sharing d1's first word.
pub fn d2_terms() -> TestDoc {
    TestDoc::new("345", "Test another SEARCH term 2")
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn store(scripting: bool) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(MemoryStoreConfig {
        max_connections: 8,
        scripting,
    }))
}

/// An engine with `first` at score 100 and `second` at score 200 in index
/// `docs`.
pub async fn seeded(
    index_type: IndexType,
    scripting: bool,
    first: &TestDoc,
    second: &TestDoc,
) -> Result<(Arc<MemoryStore>, Autocomplete)> {
    init_logging();
    let store = store(scripting);
    let engine = Autocomplete::new(store.clone(), "ac", index_type);
    engine.index("docs", first, 100).await?;
    engine.index("docs", second, 200).await?;
    Ok((store, engine))
}

pub fn ids(docs: &[TestDoc]) -> Vec<&str> {
    docs.iter().map(|doc| doc.id.as_str()).collect()
}
