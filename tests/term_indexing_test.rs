//! Integration tests for term indexing.
//!
//! Every scenario runs twice: once with server-side scripts and once on a
//! store without scripting, where the engine falls back to optimistic
//! transactions.

mod common;

use std::sync::Arc;

use autocomplete::prelude::*;
use common::{TestDoc, d1, d2_terms, ids, seeded};

async fn engine(scripting: bool) -> Result<(Arc<MemoryStore>, Autocomplete)> {
    seeded(IndexType::Terms, scripting, &d1(), &d2_terms()).await
}

#[tokio::test]
async fn test_search_orders() -> Result<()> {
    for scripting in [true, false] {
        let (_store, engine) = engine(scripting).await?;

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::Lexicographical).await?;
        assert_eq!(docs, vec![d2_terms(), d1()]);

        let docs: Vec<TestDoc> = engine
            .search_as("docs", "test", SortOrder::ReverseLexicographical)
            .await?;
        assert_eq!(docs, vec![d1(), d2_terms()]);

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::Score).await?;
        assert_eq!(docs, vec![d1(), d2_terms()]);

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::ReverseScore).await?;
        assert_eq!(docs, vec![d2_terms(), d1()]);
    }
    Ok(())
}

#[tokio::test]
async fn test_only_term_start_matches() -> Result<()> {
    let (_store, engine) = engine(true).await?;

    assert!(engine.search("docs", "x", SortOrder::Lexicographical).await?.is_empty());
    assert!(engine.search("docs", "search", SortOrder::Lexicographical).await?.is_empty());

    let docs: Vec<TestDoc> = engine.search_as("docs", "TEST SE", SortOrder::Score).await?;
    assert_eq!(ids(&docs), vec!["123"]);

    let docs: Vec<TestDoc> = engine.search_as("docs", "test an", SortOrder::Score).await?;
    assert_eq!(ids(&docs), vec!["345"]);

    assert!(engine.search("docs", " test", SortOrder::Score).await?.is_empty());

    assert!(engine.search("docs", "", SortOrder::Score).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_trailing_space_completes_the_word() -> Result<()> {
    for scripting in [true, false] {
        let (_store, engine) = seeded(
            IndexType::Terms,
            scripting,
            &TestDoc::new("1", "Test search"),
            &TestDoc::new("2", "Testing x"),
        )
        .await?;

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::Lexicographical).await?;
        assert_eq!(ids(&docs), vec!["1", "2"]);

        let docs: Vec<TestDoc> = engine.search_as("docs", "test ", SortOrder::Lexicographical).await?;
        assert_eq!(ids(&docs), vec!["1"]);
    }
    Ok(())
}

#[tokio::test]
async fn test_terms_containing_the_member_delimiter() -> Result<()> {
    for scripting in [true, false] {
        let (store, engine) = engine(scripting).await?;
        let doc = TestDoc::new("1", "c::lang");

        engine.index("docs", &doc, 1).await?;
        engine.index("docs", &doc, 2).await?;
        assert_eq!(store.zcard("ac:$$docs"), 3);
        assert!(store
            .zscore("ac:$$docs", "c::lang::0000000000000002::c::lang_1")
            .is_some());
        assert!(engine.contains("docs", &doc).await?);

        // A document whose key is a suffix of the other one stays apart.
        let lang = TestDoc::new("1", "lang");
        assert!(!engine.contains("docs", &lang).await?);
        engine.index("docs", &lang, 7).await?;
        assert_eq!(store.zcard("ac:$$docs"), 4);

        let docs: Vec<TestDoc> = engine.search_as("docs", "c::", SortOrder::Score).await?;
        assert_eq!(docs, vec![doc.clone()]);

        engine.update_score("docs", &doc, 3).await?;
        assert!(store
            .zscore("ac:$$docs", "c::lang::0000000000000003::c::lang_1")
            .is_some());

        engine.remove_document("docs", &doc).await?;
        assert_eq!(store.zcard("ac:$$docs"), 3);
        assert!(!engine.contains("docs", &doc).await?);
        assert!(engine.contains("docs", &lang).await?);
    }
    Ok(())
}

#[tokio::test]
async fn test_members_encode_term_score_and_key() -> Result<()> {
    let (store, _engine) = engine(true).await?;

    assert_eq!(store.zcard("ac:$$docs"), 2);
    assert_eq!(
        store.zscore("ac:$$docs", "test search term!::0000000000000064::test_search_term!_123"),
        Some(0.0)
    );
    assert_eq!(
        store.zscore(
            "ac:$$docs",
            "test another search term 2::00000000000000c8::test_another_search_term_2_345"
        ),
        Some(0.0)
    );
    assert_eq!(store.hlen("ac:$docs"), 2);
    Ok(())
}

#[tokio::test]
async fn test_remove_document() -> Result<()> {
    for scripting in [true, false] {
        let (store, engine) = engine(scripting).await?;

        engine.remove_document("docs", &d1()).await?;

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::Score).await?;
        assert_eq!(docs, vec![d2_terms()]);
        assert_eq!(store.zcard("ac:$$docs"), 1);
        assert_eq!(store.hlen("ac:$docs"), 1);

        let err = engine.remove_document("docs", &d1()).await.unwrap_err();
        assert!(matches!(err, AutocompleteError::MemberNotFound { .. }));
    }
    Ok(())
}

#[tokio::test]
async fn test_update_score_changes_order() -> Result<()> {
    for scripting in [true, false] {
        let (store, engine) = engine(scripting).await?;

        engine.update_score("docs", &d1(), 300).await?;

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::Score).await?;
        assert_eq!(docs, vec![d2_terms(), d1()]);
        assert_eq!(store.zcard("ac:$$docs"), 2);

        let missing = TestDoc::new("999", "Test missing");
        let err = engine.update_score("docs", &missing, 1).await.unwrap_err();
        assert!(err.is_not_found());
    }
    Ok(())
}

#[tokio::test]
async fn test_update_document_keeps_member() -> Result<()> {
    let (store, engine) = engine(false).await?;

    let mut updated = d1();
    updated.data = Some("fresh".to_string());
    engine.update_document("docs", &updated).await?;

    let docs: Vec<TestDoc> = engine.search_as("docs", "test s", SortOrder::Score).await?;
    assert_eq!(docs, vec![updated]);
    assert_eq!(store.zcard("ac:$$docs"), 2);
    Ok(())
}

#[tokio::test]
async fn test_reindex_replaces_member() -> Result<()> {
    for scripting in [true, false] {
        let (store, engine) = engine(scripting).await?;

        engine.index("docs", &d1(), 100).await?;
        assert_eq!(store.zcard("ac:$$docs"), 2);

        engine.index("docs", &d1(), 500).await?;
        assert_eq!(store.zcard("ac:$$docs"), 2);

        let docs: Vec<TestDoc> = engine.search_as("docs", "test", SortOrder::ReverseScore).await?;
        assert_eq!(docs, vec![d1(), d2_terms()]);
    }
    Ok(())
}

#[tokio::test]
async fn test_contains() -> Result<()> {
    for scripting in [true, false] {
        let (_store, engine) = engine(scripting).await?;

        assert!(engine.contains("docs", &d1()).await?);
        assert!(!engine.contains("docs", &TestDoc::new("1", "Test")).await?);
        assert!(!engine.contains("other", &d1()).await?);
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrent_writers_converge() -> Result<()> {
    let (store, engine) = engine(false).await?;

    let mut tasks = Vec::new();
    for i in 0..8u64 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            engine.update_score("docs", &d1(), 1000 + i).await
        }));
    }
    for task in tasks {
        task.await.expect("writer task")?;
    }

    assert_eq!(store.zcard("ac:$$docs"), 2);
    assert_eq!(store.open_connections(), 0);
    Ok(())
}
