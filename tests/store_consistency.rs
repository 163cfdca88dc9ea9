//! End-to-end consistency coverage for the store session and its caches.

use std::sync::Arc;

use arbora::{
    CacheConfig, FieldRegistry, FindOptions, MemoryDriver, Page, PageId, PageStatus, SortToken,
    StorageError, StoreSession,
};

fn seeded_root(driver: &MemoryDriver) {
    driver.seed(Page::new(PageId::ROOT, PageId::UNSAVED, "home", "home"));
}

fn seed_items(driver: &MemoryDriver, ids: &[u64]) {
    for (index, id) in ids.iter().enumerate() {
        let mut page = Page::new(PageId(*id), PageId::ROOT, format!("item-{id}"), "item");
        page.sort = index as i64;
        driver.seed(page);
    }
}

fn session_with(driver: Arc<MemoryDriver>, config: CacheConfig) -> StoreSession {
    StoreSession::new(driver, FieldRegistry::new(), config)
}

#[test]
fn equivalent_selector_spellings_share_one_cache_entry() {
    let driver = Arc::new(MemoryDriver::new());
    seeded_root(&driver);
    let session = session_with(driver.clone(), CacheConfig::default());

    let by_path = session
        .find("path=/", &FindOptions::default())
        .expect("find by path");
    let by_id = session
        .find("id=1", &FindOptions::default())
        .expect("find by id");

    assert_eq!(by_path.ids(), vec![PageId::ROOT]);
    assert_eq!(by_id.ids(), by_path.ids());
    assert_eq!(
        driver.recorded_queries().len(),
        1,
        "the id spelling must be served from the path spelling's entry"
    );
}

#[test]
fn cached_collections_are_copy_on_read() {
    let driver = Arc::new(MemoryDriver::new());
    seeded_root(&driver);
    seed_items(&driver, &[5, 9]);
    let session = session_with(driver, CacheConfig::default());

    let mut results = session
        .find("template=item", &FindOptions::default())
        .expect("find");
    assert_eq!(results.ids(), vec![PageId(5), PageId(9)]);

    // Mutating the returned collection must never reach the cached entry.
    let extra = Page::new(PageId(77), PageId::ROOT, "stray", "item").into_shared();
    results.push(extra);

    let cached = session
        .find("template=item", &FindOptions::default())
        .expect("find again");
    assert_eq!(cached.ids(), vec![PageId(5), PageId(9)]);
}

#[test]
fn unpublished_single_results_are_never_reused() {
    let driver = Arc::new(MemoryDriver::new());
    seeded_root(&driver);
    let mut draft = Page::new(PageId(5), PageId::ROOT, "draft", "item");
    draft.status |= PageStatus::UNPUBLISHED;
    driver.seed(draft);
    let session = session_with(driver.clone(), CacheConfig::default());

    let first = session.find_one("name=draft").expect("find one");
    assert!(first.is_some());
    assert!(
        session.queries().is_empty(),
        "a sole unpublished result must not populate the query cache"
    );

    session.find_one("name=draft").expect("find one again");
    assert_eq!(
        driver.recorded_queries().len(),
        2,
        "every lookup goes back to the driver"
    );
}

#[test]
fn published_single_results_are_reused() {
    let driver = Arc::new(MemoryDriver::new());
    seeded_root(&driver);
    seed_items(&driver, &[5]);
    let session = session_with(driver.clone(), CacheConfig::default());

    session.find_one("name=item-5").expect("find one");
    session.find_one("name=item-5").expect("find one again");
    assert_eq!(driver.recorded_queries().len(), 1);
}

#[test]
fn chunked_iteration_visits_all_in_order_with_bounded_windows() {
    let driver = Arc::new(MemoryDriver::new());
    seed_items(&driver, &[5, 9, 12, 14, 20]);
    let config = CacheConfig {
        chunk_size: 2,
        ..Default::default()
    };
    let session = session_with(driver.clone(), config);

    let mut lazy = session
        .find_lazy("template=item", &FindOptions::default())
        .expect("lazy find");
    assert_eq!(lazy.len(), 5);

    let mut visited = Vec::new();
    while let Some(page) = lazy.next() {
        let page = page.expect("chunk load");
        visited.push(page.read().expect("page lock").id);
        assert!(
            session.identity().len() <= 2,
            "at most one chunk may be materialized at a time"
        );
    }
    assert_eq!(
        visited,
        vec![PageId(5), PageId(9), PageId(12), PageId(14), PageId(20)]
    );
    assert_eq!(
        driver.recorded_batches(),
        vec![
            vec![PageId(5), PageId(9)],
            vec![PageId(12), PageId(14)],
            vec![PageId(20)],
        ]
    );

    // A rewound iterator replays the identical sequence with fresh loads.
    lazy.rewind();
    let replay: Vec<PageId> = lazy
        .map(|page| page.expect("chunk load").read().expect("page lock").id)
        .collect();
    assert_eq!(replay, visited);
    assert_eq!(driver.recorded_batches().len(), 6);
}

#[test]
fn chunk_size_changes_move_future_boundaries_only() {
    let driver = Arc::new(MemoryDriver::new());
    seed_items(&driver, &[5, 9, 12, 14, 20]);
    let config = CacheConfig {
        chunk_size: 2,
        ..Default::default()
    };
    let session = session_with(driver.clone(), config);

    let mut lazy = session
        .find_lazy("template=item", &FindOptions::default())
        .expect("lazy find");

    let first = lazy.next().expect("first").expect("chunk load");
    assert_eq!(first.read().expect("page lock").id, PageId(5));

    // Reconfiguring mid-iteration recomputes the next window from the new
    // size: the second window becomes [3, 6), skipping index 2. Accepted
    // behavior, not a defect.
    session.set_config(CacheConfig {
        chunk_size: 3,
        ..Default::default()
    });

    let rest: Vec<PageId> = lazy
        .map(|page| page.expect("chunk load").read().expect("page lock").id)
        .collect();
    assert_eq!(rest, vec![PageId(9), PageId(14), PageId(20)]);
}

#[test]
fn failed_chunk_load_aborts_iteration() {
    let driver = Arc::new(MemoryDriver::new());
    seed_items(&driver, &[5, 9, 12, 14]);
    let config = CacheConfig {
        chunk_size: 2,
        ..Default::default()
    };
    let session = session_with(driver.clone(), config);

    let mut lazy = session
        .find_lazy("template=item", &FindOptions::default())
        .expect("lazy find");

    assert!(lazy.next().expect("first").is_ok());
    assert!(lazy.next().expect("second").is_ok());

    driver.set_failing(true);
    let failure = lazy.next().expect("third yields the error");
    assert!(matches!(failure, Err(StorageError::Persistence(_))));
    assert!(lazy.next().is_none(), "iteration ends after the failure");
}

#[test]
fn writes_invalidate_cached_queries_coarsely() {
    let driver = Arc::new(MemoryDriver::new());
    seeded_root(&driver);
    seed_items(&driver, &[5, 9]);
    let session = session_with(driver.clone(), CacheConfig::default());

    session
        .find("template=item", &FindOptions::default())
        .expect("find");
    session
        .find("name=item-5", &FindOptions::default())
        .expect("find");
    assert_eq!(session.queries().len(), 2);

    session
        .save(Page::new(PageId::UNSAVED, PageId::ROOT, "new-item", "item").into_shared())
        .expect("save");
    assert!(session.queries().is_empty());

    let after = session
        .find("template=item", &FindOptions::default())
        .expect("find after save");
    assert_eq!(after.len(), 3);
}

#[test]
fn sortfield_codec_round_trips_through_persistence() {
    let driver = Arc::new(MemoryDriver::new());
    let mut fields = FieldRegistry::new();
    fields
        .register(arbora::FieldId(42), "title")
        .expect("register");
    let session = StoreSession::new(driver.clone(), fields, CacheConfig::default());

    let sortfields = session.sortfields();
    let token = sortfields.encode("-title", "sort");
    assert_eq!(token, SortToken::Id(-42));
    assert_eq!(token.to_string(), "-42");
    assert_eq!(sortfields.decode(&token, "sort"), "-title");

    let mut blog = Page::new(PageId(7), PageId::ROOT, "blog", "list");
    blog.sortfield = Some("-title".to_string());
    driver.seed(blog.clone());
    assert!(sortfields.save(&blog).expect("save override"));
    assert_eq!(sortfields.sortfield_of(PageId(7)).expect("lookup"), "-title");

    blog.sortfield = None;
    assert!(sortfields.save(&blog).expect("collapse to default"));
    assert_eq!(sortfields.sortfield_of(PageId(7)).expect("lookup"), "sort");
}

#[test]
fn uncache_all_pins_survive_while_everything_else_goes() {
    let driver = Arc::new(MemoryDriver::new());
    seeded_root(&driver);
    seed_items(&driver, &[5, 9, 12]);
    let session = session_with(driver, CacheConfig::default());

    for id in [5, 9, 12] {
        session.get(PageId(id)).expect("get");
    }
    session.pin_actor(Some(PageId(9)));
    session.pin_locale_page(Some(PageId(12)));

    assert_eq!(session.uncache_all(), 1);
    assert!(session.identity().get(PageId(5)).is_none());
    assert!(session.identity().get(PageId(9)).is_some());
    assert!(session.identity().get(PageId(12)).is_some());
}
