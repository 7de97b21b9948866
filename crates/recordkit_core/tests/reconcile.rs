use recordkit_core::db::open_db_in_memory;
use recordkit_core::{
    session_events, Entity, Filter, RecordStore, RemoteInfo, Session, SortKey, SqliteRecordStore,
};
use std::rc::Rc;

struct User;

impl Entity for User {
    fn entity_name() -> &'static str {
        "User"
    }

    fn default_sort() -> Vec<SortKey> {
        vec![SortKey::ascending("email")]
    }
}

struct RemoteUser {
    id: Option<String>,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

impl RemoteUser {
    fn with_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            created_at: Some(1_700_000_000_000),
            updated_at: Some(1_700_000_100_000),
        }
    }
}

impl RemoteInfo for RemoteUser {
    fn remote_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }
}

fn session() -> Session {
    let conn = open_db_in_memory().unwrap();
    let store = Rc::new(SqliteRecordStore::try_new(conn).unwrap());
    let (sender, _receiver) = session_events();
    Session::root(store, sender)
}

#[test]
fn distinct_remote_identities_yield_distinct_records() {
    let mut session = session();

    let a = session
        .find_or_create_remote::<User>(&RemoteUser::with_id("srv-a"), |_| {})
        .unwrap();
    let b = session
        .find_or_create_remote::<User>(&RemoteUser::with_id("srv-b"), |_| {})
        .unwrap();

    assert_ne!(a, b);
    session.commit().unwrap();
    assert_eq!(session.count::<User>(&Filter::All).unwrap(), 2);
}

#[test]
fn repeated_remote_identity_returns_same_record_and_count_stays_one() {
    let mut session = session();
    let payload = RemoteUser::with_id("srv-a");

    let first = session
        .find_or_create_remote::<User>(&payload, |record| {
            record.set("email", "a@at.es");
        })
        .unwrap();
    // Uncommitted: the second call must resolve through the identity map.
    let second = session.find_or_create_remote::<User>(&payload, |_| {}).unwrap();
    assert_eq!(first, second);

    session.commit().unwrap();
    let third = session.find_or_create_remote::<User>(&payload, |_| {}).unwrap();
    assert_eq!(first, third);

    session.commit().unwrap();
    assert_eq!(
        session
            .count::<User>(&Filter::remote_identity("srv-a"))
            .unwrap(),
        1
    );
}

#[test]
fn same_remote_identity_is_found_again_by_a_fresh_session() {
    let conn = open_db_in_memory().unwrap();
    let store: Rc<dyn RecordStore> = Rc::new(SqliteRecordStore::try_new(conn).unwrap());
    let (sender, _receiver) = session_events();
    let payload = RemoteUser::with_id("srv-a");

    let mut first_session = Session::root(Rc::clone(&store), sender.clone());
    let id = first_session
        .find_or_create_remote::<User>(&payload, |_| {})
        .unwrap();
    first_session.commit().unwrap();

    // A fresh session has an empty identity map and must hit the store.
    let mut second_session = Session::root(store, sender);
    let found = second_session
        .find_or_create_remote::<User>(&payload, |_| {})
        .unwrap();
    assert_eq!(found, id);
    second_session.commit().unwrap();
    assert_eq!(
        second_session
            .count::<User>(&Filter::remote_identity("srv-a"))
            .unwrap(),
        1
    );
}

#[test]
fn bounded_fetch_skips_a_pending_deleted_match() {
    let conn = open_db_in_memory().unwrap();
    let store: Rc<dyn RecordStore> = Rc::new(SqliteRecordStore::try_new(conn).unwrap());
    let (sender, _receiver) = session_events();

    let mut setup = Session::root(Rc::clone(&store), sender.clone());
    let first = setup.insert_record::<User>();
    setup.record_mut(first).unwrap().set("email", "a@at.es");
    let second = setup.insert_record::<User>();
    setup.record_mut(second).unwrap().set("email", "b@at.es");
    setup.commit().unwrap();

    // Fresh session: only the first match gets materialized, then deleted.
    let mut session = Session::root(store, sender);
    let found = session
        .find_or_fetch::<User>(&Filter::eq("email", "a@at.es"))
        .unwrap()
        .unwrap();
    assert_eq!(found, first);
    session.delete_record(found);

    // The limit-1 locator fetch must still see the match ranked behind the
    // pending-deleted record instead of reporting a miss.
    let survivor = session
        .find_or_fetch::<User>(&Filter::contains("email", "@at.es"))
        .unwrap();
    assert_eq!(survivor, Some(second));

    // And find-or-create therefore reuses it rather than inserting a
    // duplicate.
    let reconciled = session
        .find_or_create::<User>(&Filter::contains("email", "@at.es"), |_| {})
        .unwrap();
    assert_eq!(reconciled, second);
}

#[test]
fn miss_creates_exactly_one_configured_record() {
    let mut session = session();
    let filter = Filter::eq("email", "created@find.or");

    assert_eq!(session.count::<User>(&filter).unwrap(), 0);

    let id = session
        .find_or_create::<User>(&filter, |record| {
            record.set("email", "created@find.or");
        })
        .unwrap();

    let record = session.record(id).unwrap();
    assert_eq!(record.value_of("email"), "created@find.or".into());

    session.commit().unwrap();
    assert_eq!(session.count::<User>(&filter).unwrap(), 1);
}

#[test]
fn hit_applies_configure_to_the_existing_record() {
    let mut session = session();
    let payload = RemoteUser::with_id("srv-a");

    let id = session
        .find_or_create_remote::<User>(&payload, |record| {
            record.set("email", "old@at.es");
        })
        .unwrap();
    session.commit().unwrap();

    let updated = RemoteUser {
        updated_at: Some(1_700_000_999_999),
        ..RemoteUser::with_id("srv-a")
    };
    let same = session
        .find_or_create_remote::<User>(&updated, |record| {
            record.set("email", "new@at.es");
        })
        .unwrap();

    assert_eq!(id, same);
    let record = session.record(id).unwrap();
    assert_eq!(record.value_of("email"), "new@at.es".into());
    assert_eq!(record.updated_at, Some(1_700_000_999_999));
}

#[test]
fn remote_variant_stamps_identity_and_timestamps() {
    let mut session = session();

    let id = session
        .find_or_create_remote::<User>(&RemoteUser::with_id("srv-a"), |_| {})
        .unwrap();

    let record = session.record(id).unwrap();
    assert_eq!(record.remote_id.as_deref(), Some("srv-a"));
    assert_eq!(record.created_at, Some(1_700_000_000_000));
    assert_eq!(record.updated_at, Some(1_700_000_100_000));
}
