use recordkit_core::{
    DeleteRequest, Entity, Filter, PersistentContainer, SortKey, StoreConfig,
};
use tempfile::tempdir;

struct User;

impl Entity for User {
    fn entity_name() -> &'static str {
        "User"
    }

    fn default_sort() -> Vec<SortKey> {
        vec![SortKey::ascending("email")]
    }
}

struct Comment;

impl Entity for Comment {
    fn entity_name() -> &'static str {
        "Comment"
    }
}

#[test]
fn open_prepares_an_in_memory_backing() {
    let mut container = PersistentContainer::open(StoreConfig::InMemory).unwrap();
    assert_eq!(
        container
            .main_session()
            .count::<User>(&Filter::All)
            .unwrap(),
        0
    );
}

#[test]
fn open_prepares_a_durable_backing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.sqlite3");

    {
        let mut container =
            PersistentContainer::open(StoreConfig::OnDisk(path.clone())).unwrap();
        let main = container.main_session();
        let id = main.insert_record::<User>();
        main.record_mut(id).unwrap().set("email", "a@at.es");
        main.commit().unwrap();
    }

    // Reopening the same file sees the committed row.
    let mut container = PersistentContainer::open(StoreConfig::OnDisk(path)).unwrap();
    assert_eq!(
        container
            .main_session()
            .count::<User>(&Filter::eq("email", "a@at.es"))
            .unwrap(),
        1
    );
}

#[test]
fn background_commit_propagates_owned_records_to_main() {
    let mut container = PersistentContainer::open(StoreConfig::InMemory).unwrap();

    container
        .perform_background_task(|session| {
            let user = session.insert_record::<User>();
            session.record_mut(user).unwrap().set("email", "owner@at.es");

            let comment = session.insert_record::<Comment>();
            {
                let record = session.record_mut(comment).unwrap();
                record.set("text", "first!");
                record.set("owner", user);
            }
            session.commit()
        })
        .unwrap();

    let main = container.main_session();
    let user = main
        .find_or_fetch::<User>(&Filter::eq("email", "owner@at.es"))
        .unwrap()
        .expect("propagated user visible from main session");
    let owned_comments = main
        .count::<Comment>(&Filter::eq("owner", user))
        .unwrap();
    assert_eq!(owned_comments, 1);
}

#[test]
fn background_commit_without_changes_leaves_main_untouched() {
    let mut container = PersistentContainer::open(StoreConfig::InMemory).unwrap();

    container
        .perform_background_task(|session| {
            // Committing a clean session is a no-op and emits no event.
            session.commit()
        })
        .unwrap();

    let main = container.main_session();
    assert!(!main.has_changes());
    assert_eq!(main.count::<User>(&Filter::All).unwrap(), 0);
}

#[test]
fn propagation_is_deferred_until_the_queue_is_drained() {
    let mut container = PersistentContainer::open(StoreConfig::InMemory).unwrap();

    let mut background = container.background_session();
    let id = background.insert_record::<User>();
    background.record_mut(id).unwrap().set("email", "late@at.es");
    background.commit().unwrap();

    // Not drained yet: the store has not seen the row.
    assert_eq!(
        container
            .main_session()
            .count::<User>(&Filter::eq("email", "late@at.es"))
            .unwrap(),
        0
    );

    container.process_pending_saves();
    assert_eq!(
        container
            .main_session()
            .count::<User>(&Filter::eq("email", "late@at.es"))
            .unwrap(),
        1
    );
}

#[test]
fn batch_delete_collects_identities_and_resets_main() {
    let mut container = PersistentContainer::open(StoreConfig::InMemory).unwrap();

    let main = container.main_session();
    let keep = main.insert_record::<User>();
    main.record_mut(keep).unwrap().set("email", "keep@at.es");
    let drop_a = main.insert_record::<User>();
    main.record_mut(drop_a).unwrap().set("email", "drop-a@spam.es");
    let drop_b = main.insert_record::<User>();
    main.record_mut(drop_b).unwrap().set("email", "drop-b@spam.es");
    main.commit().unwrap();

    let deleted = container
        .batch_delete(&[DeleteRequest {
            entity: "User",
            filter: Filter::contains("email", "@spam.es"),
        }])
        .unwrap();

    assert_eq!(deleted.len(), 2);
    assert!(deleted.contains(&drop_a));
    assert!(deleted.contains(&drop_b));

    // Main session was reset: no stale materialized copies survive.
    let main = container.main_session();
    assert!(main.record(keep).is_none());
    assert!(main.record(drop_a).is_none());
    assert_eq!(main.count::<User>(&Filter::All).unwrap(), 1);
}
