//! End-to-end scenarios against the built-in catalog.

use paperdb_core::schema::{ColumnDescriptor as Col, EntityTypeDescriptor, Generator, RelationshipDescriptor as Rel};
use paperdb_core::settings::{FilterKind, FilterTarget, ImageFilter};
use paperdb_core::{Config, Fetched, Match, SchemaRegistry, Store, ValidationFailure};
use paperdb_testkit::prelude::*;
use serde_json::{json, Value};

fn ids(fetched: &Fetched) -> Vec<i64> {
    fetched
        .iter()
        .filter_map(|i| i.get("id").and_then(Value::as_i64))
        .collect()
}

#[test]
fn alice_lifecycle() {
    with_temp_store(|store| {
        let alice = store
            .create("user", object(json!({"username": "alice", "password": "Sup3r-secret"})))
            .unwrap();
        assert!(alice.exists());

        let err = store
            .create("user", object(json!({"username": "alice", "password": "An0ther-one"})))
            .unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::Duplicate));

        let by_name = Match::exact([("username", json!("alice"))]);
        let first = store.get_one("user", &by_name).unwrap();
        assert_eq!(first.get("id"), alice.get("id"));
        assert_eq!(first.get("password"), Some(&json!("Sup3r-secret")));

        assert_eq!(store.delete("user", &by_name, true).unwrap(), 1);
        assert!(store.get("user", &by_name).unwrap().is_empty());
    });
}

#[test]
fn settings_are_read_fresh() {
    with_file_store(|store| {
        let settings = store.settings();
        settings.set("image", &json!({"paused": true})).unwrap();

        let other = Store::open(store.config().clone()).unwrap();
        assert_eq!(other.settings().get("image").unwrap()["paused"], json!(true));
        assert_eq!(settings.get("image").unwrap()["paused"], json!(true));
    });
}

#[test]
fn freed_ids_are_reused() {
    with_temp_store(|store| {
        assert_eq!(ids(&store.get("category", &Match::All).unwrap()).len(), 4);

        assert_eq!(store.delete("category", &Match::exact([("id", json!(2))]), true).unwrap(), 1);
        let again = store
            .create("category", object(json!({"name": "Landmarks"})))
            .unwrap();
        assert_eq!(again.get("id"), Some(&json!(2)));

        let next = store
            .create("category", object(json!({"name": "Vehicles"})))
            .unwrap();
        assert_eq!(next.get("id"), Some(&json!(4)));
    });
}

#[test]
fn deleting_a_category_cascades_to_subcategories() {
    with_temp_store(|store| {
        let nature = Match::exact([("category_id", json!(1))]);
        assert_eq!(store.get("subcategory", &nature).unwrap().len(), 6);

        store.delete("category", &Match::exact([("id", json!(1))]), true).unwrap();
        assert!(store.get("subcategory", &nature).unwrap().is_empty());
        assert_eq!(store.get("subcategory", &Match::All).unwrap().len(), 8);
    });
}

#[test]
fn deleting_an_image_removes_everything_it_owns() {
    let dir = tempfile::tempdir().unwrap();
    let thumb = dir.path().join("thumb.png");
    std::fs::write(&thumb, b"png").unwrap();

    with_temp_store(|store| {
        let mut values = image_values(1);
        values.insert(
            "thumbnails".into(),
            json!([{
                "width": 64, "height": 64, "bytes": 3,
                "path": thumb.to_string_lossy(), "url": "/thumbs/1.png"
            }]),
        );
        values.insert(
            "quantizations".into(),
            json!([{
                "width": 800, "height": 480, "bytes": 9,
                "path": "/nonexistent/q/1.png", "url": "/q/1.png", "orientation": "landscape"
            }]),
        );
        values.insert("tags".into(), json!([{"category_id": 0, "subcategory_id": 1}]));
        let image = store.create("image", values).unwrap();
        let owned = Match::exact([("image_id", image.get("id").cloned().unwrap())]);

        assert_eq!(store.get("tag", &owned).unwrap().len(), 1);
        assert_eq!(store.get("thumbnail", &owned).unwrap().len(), 1);

        store.delete("image", &Match::exact([("file", json!("1.png"))]), true).unwrap();
        for child in ["tag", "thumbnail", "quantization"] {
            assert!(store.get(child, &owned).unwrap().is_empty(), "{child}");
        }
        assert!(!thumb.exists());

        // References are not owned: the tag's category survives.
        assert_eq!(store.get("category", &Match::exact([("id", json!(0))])).unwrap().len(), 1);
    });
}

#[test]
fn deleting_a_user_keeps_shared_permissions() {
    with_temp_store(|store| {
        store.delete("user", &Match::exact([("username", json!("admin"))]), true).unwrap();
        assert!(store.get("user_permission", &Match::exact([("user_id", json!(1))])).unwrap().is_empty());
        assert_eq!(store.get("permission", &Match::All).unwrap().len(), 4);
        assert_eq!(store.get("user_permission", &Match::All).unwrap().len(), 1);
    });
}

fn ordered_registry() -> SchemaRegistry {
    let post = EntityTypeDescriptor::new("post", "posts")
        .column(Col::integer("id").primary_key().generated(Generator::UniqueInt))
        .column(Col::text("title").not_null())
        .relationship(Rel::one_to_many("attachment", "attachments", "id", "post_id").modify_before_parent())
        .relationship(Rel::one_to_many("comment", "comments", "id", "post_id"));
    let attachment = EntityTypeDescriptor::new("attachment", "attachments")
        .column(Col::integer("post_id").not_null())
        .column(Col::text("name").not_null());
    let comment = EntityTypeDescriptor::new("comment", "comments")
        .column(Col::integer("post_id").not_null())
        .column(Col::text("body").not_null());
    SchemaRegistry::builder()
        .register(post)
        .register(attachment)
        .register(comment)
        .build()
        .unwrap()
}

#[test]
fn cascades_cover_both_orders() {
    let store = TestStore::with_registry(ordered_registry());
    let mut post = store
        .create(
            "post",
            object(json!({
                "title": "hello",
                "attachments": [{"name": "a.txt"}, {"name": "b.txt"}],
                "comments": [{"body": "first"}]
            })),
        )
        .unwrap();
    assert_eq!(post.child("attachments").unwrap().len(), 2);

    let stored = store.get_one("post", &Match::exact([("title", json!("hello"))])).unwrap();
    assert_eq!(stored.child("attachments").unwrap().len(), 2);
    assert_eq!(stored.child("comments").unwrap().len(), 1);

    post.delete(true).unwrap();
    for child in ["attachment", "comment"] {
        assert!(store.get(child, &Match::All).unwrap().is_empty(), "{child}");
    }
}

#[test]
fn api_views_hide_secrets_and_format_dates() {
    with_temp_store(|store| {
        let admin = store.get_one("user", &Match::exact([("username", json!("admin"))])).unwrap();
        let view = admin.to_api_view();
        assert!(view.get("password").is_none());
        assert_eq!(view["username"], json!("admin"));
        let links = view["user_permissions"].as_array().unwrap();
        assert_eq!(links.len(), 3);
        let names: Vec<_> = links.iter().map(|l| l["permission"]["name"].clone()).collect();
        assert!(names.contains(&json!("Admin")));

        let image = store.create("image", image_values(7)).unwrap();
        let view = image.to_api_view();
        assert!(view.get("path").is_none());
        assert!(view["created_date_formatted"].as_str().unwrap().starts_with("2023/11/14"));
        assert_eq!(view["tags"], json!([]));
    });
}

#[test]
fn media_queue_follows_filters() {
    with_temp_store(|store| {
        let mut image_ids = Vec::new();
        for n in 0..3 {
            let mut values = image_values(n);
            // Image 0 is tagged Nature/Ocean, the others People/Family.
            let tag = if n == 0 {
                json!([{"category_id": 1, "subcategory_id": 4}])
            } else {
                json!([{"category_id": 0, "subcategory_id": 0}])
            };
            values.insert("tags".into(), tag);
            let image = store.create("image", values).unwrap();
            image_ids.push(image.get("id").and_then(Value::as_i64).unwrap());
        }

        let settings = store.settings();
        let image = settings.generate_media_queue(Some(image_ids[1])).unwrap();
        assert_eq!(image.queue.len(), 9);
        assert_eq!(image.current, image_ids[1]);
        assert_eq!(image.queue.last(), Some(&image_ids[1]));
        for id in &image_ids {
            assert_eq!(image.queue.iter().filter(|q| *q == id).count(), 3);
        }

        let rotated = settings.rotate_media_queue(true).unwrap();
        assert_eq!(rotated.current, image.queue[0]);
        assert_eq!(rotated.queue[..8], image.queue[1..]);

        let back = settings.rotate_media_queue(false).unwrap();
        assert_eq!(back.queue, image.queue);
        assert_eq!(back.current, image_ids[1]);

        let mut filtered = settings.image().unwrap();
        filtered.filters = vec![ImageFilter {
            kind: FilterKind::Exclude,
            category: FilterTarget { id: 1, name: Some("Nature".into()) },
            subcategory: None,
        }];
        settings.set_image(&filtered).unwrap();
        let image = settings.generate_media_queue(None).unwrap();
        assert_eq!(image.queue.len(), 6);
        assert!(!image.queue.contains(&image_ids[0]));

        filtered.filters[0].kind = FilterKind::Include;
        settings.set_image(&filtered).unwrap();
        let image = settings.generate_media_queue(None).unwrap();
        assert_eq!(image.queue, vec![image_ids[0]; 3]);

        let err = settings.generate_media_queue(Some(image_ids[1])).unwrap_err();
        assert!(matches!(err, paperdb_core::CoreError::InvalidOperation { .. }));
    });
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().path(dir.path().join("paper.db"));
    let admin_password = |store: &Store| {
        store
            .get_one("user", &Match::exact([("username", json!("admin"))]))
            .unwrap()
            .get("password")
            .cloned()
    };

    let first = Store::open(config.clone()).unwrap();
    let api_password = first
        .get_one("user", &Match::exact([("id", json!(0))]))
        .unwrap()
        .get("password")
        .cloned();
    drop(first);

    let second = Store::open(config).unwrap();
    assert_eq!(admin_password(&second), Some(json!("Ch@ng3_!+")));
    let again = second
        .get_one("user", &Match::exact([("id", json!(0))]))
        .unwrap()
        .get("password")
        .cloned();
    assert_eq!(again, api_password);
}
