//! The built-in PaperDB catalog.

use super::column::{ColumnDescriptor as Col, Generator, TokenArgs};
use super::descriptor::EntityTypeDescriptor as Entity;
use super::registry::RegistryBuilder;
use super::relationship::RelationshipDescriptor as Rel;
use crate::entity::hooks::{FileHooks, ImageHooks, TagHooks, TokenHooks, UserHooks};
use paperdb_storage::statement::OrderBy;
use serde_json::json;

/// Default alphabet for generated tokens and service passwords.
pub const TOKEN_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789`~!@#$%^&*()-_=+,.<>?|[];";

fn id() -> Col {
    Col::integer("id")
        .primary_key()
        .generated(Generator::UniqueInt)
        .api()
}

fn required_int(key: &str) -> Col {
    Col::integer(key).not_null().api()
}

/// Registry builder preloaded with every built-in entity type and its
/// hooks. Further types may be registered before building.
#[must_use]
pub fn builtin() -> RegistryBuilder {
    RegistryBuilder::default()
        .register(settings())
        .register(user())
        .register(permission())
        .register(user_permission())
        .register(token())
        .register(image())
        .register(quantization())
        .register(thumbnail())
        .register(category())
        .register(subcategory())
        .register(tag())
        .register(info())
        .register(task())
        .hooks("user", UserHooks)
        .hooks("token", TokenHooks)
        .hooks("image", ImageHooks)
        .hooks("quantization", FileHooks)
        .hooks("thumbnail", FileHooks)
        .hooks("tag", TagHooks)
}

fn settings() -> Entity {
    Entity::config("settings", "settings")
        .column(Col::integer("id").primary_key().default_value(0))
        .column(Col::blob("cipher").json())
        .column(Col::blob("token").json())
        .column(Col::blob("password").json().api())
        .column(Col::blob("image").json())
        .order_by(OrderBy::asc("id"))
        .default_row(json!({
            "id": 0,
            "cipher": null,
            "token": {
                "choices": TOKEN_ALPHABET,
                "length": 64,
                "duration": 604_800
            },
            "password": {
                "upper": true,
                "lower": true,
                "number": true,
                "special": true,
                "length": 8
            },
            "image": {
                "paused": false,
                "current": -1,
                "queue": [],
                "filters": [],
                "orientation": "landscape",
                "orientation_control": "manual",
                "orientation_auto_control_available": false,
                "size": [800, 480],
                "sizing": {"type": "fit", "fill": "blur"},
                "blur_brightness": 0.5,
                "thumbnail_sizes": [256, 128, 64],
                "extension": "png",
                "palette": {
                    "black": [0, 0, 0],
                    "white": [255, 255, 255],
                    "green": [0, 255, 0],
                    "blue": [0, 0, 255],
                    "red": [255, 0, 0],
                    "yellow": [255, 255, 0],
                    "orange": [255, 128, 0]
                }
            }
        }))
}

fn user() -> Entity {
    Entity::new("user", "users")
        .column(id())
        .column(Col::text("username").unique().not_null().api())
        .column(Col::text("given_name").default_value("").api())
        .column(Col::text("family_name").default_value("").api())
        .column(Col::text("password").not_null().password())
        .relationship(Rel::one_to_many("user_permission", "user_permissions", "id", "user_id"))
        .relationship(Rel::one_to_many("token", "tokens", "id", "user_id"))
        .order_by(OrderBy::asc("id"))
        .default_row(json!({
            "id": 1,
            "username": "admin",
            "given_name": "",
            "family_name": "",
            "password": "Ch@ng3_!+"
        }))
}

fn permission() -> Entity {
    Entity::new("permission", "permissions")
        .column(id())
        .column(Col::text("name").unique().not_null().api())
        .column(Col::text("description").default_value("").api())
        .order_by(OrderBy::asc("id"))
        .default_row(json!({"id": 0, "name": "API", "description": "Full API control."}))
        .default_row(json!({
            "id": 1,
            "name": "Admin",
            "description": "All \"Settings\" and \"Media\" permissions as well as allows user \
                            to add, edit, and delete users including resetting passwords."
        }))
        .default_row(json!({
            "id": 2,
            "name": "Settings",
            "description": "All \"Media\" permissions as well as allows user to change settings."
        }))
        .default_row(json!({
            "id": 3,
            "name": "Media",
            "description": "Allows user to select, upload, delete, and modify media/tags."
        }))
}

fn user_permission() -> Entity {
    Entity::new("user_permission", "user_permissions")
        .column(required_int("user_id"))
        .column(required_int("permission_id"))
        .relationship(Rel::one_to_one("permission", "permission", "permission_id", "id").reference())
        .order_by(OrderBy::asc("user_id"))
        .default_row(json!({"user_id": 0, "permission_id": 0}))
        .default_row(json!({"user_id": 1, "permission_id": 1}))
        .default_row(json!({"user_id": 1, "permission_id": 2}))
        .default_row(json!({"user_id": 1, "permission_id": 3}))
}

fn token() -> Entity {
    Entity::new("token", "tokens")
        .column(required_int("user_id"))
        .column(
            Col::text("token")
                .unique()
                .not_null()
                .api()
                .generated(Generator::UniqueToken(TokenArgs::Settings)),
        )
        .column(Col::numeric("expires").not_null().date().api())
        .order_by(OrderBy::asc("expires"))
}

fn image() -> Entity {
    Entity::new("image", "images")
        .column(id())
        .column(required_int("width"))
        .column(required_int("height"))
        .column(required_int("bytes"))
        .column(Col::text("path").unique().not_null())
        .column(Col::text("file").unique().not_null().api())
        .column(Col::text("url").unique().not_null().api())
        .column(Col::numeric("created").not_null().date().api())
        .column(Col::numeric("ingested").not_null().date().api())
        .column(Col::text("description").default_value("").api())
        .relationship(Rel::one_to_many("quantization", "quantizations", "id", "image_id"))
        .relationship(Rel::one_to_many("thumbnail", "thumbnails", "id", "image_id"))
        .relationship(Rel::one_to_many("tag", "tags", "id", "image_id"))
        .order_by(OrderBy::desc("created"))
}

fn quantization() -> Entity {
    Entity::new("quantization", "quantizations")
        .column(required_int("image_id"))
        .column(required_int("width"))
        .column(required_int("height"))
        .column(required_int("bytes"))
        .column(Col::text("path").unique().not_null())
        .column(Col::text("url").unique().not_null().api())
        .column(Col::text("orientation").not_null().api())
        .order_by(OrderBy::asc("image_id"))
}

fn thumbnail() -> Entity {
    Entity::new("thumbnail", "thumbnails")
        .column(required_int("image_id"))
        .column(required_int("width"))
        .column(required_int("height"))
        .column(required_int("bytes"))
        .column(Col::text("path").unique().not_null())
        .column(Col::text("url").unique().not_null().api())
        .order_by(OrderBy::asc("image_id"))
}

fn category() -> Entity {
    let mut entity = Entity::new("category", "categories")
        .column(id())
        .column(Col::text("name").unique().not_null().api())
        .relationship(Rel::one_to_many("subcategory", "subcategories", "id", "category_id"))
        .order_by(OrderBy::asc("name"));
    for (id, name) in ["People", "Nature", "Places", "Art"].into_iter().enumerate() {
        entity = entity.default_row(json!({"id": id, "name": name}));
    }
    entity
}

fn subcategory() -> Entity {
    const DEFAULTS: [(u32, &str); 14] = [
        (0, "Family"),
        (0, "Friend"),
        (0, "Coworker"),
        (1, "Mountains"),
        (1, "Ocean"),
        (1, "Lake"),
        (1, "Beach"),
        (1, "Forest"),
        (1, "Desert"),
        (2, "Home"),
        (2, "Work"),
        (3, "Personal"),
        (3, "Renaissance"),
        (3, "Modern"),
    ];

    let mut entity = Entity::new("subcategory", "subcategories")
        .column(id())
        .column(required_int("category_id"))
        .column(Col::text("name").unique().not_null().api())
        .order_by(OrderBy::asc("name"));
    for (id, (category_id, name)) in DEFAULTS.into_iter().enumerate() {
        entity = entity.default_row(json!({"id": id, "category_id": category_id, "name": name}));
    }
    entity
}

fn tag() -> Entity {
    Entity::new("tag", "tags")
        .column(required_int("image_id"))
        .column(required_int("category_id"))
        .column(required_int("subcategory_id"))
        .relationship(Rel::one_to_one("category", "category", "category_id", "id").reference())
        .relationship(
            Rel::one_to_one("subcategory", "subcategory", "subcategory_id", "id").reference(),
        )
        .order_by(OrderBy::asc("image_id"))
}

fn info() -> Entity {
    const REALS: [&str; 5] = [
        "temperature_celcius",
        "temperature_fahrenheit",
        "cpu_load_one_minute",
        "cpu_load_five_minute",
        "cpu_load_fifteen_minute",
    ];
    const INTEGERS: [&str; 10] = [
        "ram_used",
        "ram_total",
        "originals_count",
        "originals_size",
        "quantizations_count",
        "quantizations_size",
        "thumbnails_count",
        "thumbnails_size",
        "disk_used",
        "disk_total",
    ];

    let mut entity = Entity::new("info", "infos")
        .column(Col::numeric("collected").not_null().date().api())
        .order_by(OrderBy::desc("collected"));
    for key in REALS {
        entity = entity.column(Col::real(key).not_null().api());
    }
    for key in INTEGERS {
        entity = entity.column(required_int(key));
    }
    entity
}

fn task() -> Entity {
    const DEFAULTS: [(&str, &str, &str, &str, f64); 6] = [
        ("Rotate Images", "Displays next image in queue.", "POST", "/api/images/display", 1800.0),
        (
            "Ingest Local",
            "Ingests manually added files in \"local\" folder to DB.",
            "POST",
            "/api/maintenance/ingest",
            2700.0,
        ),
        ("Server Info", "Gets server statistics.", "POST", "/api/maintenance/info", 3600.0),
        ("Reap Tokens", "Removes expired tokens from DB.", "DELETE", "/api/maintenance/tokens", 14400.0),
        ("Rotate Logs", "Removes old entries from log files.", "DELETE", "/api/maintenance/logs", 86400.0),
        ("Clear Temp Files", "Removes old files from temp folder.", "DELETE", "/api/maintenance/temp", 86400.0),
    ];

    let mut entity = Entity::new("task", "tasks")
        .column(Col::text("name").unique().not_null().api())
        .column(Col::text("description").default_value("").api())
        .column(Col::text("method").not_null().api())
        .column(Col::text("endpoint").not_null().api())
        .column(Col::numeric("delay").not_null().api())
        .column(Col::numeric("last").not_null().date().api())
        .column(Col::text("status").default_value("").api())
        .order_by(OrderBy::asc("delay"));
    for (name, description, method, endpoint, delay) in DEFAULTS {
        entity = entity.default_row(json!({
            "name": name,
            "description": description,
            "method": method,
            "endpoint": endpoint,
            "delay": delay,
            "last": 0.0,
            "status": "not run"
        }));
    }
    entity
}
