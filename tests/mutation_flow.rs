use std::collections::VecDeque;

use backoffice_core::{
    App, ColumnSpec, EditMode, Effect, Event, Model, ResourceConfig,
};
use crux_core::testing::AppTester;
use crux_http::protocol::{HttpResponse, HttpResult};
use serde_json::{json, Value};

fn users_config() -> ResourceConfig {
    ResourceConfig::new(
        "Users",
        "https://api.example.com",
        vec!["admin/users".to_string()],
    )
    .unwrap()
    .with_columns(vec![
        ColumnSpec::new("name", "Name"),
        ColumnSpec::new("status", "Status"),
    ])
    .with_editable_fields(vec!["name".to_string(), "email".to_string()])
    .with_required_fields(vec!["name".to_string()])
    .unwrap()
}

fn feed_events(app: &AppTester<App, Effect>, model: &mut Model, events: Vec<Event>) -> Vec<Effect> {
    let mut effects = Vec::new();
    let mut queue: VecDeque<Event> = events.into();
    while let Some(event) = queue.pop_front() {
        let update = app.update(event, model);
        effects.extend(update.effects);
        queue.extend(update.events);
    }
    effects
}

fn mount_with(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    config: ResourceConfig,
    payload: &Value,
) {
    let update = app.update(Event::PageMounted(Box::new(config)), model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("mounting should issue a bulk fetch");

    let response = HttpResponse::ok().json(payload).build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("fetch should resolve");
    feed_events(app, model, update.events);
}

fn one_user() -> Value {
    json!([{"id": "u-1", "name": "Alice", "email": "alice@example.com", "status": "pending"}])
}

#[test]
fn test_create_inserts_server_record_at_front() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    app.update(Event::CreateOpened, &mut model);
    app.update(
        Event::FieldEdited {
            key: "name".to_string(),
            value: json!("Bob"),
        },
        &mut model,
    );
    let update = app.update(Event::SaveRequested, &mut model);
    assert!(model.sync.action_loading);
    assert!(model.session.is_saving());

    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("saving a new record should POST");
    assert_eq!(request.operation.method, "POST");
    assert_eq!(request.operation.url, "https://api.example.com/admin/users");

    let response = HttpResponse::ok()
        .json(&json!({"data": {"id": "u-9", "name": "Bob", "createdAt": "2024-03-01"}}))
        .build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("create should resolve");
    feed_events(&app, &mut model, update.events);

    assert_eq!(model.store.len(), 2);
    // newly created records surface first
    assert_eq!(model.store.records()[0].id().as_str(), "u-9");
    assert_eq!(
        model.store.records()[0].get("createdAt"),
        Some(&json!("2024-03-01"))
    );
    assert_eq!(model.session.mode(), EditMode::Closed);
    assert!(!model.sync.action_loading);
}

#[test]
fn test_create_synthesizes_missing_id() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &json!([]));

    app.update(Event::CreateOpened, &mut model);
    app.update(
        Event::FieldEdited {
            key: "name".to_string(),
            value: json!("Bob"),
        },
        &mut model,
    );
    let update = app.update(Event::SaveRequested, &mut model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("saving a new record should POST");

    // server acknowledges without returning a record
    let response = HttpResponse::ok().json(&json!({"message": "created"})).build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("create should resolve");
    feed_events(&app, &mut model, update.events);

    assert_eq!(model.store.len(), 1);
    let created = &model.store.records()[0];
    assert!(!created.id().as_str().is_empty());
    assert!(created.has_server_id());
    assert_eq!(created.get("name"), Some(&json!("Bob")));
}

#[test]
fn test_update_merges_server_over_submitted() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    app.update(
        Event::EditOpened {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    app.update(
        Event::FieldEdited {
            key: "name".to_string(),
            value: json!("Alicia"),
        },
        &mut model,
    );
    let update = app.update(Event::SaveRequested, &mut model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("saving an edit should PUT");
    assert_eq!(request.operation.method, "PUT");
    assert_eq!(
        request.operation.url,
        "https://api.example.com/admin/users/u-1"
    );

    let response = HttpResponse::ok()
        .json(&json!({"data": {"name": "Alicia Smith", "updatedAt": "2024-03-02"}}))
        .build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("update should resolve");
    feed_events(&app, &mut model, update.events);

    let record = model.store.get("u-1").unwrap();
    // server response wins over the submitted value
    assert_eq!(record.get("name"), Some(&json!("Alicia Smith")));
    assert_eq!(record.get("updatedAt"), Some(&json!("2024-03-02")));
    // fields untouched by the mutation survive
    assert_eq!(record.get("status"), Some(&json!("pending")));
    assert_eq!(model.session.mode(), EditMode::Closed);
}

#[test]
fn test_save_failure_keeps_modal_open() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    app.update(
        Event::EditOpened {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    let update = app.update(Event::SaveRequested, &mut model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("saving an edit should PUT");

    let response = HttpResponse::status(422)
        .json(&json!({"errors": ["name already taken"]}))
        .build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("update should resolve");
    feed_events(&app, &mut model, update.events);

    assert_eq!(model.session.mode(), EditMode::Edit);
    assert!(!model.session.is_saving());
    assert!(model.session.validation_error().is_some());
    assert!(model.sync.action_error.is_some());
    // the record is untouched
    assert_eq!(
        model.store.get("u-1").unwrap().get("name"),
        Some(&json!("Alice"))
    );
}

#[test]
fn test_failed_delete_leaves_store_untouched() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    let update = app.update(
        Event::DeleteRequested {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("deleting should DELETE");
    assert_eq!(request.operation.method, "DELETE");

    let response = HttpResponse::status(500)
        .json(&json!({"message": "boom"}))
        .build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("delete should resolve");
    feed_events(&app, &mut model, update.events);

    assert_eq!(model.store.len(), 1);
    assert!(model.sync.action_error.is_some());
    assert!(!model.sync.action_loading);
}

#[test]
fn test_confirmed_delete_removes_record() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    let update = app.update(
        Event::DeleteRequested {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    // removal is not optimistic: the record stays until the server confirms
    assert_eq!(model.store.len(), 1);

    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("deleting should DELETE");
    let update = app
        .resolve(&mut request, HttpResult::Ok(HttpResponse::ok().build()))
        .expect("delete should resolve");
    feed_events(&app, &mut model, update.events);

    assert!(model.store.is_empty());
    assert!(model.sync.action_error.is_none());
}

#[test]
fn test_validation_blocks_submit() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    app.update(
        Event::EditOpened {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    app.update(
        Event::FieldEdited {
            key: "name".to_string(),
            value: json!(""),
        },
        &mut model,
    );
    let update = app.update(Event::SaveRequested, &mut model);

    let issued_request = update
        .effects
        .iter()
        .any(|effect| matches!(effect, Effect::Http(_)));
    assert!(!issued_request, "validation failure must not reach the network");
    assert_eq!(model.session.mode(), EditMode::Edit);
    assert!(model.session.validation_error().is_some());
    assert!(!model.sync.action_loading);
}

#[test]
fn test_mutation_requires_server_identifier() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    // the payload record has no identifier field at all
    mount_with(&app, &mut model, users_config(), &json!([{"name": "Ghost"}]));
    assert_eq!(model.store.records()[0].id().as_str(), "row-0");

    let update = app.update(
        Event::DeleteRequested {
            id: "row-0".to_string(),
        },
        &mut model,
    );

    let issued_request = update
        .effects
        .iter()
        .any(|effect| matches!(effect, Effect::Http(_)));
    assert!(!issued_request, "placeholder ids must never reach the network");
    assert_eq!(model.store.len(), 1);
    assert!(model.sync.action_error.is_some());
}

#[test]
fn test_overlapping_mutations_are_ignored() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    app.update(
        Event::EditOpened {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    let update = app.update(Event::SaveRequested, &mut model);
    assert!(update
        .effects
        .iter()
        .any(|effect| matches!(effect, Effect::Http(_))));
    assert!(model.sync.action_loading);

    // a second save and a delete while the first save is in flight
    let update = app.update(Event::SaveRequested, &mut model);
    assert!(!update
        .effects
        .iter()
        .any(|effect| matches!(effect, Effect::Http(_))));

    let update = app.update(
        Event::DeleteRequested {
            id: "u-1".to_string(),
        },
        &mut model,
    );
    assert!(!update
        .effects
        .iter()
        .any(|effect| matches!(effect, Effect::Http(_))));
}

#[test]
fn test_status_change_merges_response() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    mount_with(&app, &mut model, users_config(), &one_user());

    let update = app.update(
        Event::StatusChangeRequested {
            id: "u-1".to_string(),
            status: json!("approved"),
        },
        &mut model,
    );
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("status change should PUT");
    assert_eq!(request.operation.method, "PUT");
    assert_eq!(
        request.operation.url,
        "https://api.example.com/admin/users/u-1"
    );

    let response = HttpResponse::ok()
        .json(&json!({"message": {"status": "approved", "approvedAt": "2024-03-03"}}))
        .build();
    let update = app
        .resolve(&mut request, HttpResult::Ok(response))
        .expect("status change should resolve");
    feed_events(&app, &mut model, update.events);

    let record = model.store.get("u-1").unwrap();
    assert_eq!(record.get("status"), Some(&json!("approved")));
    assert_eq!(record.get("approvedAt"), Some(&json!("2024-03-03")));
    assert_eq!(record.get("name"), Some(&json!("Alice")));
}

#[test]
fn test_mutation_falls_back_through_route_candidates() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    let config = ResourceConfig::new(
        "Users",
        "https://api.example.com",
        vec!["admin/users".to_string(), "users".to_string()],
    )
    .unwrap();
    mount_with(&app, &mut model, config, &one_user());

    let update = app.update(
        Event::StatusChangeRequested {
            id: "u-1".to_string(),
            status: json!("approved"),
        },
        &mut model,
    );
    let mut first = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("status change should PUT");
    assert_eq!(
        first.operation.url,
        "https://api.example.com/admin/users/u-1"
    );

    let update = app
        .resolve(&mut first, HttpResult::Ok(HttpResponse::status(404).build()))
        .expect("status change should resolve");
    let effects = feed_events(&app, &mut model, update.events);

    let mut second = effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("failure on the first route should try the next one");
    assert_eq!(second.operation.url, "https://api.example.com/users/u-1");

    let response = HttpResponse::ok()
        .json(&json!({"data": {"status": "approved"}}))
        .build();
    let update = app
        .resolve(&mut second, HttpResult::Ok(response))
        .expect("status change should resolve");
    feed_events(&app, &mut model, update.events);

    assert!(model.sync.action_error.is_none());
    assert_eq!(
        model.store.get("u-1").unwrap().get("status"),
        Some(&json!("approved"))
    );
    assert_eq!(model.resolved_route, Some(1));
}
