use std::sync::Arc;

use docscope::{
    CollectionFactory, DatabaseMember, DatabaseMethod, Invocation, MemoryClient, MemoryDatabase, RequiredFilter, Scope,
    ScopeError, ScopedDatabase, Value,
};
use serde_json::json;

fn database() -> (MemoryClient, ScopedDatabase<MemoryDatabase>) {
    let client = MemoryClient::new();
    let raw = client.database("local");
    raw_people(&client)
        .insert_documents(vec![
            json!({"name": "foobar", "id": "a"}),
            json!({"name": "foobar", "id": "b"}),
            json!({"name": "foobaz", "id": "a"}),
        ])
        .unwrap();

    let required = RequiredFilter::from_value(json!({"name": "foobar"})).unwrap();
    (client, ScopedDatabase::new(raw, Scope::new(required).without_retry()))
}

fn raw_people(client: &MemoryClient) -> docscope::MemoryCollection {
    client.database("local").collection("people").unwrap()
}

#[test]
fn test_indexed_access_is_scoped() {
    let (_client, db) = database();
    assert_eq!(db.collection("people").unwrap().count(Value::Null).unwrap(), 2);
}

#[test]
fn test_attribute_access_yields_scoped_collection() {
    let (_client, db) = database();

    let people = db.member("people").unwrap().into_collection().unwrap();
    assert_eq!(people.count(json!({"id": "a"})).unwrap(), 1);
    assert_eq!(people.name().unwrap(), "people");
}

#[test]
fn test_factory_methods_scope_their_result() {
    let (client, db) = database();

    assert_eq!(db.get_collection("people").unwrap().count(Value::Null).unwrap(), 2);

    let audit = db.create_collection("audit").unwrap();
    audit.insert_one(json!({"name": "foobar"})).unwrap();
    audit.insert_one(json!({"name": "nobody"})).unwrap();
    assert_eq!(audit.count(Value::Null).unwrap(), 1);
    assert_eq!(client.database("local").collection("audit").unwrap().len().unwrap(), 2);

    assert!(db.create_collection("audit").is_err());
}

#[test]
fn test_data_members_and_methods_pass_through() {
    let (_client, db) = database();

    match db.member("name").unwrap() {
        DatabaseMember::Attribute(value) => assert_eq!(value, json!("local")),
        _ => panic!("name is a data member"),
    }
    assert_eq!(db.attribute("name").unwrap(), json!("local"));

    let DatabaseMember::Method(names) = db.member("collection_names").unwrap() else {
        panic!("collection_names is a method");
    };
    assert_eq!(names.call(Invocation::new()).unwrap(), json!(["people"]));
}

#[test]
fn test_factories_by_name_return_scoped_collections() {
    let (client, db) = database();

    let create = db.member("create_collection").unwrap().into_factory().unwrap();
    assert_eq!(create.factory(), CollectionFactory::Create);
    let archive = create.call(Invocation::new().arg("archive")).unwrap();
    archive.insert_one(json!({"name": "foobar"})).unwrap();
    archive.insert_one(json!({"name": "nobody"})).unwrap();
    assert_eq!(archive.count(Value::Null).unwrap(), 1);
    assert_eq!(client.database("local").collection("archive").unwrap().len().unwrap(), 2);

    let get = db.member("get_collection").unwrap().into_factory().unwrap();
    let people = get.call(Invocation::new().kwarg("name", "people")).unwrap();
    assert_eq!(people.count(Value::Null).unwrap(), 2);
}

#[test]
fn test_factory_call_errors() {
    let (_client, db) = database();
    let create = db.member("create_collection").unwrap().into_factory().unwrap();

    assert!(matches!(
        create.call(Invocation::new()),
        Err(ScopeError::ArityMismatch { .. })
    ));
    assert!(matches!(
        create.call(Invocation::new().arg("x").kwarg("codec_options", 1)),
        Err(ScopeError::ArityMismatch { .. })
    ));
    assert!(matches!(
        create.call(Invocation::new().arg("x").escaped()),
        Err(ScopeError::InvalidArgument(_))
    ));
    assert!(create.call(Invocation::new().arg("people")).is_err());
}

#[test]
fn test_private_names_are_missing() {
    let (_client, db) = database();
    match db.member("_secret") {
        Err(ScopeError::AttributeNotFound { name, .. }) => assert_eq!(name, "_secret"),
        _ => panic!("expected AttributeNotFound"),
    }
}

#[test]
fn test_collection_names_and_drop() {
    let (_client, db) = database();
    db.collection("system.indexes").unwrap();
    db.collection("audit").unwrap();

    assert_eq!(db.collection_names().unwrap(), vec!["audit", "people", "system.indexes"]);
    let user = db
        .invoke(
            DatabaseMethod::CollectionNames,
            Invocation::new().kwarg("include_system_collections", false),
        )
        .unwrap();
    assert_eq!(user, json!(["audit", "people"]));

    db.drop_collection("audit").unwrap();
    assert_eq!(db.collection_names().unwrap(), vec!["people", "system.indexes"]);
}

#[test]
fn test_collections_share_one_override_table() {
    let (_client, db) = database();
    let first = db.collection("people").unwrap();
    let second = db.member("people").unwrap().into_collection().unwrap();

    assert!(Arc::ptr_eq(first.proxy().table(), second.proxy().table()));
}
