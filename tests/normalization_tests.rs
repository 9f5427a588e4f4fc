use docscope::{CollectionMethod, Invocation, Method, ScopeError, Signature};
use serde_json::{Value, json};

fn four_args() -> Signature {
    Signature::new("f")
        .required("a")
        .required("b")
        .optional("c", 3)
        .optional("d", 4)
}

#[test]
fn test_all_positional() {
    let args = four_args()
        .normalize(Invocation::from_args(vec![json!(1), json!(2), json!(3), json!(4)]))
        .unwrap();
    assert_eq!(Value::Object(args.into_document()), json!({"a": 1, "b": 2, "c": 3, "d": 4}));
}

#[test]
fn test_defaults_complete_the_mapping() {
    let args = four_args().normalize(Invocation::new().arg(1).arg(2)).unwrap();
    assert_eq!(Value::Object(args.into_document()), json!({"a": 1, "b": 2, "c": 3, "d": 4}));
}

#[test]
fn test_keywords_only() {
    let args = four_args()
        .normalize(Invocation::new().kwarg("d", 4).kwarg("b", 2).kwarg("a", 1).kwarg("c", 3))
        .unwrap();
    assert_eq!(Value::Object(args.into_document()), json!({"a": 1, "b": 2, "c": 3, "d": 4}));
}

#[test]
fn test_mixed_positional_and_keywords() {
    let args = four_args()
        .normalize(Invocation::new().arg(1).kwarg("d", 40).kwarg("b", 2))
        .unwrap();
    assert_eq!(Value::Object(args.into_document()), json!({"a": 1, "b": 2, "c": 3, "d": 40}));
}

#[test]
fn test_unbindable_calls_fail() {
    let cases = [
        Invocation::new(),
        Invocation::new().arg(1),
        Invocation::from_args(vec![json!(1), json!(2), json!(3), json!(4), json!(5)]),
        Invocation::new().arg(1).arg(2).kwarg("a", 1),
        Invocation::new().arg(1).arg(2).kwarg("e", 5),
    ];
    for invocation in cases {
        assert!(matches!(
            four_args().normalize(invocation),
            Err(ScopeError::ArityMismatch { .. })
        ));
    }
}

#[test]
fn test_collection_method_signatures() {
    let args = CollectionMethod::FindOneAndUpdate
        .signature()
        .normalize(
            Invocation::new()
                .arg(json!({"id": 1}))
                .arg(json!({"$set": {"x": 1}}))
                .kwarg("upsert", true)
                .kwarg("max_time_ms", 50),
        )
        .unwrap();

    assert_eq!(args.value("filter"), &json!({"id": 1}));
    assert_eq!(args.value("upsert"), &json!(true));
    assert_eq!(args.value("return_document"), &json!(false));
    // extra keywords are flattened next to the declared parameters
    assert_eq!(args.value("max_time_ms"), &json!(50));
    assert!(!args.contains("kwargs"));
    assert!(!args.contains("self"));

    let remove = CollectionMethod::Remove.signature().normalize(Invocation::new()).unwrap();
    assert_eq!(Value::Object(remove.into_document()), json!({"spec_or_id": null, "multi": true}));
}

#[test]
fn test_receiver_cannot_be_passed_by_keyword() {
    let result = CollectionMethod::Count
        .signature()
        .normalize(Invocation::new().kwarg("self", 1));
    assert!(matches!(result, Err(ScopeError::ArityMismatch { .. })));
}
