use std::sync::{Arc, Mutex};

use docscope::args::{CallArgs, Invocation, Signature};
use docscope::proxy::{
    BaseObject, InterceptionProxy, Member, Method, OverrideFn, OverrideTable, Target, override_fn, replace_arg,
};
use docscope::{Result, ScopeError, Value};
use lazy_static::lazy_static;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FooMethod {
    F,
    Describe,
}

lazy_static! {
    static ref F_SIGNATURE: Signature = Signature::method("f").required("arg");
    static ref DESCRIBE_SIGNATURE: Signature = Signature::method("describe")
        .optional("prefix", "foo")
        .catch_all("kwargs");
}

impl Method for FooMethod {
    fn name(self) -> &'static str {
        match self {
            FooMethod::F => "f",
            FooMethod::Describe => "describe",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "f" => Some(FooMethod::F),
            "describe" => Some(FooMethod::Describe),
            _ => None,
        }
    }

    fn signature(self) -> &'static Signature {
        match self {
            FooMethod::F => &F_SIGNATURE,
            FooMethod::Describe => &DESCRIBE_SIGNATURE,
        }
    }
}

struct Foo {
    val: i64,
    prop: Value,
    shadow_f: bool,
}

impl Foo {
    fn new(val: i64, prop: &str) -> Self {
        Self {
            val,
            prop: json!(prop),
            shadow_f: false,
        }
    }
}

impl BaseObject for Foo {
    type Method = FooMethod;

    fn kind(&self) -> &'static str {
        "Foo"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "val" => Some(json!(self.val)),
            "prop" => Some(self.prop.clone()),
            "f" if self.shadow_f => Some(json!("not callable")),
            _ => None,
        }
    }

    fn call(&self, method: FooMethod, args: CallArgs) -> Result<Value> {
        match method {
            FooMethod::F => {
                let arg = args
                    .value("arg")
                    .as_i64()
                    .ok_or_else(|| ScopeError::InvalidArgument("arg must be an integer".into()))?;
                Ok(json!(self.val + arg))
            }
            FooMethod::Describe => Ok(Value::Object(args.into_document())),
        }
    }
}

fn dummy_wrap() -> OverrideFn<FooMethod> {
    override_fn(|target: &Target<'_, FooMethod>, _table: &OverrideTable<FooMethod>, mut args: CallArgs| {
        let arg = args.value("arg").as_i64().unwrap_or(0);
        args.set("arg", json!(arg + 400));
        target.call(args)
    })
}

fn proxy(table: OverrideTable<FooMethod>) -> InterceptionProxy<Foo> {
    InterceptionProxy::new(Foo::new(20, "harambe"), Arc::new(table))
}

#[test]
fn test_base_object_alone() {
    let foo = Foo::new(20, "harambe");
    assert_eq!(foo.invoke(FooMethod::F, Invocation::new().arg(12)).unwrap(), json!(32));
}

#[test]
fn test_method_override() {
    let proxy = proxy(OverrideTable::new().with_override(FooMethod::F, dummy_wrap()));

    assert_eq!(proxy.call("f", Invocation::new().arg(12)).unwrap(), json!(432));
    assert_eq!(proxy.call("f", Invocation::new().arg(12).escaped()).unwrap(), json!(32));
    assert_eq!(proxy.attribute("prop").unwrap(), json!("harambe"));
}

#[test]
fn test_global_hook_wraps_override() {
    let table = OverrideTable::new()
        .with_override(FooMethod::F, dummy_wrap())
        .with_global_hook(dummy_wrap());
    let proxy = proxy(table);

    assert_eq!(proxy.call("f", Invocation::new().arg(12)).unwrap(), json!(832));
    assert_eq!(proxy.call("f", Invocation::new().arg(12).escaped()).unwrap(), json!(32));
}

#[test]
fn test_disabled_global_hook() {
    let table = OverrideTable::new()
        .with_override(FooMethod::F, dummy_wrap())
        .with_global_hook(dummy_wrap());
    let proxy = proxy(table).without_global_hook();

    assert!(proxy.global_hook_disabled());
    assert_eq!(proxy.call("f", Invocation::new().arg(12)).unwrap(), json!(432));
}

#[test]
fn test_global_hook_without_override() {
    let proxy = proxy(OverrideTable::new().with_global_hook(dummy_wrap()));
    assert_eq!(proxy.invoke(FooMethod::F, Invocation::new().arg(12)).unwrap(), json!(432));
}

#[test]
fn test_members_without_override_pass_through() {
    let proxy = proxy(OverrideTable::new().with_override(FooMethod::F, dummy_wrap()));
    let direct = Foo::new(20, "harambe");

    let invocation = Invocation::new().arg("bar").kwarg("extra", 1);
    assert_eq!(
        proxy.invoke(FooMethod::Describe, invocation.clone()).unwrap(),
        direct.invoke(FooMethod::Describe, invocation).unwrap()
    );
    for name in ["val", "prop"] {
        assert_eq!(proxy.attribute(name).unwrap(), direct.attribute(name).unwrap());
    }
}

#[test]
fn test_escape_keyword_never_reaches_base() {
    let proxy = proxy(OverrideTable::new());
    let described = proxy
        .invoke(FooMethod::Describe, Invocation::new().kwarg("x", 1).escaped())
        .unwrap();
    assert_eq!(described, json!({"prefix": "foo", "x": 1}));
}

#[test]
fn test_missing_member() {
    let proxy = proxy(OverrideTable::new());

    match proxy.member("nope") {
        Err(ScopeError::AttributeNotFound { kind, name }) => {
            assert_eq!(kind, "Foo");
            assert_eq!(name, "nope");
        }
        _ => panic!("expected AttributeNotFound"),
    }
    assert!(matches!(proxy.attribute("f"), Err(ScopeError::AttributeNotFound { .. })));
}

#[test]
fn test_attribute_shadows_method() {
    let mut foo = Foo::new(20, "harambe");
    foo.shadow_f = true;
    let proxy = InterceptionProxy::new(
        foo,
        Arc::new(OverrideTable::new().with_override(FooMethod::F, dummy_wrap())),
    );

    let member = proxy.member("f").unwrap();
    assert!(!member.is_callable());
    assert_eq!(member.as_attribute(), Some(&json!("not callable")));
    assert!(member.call(Invocation::new().arg(1)).is_err());

    // the typed method is still reachable and still overridden
    assert_eq!(proxy.invoke(FooMethod::F, Invocation::new().arg(12)).unwrap(), json!(432));
}

#[test]
fn test_bound_method_member() {
    let proxy = proxy(OverrideTable::new().with_override(FooMethod::F, dummy_wrap()));
    let Member::Method(bound) = proxy.member("f").unwrap() else {
        panic!("f should resolve to a method");
    };
    assert_eq!(bound.name(), "f");
    assert_eq!(bound.call(Invocation::new().kwarg("arg", 1)).unwrap(), json!(421));
}

#[test]
fn test_arity_errors_surface_before_override() {
    let calls = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&calls);
    let counting = override_fn(move |target: &Target<'_, FooMethod>, _: &OverrideTable<FooMethod>, args: CallArgs| {
        *seen.lock().unwrap() += 1;
        target.call(args)
    });
    let proxy = proxy(OverrideTable::new().with_override(FooMethod::F, counting));

    assert!(matches!(
        proxy.call("f", Invocation::new().arg(1).arg(2)),
        Err(ScopeError::ArityMismatch { .. })
    ));
    assert!(matches!(
        proxy.call("f", Invocation::new()),
        Err(ScopeError::ArityMismatch { .. })
    ));
    assert!(matches!(
        proxy.call("f", Invocation::new().arg(1).kwarg("arg", 2)),
        Err(ScopeError::ArityMismatch { .. })
    ));
    assert!(matches!(
        proxy.call("f", Invocation::new().kwarg("other", 2)),
        Err(ScopeError::ArityMismatch { .. })
    ));
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn test_replace_arg_override() {
    let set_to_420 = replace_arg("arg", |name: &str, mut args: CallArgs| {
        args.set(name, json!(420));
        Ok(args)
    });
    let proxy = proxy(OverrideTable::new().with_override(FooMethod::F, set_to_420));
    assert_eq!(proxy.call("f", Invocation::new().arg(2)).unwrap(), json!(440));
}

#[test]
fn test_hook_receives_normalized_arguments() {
    let recorded: Arc<Mutex<Vec<CallArgs>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let hook = override_fn(move |target: &Target<'_, FooMethod>, _: &OverrideTable<FooMethod>, args: CallArgs| {
        sink.lock().unwrap().push(args.clone());
        target.call(args)
    });
    let proxy = proxy(OverrideTable::new().with_global_hook(hook));

    proxy.invoke(FooMethod::Describe, Invocation::new()).unwrap();
    proxy
        .invoke(FooMethod::Describe, Invocation::new().arg("bar").kwarg("x", 1))
        .unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded[0].as_document(), json!({"prefix": "foo"}).as_object().unwrap());
    assert_eq!(recorded[1].as_document(), json!({"prefix": "bar", "x": 1}).as_object().unwrap());
}

#[test]
fn test_table_is_shared_between_proxies() {
    let table = Arc::new(OverrideTable::new().with_override(FooMethod::F, dummy_wrap()));
    let first = InterceptionProxy::new(Foo::new(1, "a"), Arc::clone(&table));
    let second = InterceptionProxy::new(Foo::new(2, "b"), Arc::clone(&table));

    assert_eq!(first.call("f", Invocation::new().arg(0)).unwrap(), json!(401));
    assert_eq!(second.call("f", Invocation::new().arg(0)).unwrap(), json!(402));
    assert!(Arc::ptr_eq(first.table(), second.table()));
}
