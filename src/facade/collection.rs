use std::sync::Arc;
use std::vec;

use crate::args::Invocation;
use crate::backend::{BulkMethod, CollectionBackend, CollectionMethod};
use crate::core::{Document, Result, ScopeError, Value};
use crate::policy::{FilterMergePolicy, RequiredFilter, RetryPolicy};
use crate::proxy::{BoundMethod, Dispatch, InterceptionProxy, Member, Method, OverrideTable, Resolved};

use super::{Scope, ScopedBulkOperation};

/// Query methods whose filter is merged by hand instead of through the
/// override table.
const HAND_WRITTEN: &[CollectionMethod] = &[CollectionMethod::Find, CollectionMethod::FindOne];

/// Methods returning a bulk builder, reachable only through their typed form.
const BULK_BUILDERS: &[&str] = &["initialize_ordered_bulk_op", "initialize_unordered_bulk_op"];

/// A collection whose every query and write is restricted to the documents
/// matching the scope's required filter.
///
/// ```
/// use docscope::{MemoryClient, RequiredFilter, Scope, ScopedCollection};
/// use serde_json::{Value, json};
///
/// let raw = MemoryClient::new().database("local").collection("people").unwrap();
/// raw.insert_documents(vec![
///     json!({"name": "foobar", "val": 1}),
///     json!({"name": "foobaz", "val": 2}),
/// ]).unwrap();
///
/// let required = RequiredFilter::from_value(json!({"name": "foobar"})).unwrap();
/// let scoped = ScopedCollection::new(raw, Scope::new(required));
/// assert_eq!(scoped.count(Value::Null).unwrap(), 1);
/// ```
pub struct ScopedCollection<C: CollectionBackend> {
    proxy: InterceptionProxy<C>,
    scope: Scope,
    policy: FilterMergePolicy,
    bulk_table: Arc<OverrideTable<BulkMethod>>,
}

impl<C: CollectionBackend> ScopedCollection<C> {
    pub fn new(base: C, scope: Scope) -> Self {
        let table = Arc::new(Self::build_table(&scope));
        Self::with_table(base, scope, table)
    }

    /// Builds a facade around a table prepared once by the parent facade.
    pub(crate) fn with_table(
        base: C,
        scope: Scope,
        table: Arc<OverrideTable<CollectionMethod>>,
    ) -> Self {
        let policy = FilterMergePolicy::new(scope.required_filter().clone());
        let bulk_table = Arc::new(ScopedBulkOperation::<C::Bulk>::build_table(&scope));
        Self {
            proxy: InterceptionProxy::new(base, table),
            scope,
            policy,
            bulk_table,
        }
    }

    /// Filter-merge overrides for every scoped operation, plus the retry hook.
    pub fn build_table(scope: &Scope) -> OverrideTable<CollectionMethod> {
        let policy = FilterMergePolicy::new(scope.required_filter().clone());
        let mut table = OverrideTable::new();

        for &method in CollectionMethod::ALL {
            if HAND_WRITTEN.contains(&method) {
                continue;
            }
            if let Some(argument) = method.scoped_argument() {
                table.insert(method, policy.override_for(argument));
            }
        }

        if let Some(retry) = scope.retry() {
            table.set_global_hook(retry.hook());
        }
        table
    }

    pub fn base(&self) -> &C {
        self.proxy.base()
    }

    pub fn proxy(&self) -> &InterceptionProxy<C> {
        &self.proxy
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn required_filter(&self) -> &RequiredFilter {
        self.policy.required()
    }

    /// Data member of the wrapped collection, unchanged.
    pub fn attribute(&self, name: &str) -> Result<Value> {
        self.proxy.attribute(name)
    }

    pub fn name(&self) -> Result<String> {
        match self.attribute("name")? {
            Value::String(name) => Ok(name),
            other => Err(ScopeError::InvalidArgument(format!("collection name is not a string: {}", other))),
        }
    }

    pub fn member(&self, name: &str) -> Result<Member<'_, CollectionMethod>> {
        if BULK_BUILDERS.contains(&name) && self.base().attribute(name).is_none() {
            return Err(ScopeError::InvalidArgument(format!(
                "'{}' returns a bulk builder, call ScopedCollection::{} instead",
                name, name
            )));
        }
        Ok(match self.base().resolve(name)? {
            Resolved::Attribute(value) => Member::Attribute(value),
            Resolved::Method(method) => Member::Method(BoundMethod::new(method, self)),
        })
    }

    /// Looks a method up by name and calls it.
    pub fn call(&self, name: &str, invocation: Invocation) -> Result<Value> {
        self.member(name)?.call(invocation)
    }

    pub fn invoke(&self, method: CollectionMethod, invocation: Invocation) -> Result<Value> {
        if HAND_WRITTEN.contains(&method) {
            return self.dispatch_query(method, invocation);
        }
        self.proxy.invoke(method, invocation)
    }

    /// `find`/`find_one`: `(filter=None, projection=None, **options)` bound by
    /// hand, with the filter merged directly.
    fn dispatch_query(&self, method: CollectionMethod, mut invocation: Invocation) -> Result<Value> {
        let escaped = invocation.take_escape();
        let (positional, mut options) = invocation.into_parts();
        let mut positional = positional.into_iter();

        let filter = take_param(method.name(), &mut positional, &mut options, "filter")?;
        let projection = take_param(method.name(), &mut positional, &mut options, "projection")?;
        if positional.next().is_some() {
            return Err(ScopeError::arity(
                method.name(),
                "takes at most 2 positional arguments",
            ));
        }

        self.query(
            method,
            filter.unwrap_or(Value::Null),
            projection.unwrap_or(Value::Null),
            options,
            escaped,
        )
    }

    fn query(
        &self,
        method: CollectionMethod,
        filter: Value,
        projection: Value,
        options: Document,
        escaped: bool,
    ) -> Result<Value> {
        let build = |filter: Value| {
            Invocation::from_keywords(options.clone())
                .kwarg("filter", filter)
                .kwarg("projection", projection.clone())
        };

        if escaped {
            return self.base().invoke(method, build(filter));
        }

        let filter = self.policy.required().merge(filter);
        let forward = || self.base().invoke(method, build(filter.clone()));

        match self.active_retry() {
            Some(retry) => retry.run(method.name(), forward),
            None => forward(),
        }
    }

    fn active_retry(&self) -> Option<&RetryPolicy> {
        if self.proxy.global_hook_disabled() {
            return None;
        }
        self.scope.retry()
    }

    pub fn count(&self, filter: Value) -> Result<u64> {
        let reply = self.invoke(CollectionMethod::Count, Invocation::new().arg(filter))?;
        reply
            .as_u64()
            .ok_or_else(|| unexpected_reply(CollectionMethod::Count, &reply))
    }

    pub fn find(&self, filter: Value, projection: Value) -> Result<Vec<Value>> {
        let reply = self.query(CollectionMethod::Find, filter, projection, Document::new(), false)?;
        into_documents(CollectionMethod::Find, reply)
    }

    pub fn find_one(&self, filter: Value, projection: Value) -> Result<Option<Value>> {
        let reply = self.query(CollectionMethod::FindOne, filter, projection, Document::new(), false)?;
        Ok(match reply {
            Value::Null => None,
            document => Some(document),
        })
    }

    pub fn insert_one(&self, document: Value) -> Result<Value> {
        self.invoke(CollectionMethod::InsertOne, Invocation::new().arg(document))
    }

    pub fn insert_many(&self, documents: Vec<Value>) -> Result<Value> {
        self.invoke(
            CollectionMethod::InsertMany,
            Invocation::new().arg(Value::Array(documents)),
        )
    }

    pub fn replace_one(&self, filter: Value, replacement: Value) -> Result<Value> {
        self.invoke(
            CollectionMethod::ReplaceOne,
            Invocation::new().arg(filter).arg(replacement),
        )
    }

    pub fn update_one(&self, filter: Value, update: Value) -> Result<Value> {
        self.invoke(
            CollectionMethod::UpdateOne,
            Invocation::new().arg(filter).arg(update),
        )
    }

    pub fn update_many(&self, filter: Value, update: Value) -> Result<Value> {
        self.invoke(
            CollectionMethod::UpdateMany,
            Invocation::new().arg(filter).arg(update),
        )
    }

    pub fn delete_one(&self, filter: Value) -> Result<Value> {
        self.invoke(CollectionMethod::DeleteOne, Invocation::new().arg(filter))
    }

    pub fn delete_many(&self, filter: Value) -> Result<Value> {
        self.invoke(CollectionMethod::DeleteMany, Invocation::new().arg(filter))
    }

    pub fn distinct(&self, key: &str, filter: Value) -> Result<Vec<Value>> {
        let reply = self.invoke(
            CollectionMethod::Distinct,
            Invocation::new().arg(key).arg(filter),
        )?;
        into_documents(CollectionMethod::Distinct, reply)
    }

    pub fn aggregate(&self, pipeline: Vec<Value>) -> Result<Vec<Value>> {
        let reply = self.invoke(
            CollectionMethod::Aggregate,
            Invocation::new().arg(Value::Array(pipeline)),
        )?;
        into_documents(CollectionMethod::Aggregate, reply)
    }

    pub fn initialize_ordered_bulk_op(&self) -> Result<ScopedBulkOperation<C::Bulk>> {
        let bulk = self.base().initialize_ordered_bulk_op(false)?;
        Ok(ScopedBulkOperation::with_table(bulk, self.scope.clone(), self.bulk_table.clone()))
    }

    pub fn initialize_unordered_bulk_op(&self) -> Result<ScopedBulkOperation<C::Bulk>> {
        let bulk = self.base().initialize_unordered_bulk_op(false)?;
        Ok(ScopedBulkOperation::with_table(bulk, self.scope.clone(), self.bulk_table.clone()))
    }
}

impl<C: CollectionBackend> Dispatch<CollectionMethod> for ScopedCollection<C> {
    fn dispatch(&self, method: CollectionMethod, invocation: Invocation) -> Result<Value> {
        self.invoke(method, invocation)
    }
}

/// Pulls one parameter from either the positional or the keyword side.
pub(super) fn take_param(
    method: &str,
    positional: &mut vec::IntoIter<Value>,
    keywords: &mut Document,
    name: &str,
) -> Result<Option<Value>> {
    match (positional.next(), keywords.remove(name)) {
        (Some(_), Some(_)) => Err(ScopeError::arity(
            method,
            format!("got multiple values for argument '{}'", name),
        )),
        (Some(value), None) | (None, Some(value)) => Ok(Some(value)),
        (None, None) => Ok(None),
    }
}

fn into_documents(method: CollectionMethod, reply: Value) -> Result<Vec<Value>> {
    match reply {
        Value::Array(items) => Ok(items),
        other => Err(unexpected_reply(method, &other)),
    }
}

fn unexpected_reply(method: CollectionMethod, reply: &Value) -> ScopeError {
    ScopeError::InvalidArgument(format!(
        "unexpected reply from '{}': {}",
        method.as_str(),
        reply
    ))
}
