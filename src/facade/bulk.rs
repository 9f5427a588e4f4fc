use std::sync::Arc;

use crate::args::Invocation;
use crate::backend::{BulkBackend, BulkMethod, SelectorMethod};
use crate::core::{Result, ScopeError, Value};
use crate::policy::RequiredFilter;
use crate::proxy::{BaseObject, InterceptionProxy, Member, OverrideTable};

use super::Scope;
use super::collection::take_param;

/// Bulk-operation builder handed out by a [`super::ScopedCollection`].
///
/// Only `find` is scoped: the selector it receives is merged with the
/// required filter, and the sub-builder it returns carries the scope on.
/// The retry hook is registered but disabled unless the scope opts in,
/// since replaying a partially applied bulk write is not safe.
pub struct ScopedBulkOperation<K: BulkBackend> {
    proxy: InterceptionProxy<K>,
    scope: Scope,
}

impl<K: BulkBackend> ScopedBulkOperation<K> {
    pub fn new(base: K, scope: Scope) -> Self {
        let table = Arc::new(Self::build_table(&scope));
        Self::with_table(base, scope, table)
    }

    pub(crate) fn with_table(base: K, scope: Scope, table: Arc<OverrideTable<BulkMethod>>) -> Self {
        let mut proxy = InterceptionProxy::new(base, table);
        proxy.set_global_hook_disabled(!scope.retries_bulk_operations());
        Self { proxy, scope }
    }

    pub fn build_table(scope: &Scope) -> OverrideTable<BulkMethod> {
        let mut table = OverrideTable::new();
        if let Some(retry) = scope.retry() {
            table.set_global_hook(retry.hook());
        }
        table
    }

    pub fn base(&self) -> &K {
        self.proxy.base()
    }

    pub fn proxy(&self) -> &InterceptionProxy<K> {
        &self.proxy
    }

    pub fn required_filter(&self) -> &RequiredFilter {
        self.scope.required_filter()
    }

    pub fn attribute(&self, name: &str) -> Result<Value> {
        self.proxy.attribute(name)
    }

    pub fn member(&self, name: &str) -> Result<Member<'_, BulkMethod>> {
        self.proxy.member(name)
    }

    pub fn invoke(&self, method: BulkMethod, invocation: Invocation) -> Result<Value> {
        self.proxy.invoke(method, invocation)
    }

    /// Queue an insert
    pub fn insert(&self, document: Value) -> Result<Value> {
        self.invoke(BulkMethod::Insert, Invocation::new().arg(document))
    }

    /// Apply every queued operation
    pub fn execute(&self) -> Result<Value> {
        self.invoke(BulkMethod::Execute, Invocation::new())
    }

    pub fn find(&self, selector: Value) -> Result<ScopedBulkSelector<K::Selector>> {
        self.find_with(Invocation::new().arg(selector))
    }

    /// `find(selector, **options)` with the selector bound by hand.
    pub fn find_with(&self, mut invocation: Invocation) -> Result<ScopedBulkSelector<K::Selector>> {
        let escaped = invocation.take_escape();
        let (positional, mut keywords) = invocation.into_parts();
        let mut positional = positional.into_iter();

        let selector = take_param("find", &mut positional, &mut keywords, "selector")?
            .ok_or_else(|| ScopeError::arity("find", "missing required argument(s): 'selector'"))?;
        if positional.next().is_some() || !keywords.is_empty() {
            return Err(ScopeError::arity("find", "takes exactly one argument 'selector'"));
        }

        let selector = if escaped {
            selector
        } else {
            self.scope.required_filter().merge(selector)
        };

        let sub_builder = self.base().find(selector)?;
        Ok(ScopedBulkSelector::new(sub_builder, self.scope.clone()))
    }
}

/// Selector-scoped bulk sub-builder; its selector is already merged, so
/// calls pass straight through.
pub struct ScopedBulkSelector<S: BaseObject<Method = SelectorMethod>> {
    proxy: InterceptionProxy<S>,
    scope: Scope,
}

impl<S: BaseObject<Method = SelectorMethod>> ScopedBulkSelector<S> {
    pub fn new(base: S, scope: Scope) -> Self {
        Self {
            proxy: InterceptionProxy::passthrough(base).without_global_hook(),
            scope,
        }
    }

    pub fn base(&self) -> &S {
        self.proxy.base()
    }

    pub fn required_filter(&self) -> &RequiredFilter {
        self.scope.required_filter()
    }

    pub fn attribute(&self, name: &str) -> Result<Value> {
        self.proxy.attribute(name)
    }

    pub fn invoke(&self, method: SelectorMethod, invocation: Invocation) -> Result<Value> {
        self.proxy.invoke(method, invocation)
    }

    pub fn update(&self, update: Value) -> Result<Value> {
        self.invoke(SelectorMethod::Update, Invocation::new().arg(update))
    }

    pub fn update_one(&self, update: Value) -> Result<Value> {
        self.invoke(SelectorMethod::UpdateOne, Invocation::new().arg(update))
    }

    pub fn replace_one(&self, replacement: Value) -> Result<Value> {
        self.invoke(SelectorMethod::ReplaceOne, Invocation::new().arg(replacement))
    }

    pub fn remove(&self) -> Result<Value> {
        self.invoke(SelectorMethod::Remove, Invocation::new())
    }

    pub fn remove_one(&self) -> Result<Value> {
        self.invoke(SelectorMethod::RemoveOne, Invocation::new())
    }
}
