use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::args::CallArgs;
use crate::core::{Result, Value};

use super::Method;

/// The callable an override wraps.
///
/// For a per-method override this is the raw member of the base object; for
/// the global hook it is the (possibly overridden) per-method callable.
pub struct Target<'a, M> {
    method: M,
    forward: &'a dyn Fn(CallArgs) -> Result<Value>,
}

impl<'a, M: Method> Target<'a, M> {
    pub fn new(method: M, forward: &'a dyn Fn(CallArgs) -> Result<Value>) -> Self {
        Self { method, forward }
    }

    pub fn method(&self) -> M {
        self.method
    }

    pub fn name(&self) -> &'static str {
        self.method.name()
    }

    pub fn call(&self, args: CallArgs) -> Result<Value> {
        (self.forward)(args)
    }
}

/// `(target, table, args) -> result`
pub type OverrideFn<M> =
    Arc<dyn Fn(&Target<'_, M>, &OverrideTable<M>, CallArgs) -> Result<Value> + Send + Sync>;

/// Wraps a closure as an [`OverrideFn`], pinning down its higher-ranked signature.
pub fn override_fn<M, F>(func: F) -> OverrideFn<M>
where
    M: Method,
    F: Fn(&Target<'_, M>, &OverrideTable<M>, CallArgs) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(func)
}

/// Override that rewrites one named argument before forwarding to the target.
pub fn replace_arg<M, R>(argname: &'static str, replacer: R) -> OverrideFn<M>
where
    M: Method,
    R: Fn(&str, CallArgs) -> Result<CallArgs> + Send + Sync + 'static,
{
    override_fn(move |target: &Target<'_, M>, _table: &OverrideTable<M>, args: CallArgs| {
        target.call(replacer(argname, args)?)
    })
}

/// Per-method overrides plus an optional global hook for one base interface.
///
/// Built once by a facade and shared read-only (behind an `Arc`) by every
/// proxy the facade spawns.
pub struct OverrideTable<M: Method> {
    methods: HashMap<M, OverrideFn<M>>,
    global_hook: Option<OverrideFn<M>>,
}

impl<M: Method> OverrideTable<M> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            global_hook: None,
        }
    }

    pub fn insert(&mut self, method: M, func: OverrideFn<M>) {
        self.methods.insert(method, func);
    }

    pub fn with_override(mut self, method: M, func: OverrideFn<M>) -> Self {
        self.insert(method, func);
        self
    }

    pub fn set_global_hook(&mut self, hook: OverrideFn<M>) {
        self.global_hook = Some(hook);
    }

    pub fn with_global_hook(mut self, hook: OverrideFn<M>) -> Self {
        self.set_global_hook(hook);
        self
    }

    pub fn get(&self, method: M) -> Option<&OverrideFn<M>> {
        self.methods.get(&method)
    }

    pub fn has_override(&self, method: M) -> bool {
        self.methods.contains_key(&method)
    }

    pub fn global_hook(&self) -> Option<&OverrideFn<M>> {
        self.global_hook.as_ref()
    }

    pub fn methods(&self) -> impl Iterator<Item = M> + '_ {
        self.methods.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.global_hook.is_none()
    }
}

impl<M: Method> Default for OverrideTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Method> fmt::Debug for OverrideTable<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&'static str> = self.methods.keys().map(|m| m.name()).collect();
        names.sort_unstable();
        f.debug_struct("OverrideTable")
            .field("methods", &names)
            .field("global_hook", &self.global_hook.is_some())
            .finish()
    }
}
