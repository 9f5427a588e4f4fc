//! Interception proxy
//!
//! Wraps a base object and routes every member access through three layers:
//!
//! 1. data members pass straight through;
//! 2. methods with a registered override run through it;
//! 3. a global hook, when registered and not disabled, wraps the result of 2.
//!
//! The reserved escape keyword (see [`crate::args::ESCAPE_KEYWORD`]) skips
//! layers 2 and 3 for a single call.

mod table;

pub use table::{OverrideFn, OverrideTable, Target, override_fn, replace_arg};

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::args::{CallArgs, Invocation, Signature};
use crate::core::{Result, ScopeError, Value};

/// Identifier of one callable member of a base interface.
pub trait Method: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self>;

    /// Declared parameter list, used to normalize every invocation.
    fn signature(self) -> &'static Signature;
}

/// An object an [`InterceptionProxy`] can wrap.
pub trait BaseObject {
    type Method: Method;

    /// Runtime type name, used in logs and `AttributeNotFound` errors.
    fn kind(&self) -> &'static str;

    /// Data member lookup. Returns `None` for methods and unknown names.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Runs `method` with already-normalized arguments.
    fn call(&self, method: Self::Method, args: CallArgs) -> Result<Value>;

    /// Direct, uninstrumented access: normalize and call.
    fn invoke(&self, method: Self::Method, invocation: Invocation) -> Result<Value> {
        let args = method.signature().normalize(invocation)?;
        self.call(method, args)
    }

    /// Resolves a member name; data members shadow methods of the same name.
    fn resolve(&self, name: &str) -> Result<Resolved<Self::Method>> {
        if let Some(value) = self.attribute(name) {
            return Ok(Resolved::Attribute(value));
        }
        Self::Method::from_name(name)
            .map(Resolved::Method)
            .ok_or_else(|| ScopeError::attribute_not_found(self.kind(), name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<M> {
    Attribute(Value),
    Method(M),
}

/// Anything that can run a method of interface `M` from a raw invocation.
pub trait Dispatch<M: Method> {
    fn dispatch(&self, method: M, invocation: Invocation) -> Result<Value>;
}

/// Result of a member access: a plain value or a callable bound to its owner.
pub enum Member<'a, M: Method> {
    Attribute(Value),
    Method(BoundMethod<'a, M>),
}

impl<'a, M: Method> Member<'a, M> {
    pub fn is_callable(&self) -> bool {
        matches!(self, Member::Method(_))
    }

    pub fn as_attribute(&self) -> Option<&Value> {
        match self {
            Member::Attribute(value) => Some(value),
            Member::Method(_) => None,
        }
    }

    pub fn into_method(self) -> Option<BoundMethod<'a, M>> {
        match self {
            Member::Method(bound) => Some(bound),
            Member::Attribute(_) => None,
        }
    }

    /// Calls the member; calling a data member is an error.
    pub fn call(&self, invocation: Invocation) -> Result<Value> {
        match self {
            Member::Method(bound) => bound.call(invocation),
            Member::Attribute(value) => Err(ScopeError::InvalidArgument(format!(
                "attribute of type {} is not callable",
                crate::core::type_name(value)
            ))),
        }
    }
}

pub struct BoundMethod<'a, M: Method> {
    method: M,
    owner: &'a dyn Dispatch<M>,
}

impl<'a, M: Method> BoundMethod<'a, M> {
    pub fn new(method: M, owner: &'a dyn Dispatch<M>) -> Self {
        Self { method, owner }
    }

    pub fn method(&self) -> M {
        self.method
    }

    pub fn name(&self) -> &'static str {
        self.method.name()
    }

    pub fn call(&self, invocation: Invocation) -> Result<Value> {
        self.owner.dispatch(self.method, invocation)
    }
}

/// Generic interceptor over a base object and a shared override table.
pub struct InterceptionProxy<B: BaseObject> {
    base: B,
    table: Arc<OverrideTable<B::Method>>,
    global_hook_disabled: bool,
}

impl<B: BaseObject> InterceptionProxy<B> {
    pub fn new(base: B, table: Arc<OverrideTable<B::Method>>) -> Self {
        Self {
            base,
            table,
            global_hook_disabled: false,
        }
    }

    /// A proxy with no overrides at all
    pub fn passthrough(base: B) -> Self {
        Self::new(base, Arc::new(OverrideTable::new()))
    }

    pub fn without_global_hook(mut self) -> Self {
        self.global_hook_disabled = true;
        self
    }

    pub fn set_global_hook_disabled(&mut self, disabled: bool) {
        self.global_hook_disabled = disabled;
    }

    pub fn global_hook_disabled(&self) -> bool {
        self.global_hook_disabled
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn table(&self) -> &Arc<OverrideTable<B::Method>> {
        &self.table
    }

    /// Data member of the base object, unchanged.
    pub fn attribute(&self, name: &str) -> Result<Value> {
        self.base
            .attribute(name)
            .ok_or_else(|| ScopeError::attribute_not_found(self.base.kind(), name))
    }

    pub fn member(&self, name: &str) -> Result<Member<'_, B::Method>> {
        Ok(match self.base.resolve(name)? {
            Resolved::Attribute(value) => Member::Attribute(value),
            Resolved::Method(method) => Member::Method(BoundMethod::new(method, self)),
        })
    }

    /// Looks `name` up and calls it in one step.
    pub fn call(&self, name: &str, invocation: Invocation) -> Result<Value> {
        self.member(name)?.call(invocation)
    }

    pub fn invoke(&self, method: B::Method, mut invocation: Invocation) -> Result<Value> {
        if invocation.take_escape() {
            debug!(kind = self.base.kind(), method = method.name(), "escape flag set, calling base directly");
            return self.base.invoke(method, invocation);
        }

        let raw = |args: CallArgs| self.base.call(method, args);
        let overridden = |args: CallArgs| match self.table.get(method) {
            Some(func) => {
                debug!(kind = self.base.kind(), method = method.name(), "applying method override");
                func(&Target::new(method, &raw), self.table.as_ref(), args)
            }
            None => raw(args),
        };

        let args = method.signature().normalize(invocation)?;
        match self.active_global_hook() {
            Some(hook) => hook(&Target::new(method, &overridden), self.table.as_ref(), args),
            None => overridden(args),
        }
    }

    fn active_global_hook(&self) -> Option<&OverrideFn<B::Method>> {
        if self.global_hook_disabled {
            return None;
        }
        self.table.global_hook()
    }
}

impl<B: BaseObject> Dispatch<B::Method> for InterceptionProxy<B> {
    fn dispatch(&self, method: B::Method, invocation: Invocation) -> Result<Value> {
        self.invoke(method, invocation)
    }
}

impl<B: BaseObject + fmt::Debug> fmt::Debug for InterceptionProxy<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionProxy")
            .field("base", &self.base)
            .field("table", &self.table)
            .field("global_hook_disabled", &self.global_hook_disabled)
            .finish()
    }
}
