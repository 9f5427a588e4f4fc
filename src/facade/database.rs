use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::debug;

use crate::args::{Invocation, Signature};
use crate::backend::{CollectionMethod, DatabaseBackend, DatabaseMethod};
use crate::core::{Result, ScopeError, Value};
use crate::policy::RequiredFilter;
use crate::proxy::{BoundMethod, InterceptionProxy, OverrideTable};

use super::{Scope, ScopedCollection};

lazy_static! {
    static ref CREATE_COLLECTION: Signature = Signature::method("create_collection").required("name");
    static ref GET_COLLECTION: Signature = Signature::method("get_collection").required("name");
}

/// Database methods that return a collection, reached by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFactory {
    Create,
    Get,
}

impl CollectionFactory {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "create_collection" => Some(Self::Create),
            "get_collection" => Some(Self::Get),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create_collection",
            Self::Get => "get_collection",
        }
    }

    pub fn signature(self) -> &'static Signature {
        match self {
            Self::Create => &CREATE_COLLECTION,
            Self::Get => &GET_COLLECTION,
        }
    }
}

/// A collection factory bound to its database; calling it returns the
/// collection wrapped in the database's scope.
pub struct FactoryMethod<'a, D: DatabaseBackend> {
    factory: CollectionFactory,
    database: &'a ScopedDatabase<D>,
}

impl<'a, D: DatabaseBackend> FactoryMethod<'a, D> {
    pub fn factory(&self) -> CollectionFactory {
        self.factory
    }

    pub fn name(&self) -> &'static str {
        self.factory.as_str()
    }

    /// Binds `(name)` and calls the factory.
    ///
    /// The escape flag is rejected: an unscoped collection comes from
    /// [`ScopedDatabase::base`].
    pub fn call(&self, mut invocation: Invocation) -> Result<ScopedCollection<D::Collection>> {
        if invocation.take_escape() {
            return Err(ScopeError::InvalidArgument(format!(
                "'{}' always returns a scoped collection; use ScopedDatabase::base for an unscoped one",
                self.name()
            )));
        }
        let args = self.factory.signature().normalize(invocation)?;
        let name = args.str("name")?;
        match self.factory {
            CollectionFactory::Create => self.database.create_collection(name),
            CollectionFactory::Get => self.database.get_collection(name),
        }
    }
}

/// Result of a member access on a [`ScopedDatabase`].
pub enum DatabaseMember<'a, D: DatabaseBackend> {
    Attribute(Value),
    Method(BoundMethod<'a, DatabaseMethod>),
    Factory(FactoryMethod<'a, D>),
    Collection(ScopedCollection<D::Collection>),
}

impl<'a, D: DatabaseBackend> DatabaseMember<'a, D> {
    pub fn into_collection(self) -> Option<ScopedCollection<D::Collection>> {
        match self {
            DatabaseMember::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn into_factory(self) -> Option<FactoryMethod<'a, D>> {
        match self {
            DatabaseMember::Factory(factory) => Some(factory),
            _ => None,
        }
    }
}

/// Database whose collections all come back scoped.
///
/// The collection override table is built once here and shared by every
/// collection this database hands out.
pub struct ScopedDatabase<D: DatabaseBackend> {
    proxy: InterceptionProxy<D>,
    scope: Scope,
    collection_table: Arc<OverrideTable<CollectionMethod>>,
}

impl<D: DatabaseBackend> ScopedDatabase<D> {
    pub fn new(base: D, scope: impl Into<Scope>) -> Self {
        let scope = scope.into();
        let collection_table = Arc::new(ScopedCollection::<D::Collection>::build_table(&scope));
        Self {
            proxy: InterceptionProxy::passthrough(base),
            scope,
            collection_table,
        }
    }

    pub fn base(&self) -> &D {
        self.proxy.base()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn required_filter(&self) -> &RequiredFilter {
        self.scope.required_filter()
    }

    /// Indexed access: `db[name]`
    pub fn collection(&self, name: &str) -> Result<ScopedCollection<D::Collection>> {
        let collection = self.base().collection(name)?;
        Ok(self.wrap(collection))
    }

    pub fn create_collection(&self, name: &str) -> Result<ScopedCollection<D::Collection>> {
        let collection = self.base().create_collection(name)?;
        Ok(self.wrap(collection))
    }

    pub fn get_collection(&self, name: &str) -> Result<ScopedCollection<D::Collection>> {
        let collection = self.base().get_collection(name)?;
        Ok(self.wrap(collection))
    }

    /// Attribute-style access: data members and methods pass through, the
    /// collection factories wrap their result, any other public name is a
    /// scoped collection.
    pub fn member(&self, name: &str) -> Result<DatabaseMember<'_, D>> {
        if let Some(value) = self.base().attribute(name) {
            return Ok(DatabaseMember::Attribute(value));
        }
        if let Some(method) = DatabaseMethod::parse(name) {
            return Ok(DatabaseMember::Method(BoundMethod::new(method, &self.proxy)));
        }
        if let Some(factory) = CollectionFactory::parse(name) {
            return Ok(DatabaseMember::Factory(FactoryMethod {
                factory,
                database: self,
            }));
        }

        match self.base().collection_attribute(name) {
            Some(collection) => Ok(DatabaseMember::Collection(self.wrap(collection?))),
            None => Err(ScopeError::attribute_not_found(self.base().kind(), name)),
        }
    }

    pub fn attribute(&self, name: &str) -> Result<Value> {
        self.proxy.attribute(name)
    }

    pub fn invoke(&self, method: DatabaseMethod, invocation: Invocation) -> Result<Value> {
        self.proxy.invoke(method, invocation)
    }

    pub fn collection_names(&self) -> Result<Vec<String>> {
        let reply = self.invoke(DatabaseMethod::CollectionNames, Invocation::new())?;
        let names = reply
            .as_array()
            .ok_or_else(|| ScopeError::InvalidArgument(format!("unexpected reply from 'collection_names': {}", reply)))?;
        Ok(names
            .iter()
            .filter_map(|name| name.as_str().map(str::to_string))
            .collect())
    }

    pub fn drop_collection(&self, name: &str) -> Result<Value> {
        self.invoke(DatabaseMethod::DropCollection, Invocation::new().arg(name))
    }

    fn wrap(&self, collection: D::Collection) -> ScopedCollection<D::Collection> {
        debug!(database = self.base().kind(), "wrapping collection in scoped facade");
        ScopedCollection::with_table(collection, self.scope.clone(), self.collection_table.clone())
    }
}
