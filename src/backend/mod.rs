//! Collaborator interfaces
//!
//! The document-store client is external; these traits are the narrow
//! surface the scoping layer depends on. Ordinary operations go through
//! [`BaseObject::call`] with a method identifier. Operations that hand back
//! another object (a collection, a bulk builder, a selector) are typed trait
//! methods so the facade can wrap their result.

mod methods;

pub use methods::{BulkMethod, CollectionMethod, DatabaseMethod, ScopedArgument, SelectorMethod};

use crate::core::{Result, Value};
use crate::proxy::BaseObject;

pub trait DatabaseBackend: BaseObject<Method = DatabaseMethod> {
    type Collection: CollectionBackend;

    /// Indexed access: `db[name]`
    fn collection(&self, name: &str) -> Result<Self::Collection>;

    fn create_collection(&self, name: &str) -> Result<Self::Collection>;

    fn get_collection(&self, name: &str) -> Result<Self::Collection>;

    /// Attribute-style access: `db.name`. Names that are neither data members
    /// nor methods resolve to a collection; private-looking names do not.
    fn collection_attribute(&self, name: &str) -> Option<Result<Self::Collection>> {
        if name.starts_with('_') {
            return None;
        }
        Some(self.collection(name))
    }
}

pub trait CollectionBackend: BaseObject<Method = CollectionMethod> {
    type Bulk: BulkBackend;

    fn initialize_ordered_bulk_op(&self, bypass_document_validation: bool) -> Result<Self::Bulk>;

    fn initialize_unordered_bulk_op(&self, bypass_document_validation: bool) -> Result<Self::Bulk>;
}

pub trait BulkBackend: BaseObject<Method = BulkMethod> {
    type Selector: BaseObject<Method = SelectorMethod>;

    /// Starts a selector-scoped sub-builder
    fn find(&self, selector: Value) -> Result<Self::Selector>;
}
