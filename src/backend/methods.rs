//! Method identifiers and declared parameter lists of the document-store
//! interfaces. Each operation's signature is built once and reused for every
//! call, so normalization is a per-operation table lookup.

use lazy_static::lazy_static;

use crate::args::Signature;
use crate::core::Value;
use crate::proxy::Method;

macro_rules! method_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

macro_rules! impl_method {
    ($name:ident, $table:ident) => {
        lazy_static! {
            static ref $table: Vec<Signature> =
                $name::ALL.iter().map(|method| method.build_signature()).collect();
        }

        impl Method for $name {
            fn name(self) -> &'static str {
                self.as_str()
            }

            fn from_name(name: &str) -> Option<Self> {
                Self::parse(name)
            }

            fn signature(self) -> &'static Signature {
                // ALL lists the variants in declaration order
                &$table[self as usize]
            }
        }
    };
}

method_enum! {
    /// Callable members of a collection.
    pub enum CollectionMethod {
        Count => "count",
        Find => "find",
        FindOne => "find_one",
        Insert => "insert",
        InsertOne => "insert_one",
        InsertMany => "insert_many",
        ReplaceOne => "replace_one",
        UpdateOne => "update_one",
        UpdateMany => "update_many",
        DeleteOne => "delete_one",
        DeleteMany => "delete_many",
        FindOneAndDelete => "find_one_and_delete",
        FindOneAndReplace => "find_one_and_replace",
        FindOneAndUpdate => "find_one_and_update",
        Distinct => "distinct",
        Update => "update",
        Remove => "remove",
        Aggregate => "aggregate",
        Group => "group",
    }
}

method_enum! {
    /// Callable members of a database (collection access is typed, see `DatabaseBackend`).
    pub enum DatabaseMethod {
        CollectionNames => "collection_names",
        DropCollection => "drop_collection",
    }
}

method_enum! {
    /// Callable members of a bulk-operation builder (`find` is typed, see `BulkBackend`).
    pub enum BulkMethod {
        Insert => "insert",
        Execute => "execute",
    }
}

method_enum! {
    /// Callable members of a selector-scoped bulk sub-builder.
    pub enum SelectorMethod {
        Update => "update",
        UpdateOne => "update_one",
        ReplaceOne => "replace_one",
        Remove => "remove",
        RemoveOne => "remove_one",
    }
}

impl_method!(CollectionMethod, COLLECTION_SIGNATURES);
impl_method!(DatabaseMethod, DATABASE_SIGNATURES);
impl_method!(BulkMethod, BULK_SIGNATURES);
impl_method!(SelectorMethod, SELECTOR_SIGNATURES);

/// Which argument of an operation carries the scoping constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopedArgument {
    /// A filter/selector document (or an `_id` shorthand)
    Filter(&'static str),
    /// An aggregation pipeline
    Pipeline(&'static str),
}

impl ScopedArgument {
    pub fn name(self) -> &'static str {
        match self {
            ScopedArgument::Filter(name) | ScopedArgument::Pipeline(name) => name,
        }
    }
}

impl CollectionMethod {
    /// The argument a scoped collection rewrites for this operation, if any.
    pub fn scoped_argument(self) -> Option<ScopedArgument> {
        use CollectionMethod::*;
        match self {
            Count | Find | FindOne | ReplaceOne | UpdateOne | UpdateMany | DeleteOne
            | DeleteMany | FindOneAndDelete | FindOneAndReplace | FindOneAndUpdate
            | Distinct => Some(ScopedArgument::Filter("filter")),
            Update => Some(ScopedArgument::Filter("spec")),
            Remove => Some(ScopedArgument::Filter("spec_or_id")),
            Group => Some(ScopedArgument::Filter("condition")),
            Aggregate => Some(ScopedArgument::Pipeline("pipeline")),
            Insert | InsertOne | InsertMany => None,
        }
    }

    fn build_signature(self) -> Signature {
        use CollectionMethod::*;
        let sig = Signature::method(self.as_str());
        match self {
            Count => sig.optional("filter", Value::Null).catch_all("kwargs"),
            Find | FindOne => sig
                .optional("filter", Value::Null)
                .optional("projection", Value::Null)
                .catch_all("kwargs"),
            Insert => sig
                .required("doc_or_docs")
                .optional("manipulate", true)
                .optional("check_keys", true)
                .optional("continue_on_error", false)
                .catch_all("kwargs"),
            InsertOne => sig
                .required("document")
                .optional("bypass_document_validation", false),
            InsertMany => sig
                .required("documents")
                .optional("ordered", true)
                .optional("bypass_document_validation", false),
            ReplaceOne => sig
                .required("filter")
                .required("replacement")
                .optional("upsert", false)
                .optional("bypass_document_validation", false)
                .optional("collation", Value::Null),
            UpdateOne | UpdateMany => sig
                .required("filter")
                .required("update")
                .optional("upsert", false)
                .optional("bypass_document_validation", false)
                .optional("collation", Value::Null),
            DeleteOne | DeleteMany => sig
                .required("filter")
                .optional("collation", Value::Null),
            FindOneAndDelete => sig
                .required("filter")
                .optional("projection", Value::Null)
                .optional("sort", Value::Null)
                .catch_all("kwargs"),
            FindOneAndReplace => sig
                .required("filter")
                .required("replacement")
                .optional("projection", Value::Null)
                .optional("sort", Value::Null)
                .optional("upsert", false)
                .optional("return_document", false)
                .catch_all("kwargs"),
            FindOneAndUpdate => sig
                .required("filter")
                .required("update")
                .optional("projection", Value::Null)
                .optional("sort", Value::Null)
                .optional("upsert", false)
                .optional("return_document", false)
                .catch_all("kwargs"),
            Distinct => sig
                .required("key")
                .optional("filter", Value::Null)
                .catch_all("kwargs"),
            Update => sig
                .required("spec")
                .required("document")
                .optional("upsert", false)
                .optional("manipulate", false)
                .optional("multi", false)
                .optional("check_keys", true)
                .catch_all("kwargs"),
            Remove => sig
                .optional("spec_or_id", Value::Null)
                .optional("multi", true)
                .catch_all("kwargs"),
            Aggregate => sig.required("pipeline").catch_all("kwargs"),
            Group => sig
                .required("key")
                .required("condition")
                .required("initial")
                .required("reduce")
                .optional("finalize", Value::Null)
                .catch_all("kwargs"),
        }
    }
}

impl DatabaseMethod {
    fn build_signature(self) -> Signature {
        let sig = Signature::method(self.as_str());
        match self {
            DatabaseMethod::CollectionNames => sig.optional("include_system_collections", true),
            DatabaseMethod::DropCollection => sig.required("name_or_collection"),
        }
    }
}

impl BulkMethod {
    fn build_signature(self) -> Signature {
        let sig = Signature::method(self.as_str());
        match self {
            BulkMethod::Insert => sig.required("document"),
            BulkMethod::Execute => sig.optional("write_concern", Value::Null),
        }
    }
}

impl SelectorMethod {
    fn build_signature(self) -> Signature {
        let sig = Signature::method(self.as_str());
        match self {
            SelectorMethod::Update | SelectorMethod::UpdateOne => sig.required("update"),
            SelectorMethod::ReplaceOne => sig.required("replacement"),
            SelectorMethod::Remove | SelectorMethod::RemoveOne => sig,
        }
    }
}
