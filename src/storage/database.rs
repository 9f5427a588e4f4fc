use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::args::CallArgs;
use crate::backend::{DatabaseBackend, DatabaseMethod};
use crate::core::{Result, Value};
use crate::proxy::BaseObject;

use super::collection::MemoryCollection;
use super::faults::FaultInjector;
use super::matcher::failure;
use super::store::DocumentStore;

const SYSTEM_PREFIX: &str = "system.";

#[derive(Debug)]
struct DatabaseState {
    name: String,
    collections: RwLock<BTreeMap<String, Arc<RwLock<DocumentStore>>>>,
}

/// Entry point of the in-memory store: a set of named databases sharing one
/// [`FaultInjector`].
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    databases: Arc<RwLock<HashMap<String, Arc<DatabaseState>>>>,
    faults: FaultInjector,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The named database, created on first use
    pub fn database(&self, name: &str) -> MemoryDatabase {
        let mut databases = self.databases.write().unwrap_or_else(PoisonError::into_inner);
        let state = databases
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(DatabaseState {
                    name: name.to_string(),
                    collections: RwLock::new(BTreeMap::new()),
                })
            })
            .clone();

        MemoryDatabase {
            state,
            faults: self.faults.clone(),
        }
    }

    pub fn database_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.databases.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }
}

/// Handle to one in-memory database. Clones share the same collections.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    state: Arc<DatabaseState>,
    faults: FaultInjector,
}

impl MemoryDatabase {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// The named collection, created on first use
    pub fn collection(&self, name: &str) -> Result<MemoryCollection> {
        if name.is_empty() {
            return Err(failure("collection names cannot be empty"));
        }
        let store = self
            .state
            .collections
            .write()?
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(DocumentStore::new())))
            .clone();
        Ok(self.handle(name, store))
    }

    fn handle(&self, name: &str, store: Arc<RwLock<DocumentStore>>) -> MemoryCollection {
        MemoryCollection::new(name, self.state.name.clone(), store, self.faults.clone())
    }

    fn collection_names(&self, include_system: bool) -> Result<Vec<String>> {
        Ok(self
            .state
            .collections
            .read()?
            .keys()
            .filter(|name| include_system || !name.starts_with(SYSTEM_PREFIX))
            .cloned()
            .collect())
    }
}

impl BaseObject for MemoryDatabase {
    type Method = DatabaseMethod;

    fn kind(&self) -> &'static str {
        "Database"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.state.name.clone())),
            _ => None,
        }
    }

    fn call(&self, method: DatabaseMethod, args: CallArgs) -> Result<Value> {
        self.faults.check(method.as_str())?;
        match method {
            DatabaseMethod::CollectionNames => {
                let names = self.collection_names(args.flag("include_system_collections"))?;
                Ok(Value::from(names))
            }
            DatabaseMethod::DropCollection => {
                let name = args.str("name_or_collection")?;
                let dropped = self.state.collections.write()?.remove(name).is_some();
                debug!(database = %self.state.name, collection = name, dropped, "drop collection");
                Ok(Value::Null)
            }
        }
    }
}

impl DatabaseBackend for MemoryDatabase {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> Result<MemoryCollection> {
        MemoryDatabase::collection(self, name)
    }

    fn create_collection(&self, name: &str) -> Result<MemoryCollection> {
        self.faults.check("create_collection")?;
        if name.is_empty() {
            return Err(failure("collection names cannot be empty"));
        }
        let mut collections = self.state.collections.write()?;
        if collections.contains_key(name) {
            return Err(failure(format!("collection {} already exists", name)));
        }
        let store = Arc::new(RwLock::new(DocumentStore::new()));
        collections.insert(name.to_string(), Arc::clone(&store));
        Ok(self.handle(name, store))
    }

    fn get_collection(&self, name: &str) -> Result<MemoryCollection> {
        self.collection(name)
    }
}
