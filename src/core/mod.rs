pub mod error;
pub mod value;

pub use error::{Result, ScopeError, TransportError};
pub use value::{
    Document, Value, compare_values, get_path, is_truthy, remove_path, set_path, sort_order,
    type_name, values_equal,
};
