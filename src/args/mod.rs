//! Argument normalization
//!
//! Every intercepted call is reduced to a single name-keyed mapping before
//! overrides see it, so a policy can rewrite "the `filter` argument" no
//! matter whether the caller passed it positionally or by keyword.
//!
//! - `invocation.rs` - raw positional/keyword call plus the escape flag
//! - `signature.rs` - declared parameter lists and the normalizer itself
//! - `call_args.rs` - the normalized, name-keyed view handed to overrides

mod call_args;
mod invocation;
mod signature;

pub use call_args::CallArgs;
pub use invocation::{ESCAPE_KEYWORD, Invocation};
pub use signature::{Param, Signature};
