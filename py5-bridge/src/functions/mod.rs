//! User functions, namespaces and the callback registry
//!
//! This module contains everything the bridge knows about user code before
//! it is invoked: declared signatures, the namespaces user code is scanned
//! from, the closed callback vocabulary and the arity-filtered registry.

pub mod namespace;
pub mod profile;
pub mod registry;
pub mod signature;
pub mod vocabulary;

// Re-export key types for convenience
pub use namespace::{Namespace, NamespaceEntry};
pub use profile::{FunctionStats, Profiler};
pub use registry::{extract_user_functions, ExtractedFunctions, FunctionRegistry};
pub use signature::{CallableFn, Param, ParamKind, Signature, UserFunction};
pub use vocabulary::ArityTable;
