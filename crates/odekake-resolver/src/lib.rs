//! The closure-determination engine: per-facility rules, scraped patterns,
//! holiday logic, and LLM readings merged into one confidence-scored verdict.

pub mod aggregate;
pub mod error;
pub mod resolver;
pub mod tools;
pub mod verdict;

pub use aggregate::Summary;
pub use error::ResolveError;
pub use resolver::Resolver;
pub use tools::{check_all_facilities_closure, check_facility_closure, list_available_facilities};
pub use verdict::ClosureVerdict;
