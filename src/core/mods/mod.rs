pub mod constraint;
pub mod maintenance;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod validator;

pub use maintenance::{ModCleanup, ModEntry};
pub use metadata::{normalize_id, ModMetadata, ModOrigin};
pub use registry::{ModRegistry, ModrinthRegistry};
pub use resolver::{resolve_missing, AutoResolveOutcome, ResolveContext, AUTO_INSTALL_PREFIX};
pub use rules::CompatRules;
pub use validator::{
    validate_mods, IssueCode, Severity, ValidationIssue, ValidationResult, ValidationSummary,
};
