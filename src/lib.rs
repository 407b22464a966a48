pub mod compiler;
pub mod engine;
pub mod export;
pub mod group;
pub mod io;
pub mod ldif;
pub mod member;
pub mod report;
pub mod resolver;
pub mod source;
pub mod stats;

pub mod prelude {
    pub use crate::compiler::{FailurePolicy, LookupMode, ReportCompiler, ReportOptions};
    pub use crate::engine::{Engine, Report};
    pub use crate::group::{GroupRecord, ReportRow};
    pub use crate::member::Member;
    pub use crate::resolver::NameResolver;
    pub use crate::source::{GroupSource, ProfileSource};
}
