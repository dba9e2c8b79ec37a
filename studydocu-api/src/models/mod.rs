mod achievement;
mod audit_log;
mod document;
mod payment;
mod profile;
mod social;

pub use achievement::*;
pub use audit_log::*;
pub use document::*;
pub use payment::*;
pub use profile::*;
pub use social::*;
