//! Folio Core: records, immutable query descriptors, result envelopes, and
//! the portfolio entity schemas shared by the client and the data endpoint.

pub mod entities;
pub mod envelope;
pub mod error;
pub mod query;
pub mod schema;
pub mod types;

pub use entities::{Experience, Profile, Project, Skill, Testimonial, ThemeSettings};
pub use envelope::{Envelope, ResponseBody, WireError};
pub use error::{ShimError, DEFAULT_FAILURE_MESSAGE};
pub use query::{
    mutation_target, Direction, Filter, Order, QueryDescriptor, DEFAULT_COLUMNS, ID_COLUMN,
    RESERVED_PARAMS,
};
pub use schema::{Validate, ValidationResult, Validator};
pub use types::{apply_patch, diff, to_object, DynamicRow, Patch, Record, Table};
