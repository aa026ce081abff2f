pub mod activation;
pub mod builder;
pub mod entity;
pub mod error;
pub mod extensions;
pub mod generator;
pub mod models;
pub mod parser;
pub mod reference_path;
pub mod references;
pub mod schema;
pub mod sentinel;
pub mod type_mapper;
pub mod validator;

pub use error::ConversionError;
pub use generator::{ForwardOptions, Generator};
pub use models::DocumentFormat;
pub use parser::{FieldOrder, ReverseOptions, SwaggerParser};
pub use reference_path::{resolve, resolve_in_document, AddressScheme};
