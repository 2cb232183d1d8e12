pub mod types;
pub mod error;
pub mod value;
pub mod definition;
pub mod translate;
pub mod parser;
pub mod filter_where;
pub mod filter_order;

pub use types::*;
pub use error::FilterError;
pub use definition::SchemaDefinition;
pub use translate::{translate_filters, translate_sorts};
pub use parser::FiltersAndSortsParser;
pub use filter_where::FilterWhere;
pub use filter_order::FilterOrder;
