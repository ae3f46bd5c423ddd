pub mod category;
pub mod errors;
pub mod mod_record;

pub use category::{Category, CATEGORY_SEPARATOR, DEFAULT_CATEGORY_NAME};
pub use errors::{VaultError, VaultResult};
pub use mod_record::ModRecord;
