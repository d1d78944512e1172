pub mod category;
pub mod id;
pub mod money;
pub mod transaction;

pub use category::{name_key, CategoryItem, Subcategory};
pub use id::{IdGenerator, SequentialIds, UuidIds};
pub use money::Money;
pub use transaction::{Transaction, TransactionType};
