//! tally-core: transaction types, the category set, the classified CSV store
//! and the summary computations behind the viewer.

pub mod cache;
pub mod category;
pub mod store;
pub mod summary;
pub mod table;
pub mod transaction;

pub use cache::DatasetCache;
pub use category::Category;
pub use store::{read_classified, write_classified, StoreError};
pub use summary::{
    apply_filter, category_breakdown, detail_rows, format_currency, BreakdownSlice,
    FilterOptions, Metrics, PeriodKey,
};
pub use table::{fold_outcome, FileOutcome, TransactionTable};
pub use transaction::{ClassifiedTransaction, Transaction};
