//! PassGen Store
//!
//! Named key lists kept as files in one directory.
//!
//! | File              | Format                                   |
//! |-------------------|------------------------------------------|
//! | `NAME.keys.json`  | current JSON document                     |
//! | `NAME.keys`       | legacy text list, read-only               |
//! | `keylists.meta.json` | most recently used list names          |
//!
//! A legacy list is upgraded by loading it and saving it back: the JSON
//! file is written next to it and takes precedence from then on.

pub mod legacy;
pub mod recent;
pub mod store;

pub use legacy::parse_legacy;
pub use recent::RecentLists;
pub use store::{KeyListStore, ListOrigin, LoadedList, StoreError};
