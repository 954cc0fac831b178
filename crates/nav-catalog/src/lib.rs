//! Link directory domain: turns Notion database records into categorized links,
//! searches them and keeps the current snapshot cached behind a TTL.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod extract;
pub mod fallback;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod properties;
pub mod search;
pub mod source;
pub mod validate;


pub use cache::{CacheState, DataCache, DEFAULT_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{Category, Link, Snapshot, SnapshotOrigin};
pub use outcome::{Issue, Outcome};
pub use properties::PropertyTables;
pub use source::{CatalogSource, NotionSettings, NotionSource, SourceError};
