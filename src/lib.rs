pub mod app;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod domain;
pub mod error;
pub mod keys;
pub mod model;
pub mod remote;
pub mod state;

// Export the engine entry points
pub use app::{Key, KeyInput, Reconciled, SessionEvent, TableOperations, TableSession, ViewCoordinator, ViewEvent};

// Export the remote interface
pub use remote::memory::{InMemoryStore, Operation, RemoteCall, Resolution};
pub use remote::{PendingCall, RemoteStore};

// Export data types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{KeyError, RemoteError};
pub use keys::CellKey;
pub use model::{
    CellUpdate, Column, ColumnType, Combinator, FilterCondition, FilterGroup, FilterOperator, Row, SortConfig,
    SortDirection, TableData, TableInfo, View, ViewConfig,
};
