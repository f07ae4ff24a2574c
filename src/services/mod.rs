// Service exports
pub mod auth;
pub mod local;
pub mod source;
pub mod supabase;
pub mod viewers;

pub use auth::{SessionEvent, SessionManager};
pub use local::{LocalStore, LocalStoreError};
pub use source::{Backend, DataSource, DataSourceError, IdentityError, IdentityProvider};
pub use supabase::{SupabaseClient, SupabaseError, SupabaseTables};
pub use viewers::{ViewerHandle, ViewerRegistry, ViewerState};
