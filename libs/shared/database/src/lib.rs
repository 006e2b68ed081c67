pub mod directory;
pub mod error;
pub mod locks;
pub mod supabase;

pub use directory::{Directory, InMemoryDirectory, SupabaseDirectory};
pub use error::DbError;
pub use locks::KeyedLocks;
pub use supabase::SupabaseClient;
