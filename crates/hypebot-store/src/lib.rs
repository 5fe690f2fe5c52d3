//! Bot store for HypeBot.
//!
//! The engine reads bots through the `BotStore` trait. Two backends:
//! an in-process map and a Supabase (PostgREST) table.

pub mod error;
pub mod memory;
pub mod store;
pub mod supabase;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBotStore;
pub use store::{BotStore, BoxFuture};
pub use supabase::{SupabaseBotStore, SupabaseConfig, ENV_SUPABASE_SERVICE_ROLE_KEY, ENV_SUPABASE_URL};
