//! Best-effort string key-value persistence.
//!
//! Stores never report failures to callers: a failed read is indistinguishable
//! from an absent key and a failed write is dropped after logging. Everything
//! kept here is an enhancement cache, so losing it must never break a flow.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

pub const THEME_KEY: &str = "ag_ink_theme";
pub const HISTORY_KEY: &str = "ag_ink_history";
pub const API_KEY_KEY: &str = "ag_ink_api_key";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}
