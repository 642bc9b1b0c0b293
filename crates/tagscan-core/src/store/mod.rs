// ── Session-scoped storage ──

mod cache;

pub use cache::TagPresenceCache;
