// Market data module entrypoint
pub mod adapters; // venue-specific snapshot + diff-stream collaborators
pub mod session;  // one snapshot + stream lifecycle wired into a reconciler
