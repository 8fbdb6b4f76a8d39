// Reconciliation engine entrypoint
pub mod types;      // price levels, snapshot/diff shapes, error taxonomy
pub mod buffer;     // producer/consumer FIFO between stream and reconciler
pub mod sequence;   // sequence-id gap/duplicate state machine
pub mod store;      // the price -> quantity replica and its mutation rules
pub mod reconciler; // orchestrates snapshot intake and the validate/apply loop
