// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (session required, per-route permissions)
//
// Entity routes are not declared here one by one: app.rs mounts the generic
// handlers in protected::entity once per schema descriptor.

pub mod protected;
pub mod public;
