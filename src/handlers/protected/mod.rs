// handlers/protected/mod.rs - Handlers behind require_auth
//
// Every handler here receives the caller as `Extension<Identity>`.
pub mod departments;
pub mod organizations;
pub mod session;
pub mod sla;
pub mod staff;
pub mod system;
pub mod tasks;
pub mod teams;
pub mod tickets;
pub mod users;
