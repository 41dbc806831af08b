pub mod auth_service;
pub mod ticket_intake;
pub mod ticket_number;

pub use auth_service::{AuthError, AuthService, LoginRequest, LoginResult};
pub use ticket_intake::{CreateTicketRequest, CreatedTicket, IntakeError, TicketIntake, TicketWrite};
pub use ticket_number::{TicketNumberSource, TimestampNumbers};
