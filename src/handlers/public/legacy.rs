use crate::error::ApiError;
use crate::services::{IntakeError, TicketWrite};

/// POST /api/tickets.json - legacy e-mail/API-key intake
pub async fn legacy_create() -> ApiError {
    IntakeError::NotYetSupported(TicketWrite::LegacyCreate).into()
}
