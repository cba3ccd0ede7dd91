use crate::record::MAX_APPOINTMENT_DATE_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    // patient, vaccine or center id is zero
    InvalidId,
    DateTooLong {
        len: usize,
    },
    InvalidStatus {
        value: String,
    },
    InvalidDoctorId,
    InvalidAmount,
    AccountData {
        message: String,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::InvalidId => write!(f, "Invalid ID"),
            RecordError::DateTooLong { len } => write!(
                f,
                "Appointment date cannot exceed {} characters, got {}",
                MAX_APPOINTMENT_DATE_LEN, len
            ),
            RecordError::InvalidStatus { value } => write!(
                f,
                "Invalid status '{}': expected one of pending, confirmed, completed, cancelled",
                value
            ),
            RecordError::InvalidDoctorId => write!(f, "Invalid doctor ID"),
            RecordError::InvalidAmount => write!(f, "Invalid payment amount: must be non-zero"),
            RecordError::AccountData { message } => {
                write!(f, "Invalid account data: {}", message)
            }
        }
    }
}

impl std::error::Error for RecordError {}

impl From<anchor_lang::error::Error> for RecordError {
    fn from(e: anchor_lang::error::Error) -> Self {
        Self::AccountData {
            message: e.to_string(),
        }
    }
}
