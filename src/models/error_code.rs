use serde_json::Value;

/// Error numbers reported by the legacy SOAP/REST service in the `number`
/// field of an error envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorCode {
    NoError,
    InvalidLogin,
    InvalidSession,
    NoPortal,
    ModuleDoesNotExist,
    FileDoesNotExist,
    ModuleNotSupported,
    RelationshipNotSupported,
    AccessDenied,
    DuplicateRecords,
    NoRecords,
    CannotAddClient,
    NoSuchSession,
    PasswordExpired,
    LockoutReached,
    /// Any `number` outside the known set, kept as sent by the server.
    Unrecognized(Value),
}

impl ErrorCode {
    pub fn from_number(number: i64) -> Option<ErrorCode> {
        let code = match number {
            0 => ErrorCode::NoError,
            10 => ErrorCode::InvalidLogin,
            11 => ErrorCode::InvalidSession,
            12 => ErrorCode::NoPortal,
            20 => ErrorCode::ModuleDoesNotExist,
            21 => ErrorCode::FileDoesNotExist,
            30 => ErrorCode::ModuleNotSupported,
            31 => ErrorCode::RelationshipNotSupported,
            40 => ErrorCode::AccessDenied,
            50 => ErrorCode::DuplicateRecords,
            51 => ErrorCode::NoRecords,
            52 => ErrorCode::CannotAddClient,
            60 => ErrorCode::NoSuchSession,
            1008 => ErrorCode::PasswordExpired,
            1009 => ErrorCode::LockoutReached,
            _ => return None,
        };
        Some(code)
    }

    /// Classifies the raw `number` value of an envelope. Integers and whole
    /// floats such as `10.0` can name a known code; strings never do.
    pub fn from_value(value: &Value) -> ErrorCode {
        value
            .as_i64()
            .or_else(|| whole_number(value))
            .and_then(ErrorCode::from_number)
            .unwrap_or_else(|| ErrorCode::Unrecognized(value.clone()))
    }

    pub fn number(&self) -> Option<i64> {
        let number = match self {
            ErrorCode::NoError => 0,
            ErrorCode::InvalidLogin => 10,
            ErrorCode::InvalidSession => 11,
            ErrorCode::NoPortal => 12,
            ErrorCode::ModuleDoesNotExist => 20,
            ErrorCode::FileDoesNotExist => 21,
            ErrorCode::ModuleNotSupported => 30,
            ErrorCode::RelationshipNotSupported => 31,
            ErrorCode::AccessDenied => 40,
            ErrorCode::DuplicateRecords => 50,
            ErrorCode::NoRecords => 51,
            ErrorCode::CannotAddClient => 52,
            ErrorCode::NoSuchSession => 60,
            ErrorCode::PasswordExpired => 1008,
            ErrorCode::LockoutReached => 1009,
            ErrorCode::Unrecognized(_) => return None,
        };
        Some(number)
    }
}

fn whole_number(value: &Value) -> Option<i64> {
    let number = value.as_f64()?;
    if number.fract() == 0.0 && number >= i64::MIN as f64 && number <= i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}
