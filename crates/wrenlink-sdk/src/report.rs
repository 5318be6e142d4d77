//! Structured error reports relayed from the VM to the host

use std::fmt;

use crate::constants::ErrorKind;

/// Raw line value the VM passes when a report has no line number
pub const NO_LINE: i32 = -1;

/// One error report from the VM.
///
/// Holds the VM's callback arguments exactly as they arrived and is handed to
/// the host immediately; the bridge never stores or interprets it. A kind this
/// build does not know is kept as its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Kind of report, in the VM's raw form
    pub raw_kind: i32,
    /// Module the error originated in, if the VM supplied one
    pub module: Option<String>,
    /// Line number in the VM's raw form; negative means none
    pub raw_line: i32,
    /// Message text, verbatim
    pub message: String,
}

impl ErrorReport {
    /// Build a report from raw callback arguments
    pub fn from_raw(raw_kind: i32, module: Option<&str>, raw_line: i32, message: &str) -> Self {
        ErrorReport {
            raw_kind,
            module: module.map(str::to_string),
            raw_line,
            message: message.to_string(),
        }
    }

    /// Known kind, or `None` for a kind newer than this build
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_raw(self.raw_kind)
    }

    /// Line number, if the VM supplied one
    pub fn line(&self) -> Option<u32> {
        u32::try_from(self.raw_line).ok()
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.module.as_deref().unwrap_or("?");
        match (self.kind(), self.line()) {
            (Some(ErrorKind::Compile), Some(line)) => {
                write!(f, "[{} line {}] {}", module, line, self.message)
            }
            (Some(ErrorKind::StackTrace), Some(line)) => {
                write!(f, "[{} line {}] in {}", module, line, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}
