//! VM enum constants
//!
//! Mirrors the embedded Wren VM's `WrenInterpretResult`, `WrenType` and
//! `WrenErrorType` enums. The discriminants must stay in sync with the VM
//! build that wrenlink is linked against.

use serde::Serialize;

/// Result of interpreting a unit of source text
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpretResult {
    /// Source compiled and ran to completion
    Success = 0,
    /// Source failed to compile
    CompileError = 1,
    /// Source raised an uncaught runtime error
    RuntimeError = 2,
}

impl InterpretResult {
    /// Convert a raw VM result code
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(InterpretResult::Success),
            1 => Some(InterpretResult::CompileError),
            2 => Some(InterpretResult::RuntimeError),
            _ => None,
        }
    }

    /// Get the raw VM result code
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Type tag of a value stored in a VM slot
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean
    Bool = 0,
    /// Number (double)
    Num = 1,
    /// Foreign object
    Foreign = 2,
    /// List
    List = 3,
    /// Null
    Null = 4,
    /// String
    String = 5,
    /// Any other object type
    Unknown = 6,
}

impl ValueType {
    /// Convert a raw VM type tag
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ValueType::Bool),
            1 => Some(ValueType::Num),
            2 => Some(ValueType::Foreign),
            3 => Some(ValueType::List),
            4 => Some(ValueType::Null),
            5 => Some(ValueType::String),
            6 => Some(ValueType::Unknown),
            _ => None,
        }
    }

    /// Get the raw VM type tag
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Kind of error reported through the VM's error callback
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Syntax or resolution error found while compiling
    Compile = 0,
    /// Uncaught runtime error; followed by stack-trace frames
    Runtime = 1,
    /// One frame of the stack trace of a runtime error
    StackTrace = 2,
}

impl ErrorKind {
    /// Convert a raw VM error kind
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ErrorKind::Compile),
            1 => Some(ErrorKind::Runtime),
            2 => Some(ErrorKind::StackTrace),
            _ => None,
        }
    }

    /// Get the raw VM error kind
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Every VM constant in one table.
///
/// Serialises with the names hosts already use (`RESULT_SUCCESS`,
/// `TYPE_BOOL`, `ERROR_STACK_TRACE`, ...), so a host with a richer boundary can
/// read the whole set at once instead of calling one accessor per constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConstantTable {
    /// [`InterpretResult::Success`]
    pub result_success: i32,
    /// [`InterpretResult::CompileError`]
    pub result_compile_error: i32,
    /// [`InterpretResult::RuntimeError`]
    pub result_runtime_error: i32,
    /// [`ValueType::Bool`]
    pub type_bool: i32,
    /// [`ValueType::Num`]
    pub type_num: i32,
    /// [`ValueType::Foreign`]
    pub type_foreign: i32,
    /// [`ValueType::List`]
    pub type_list: i32,
    /// [`ValueType::Null`]
    pub type_null: i32,
    /// [`ValueType::String`]
    pub type_string: i32,
    /// [`ValueType::Unknown`]
    pub type_unknown: i32,
    /// [`ErrorKind::Compile`]
    pub error_compile: i32,
    /// [`ErrorKind::Runtime`]
    pub error_runtime: i32,
    /// [`ErrorKind::StackTrace`]
    pub error_stack_trace: i32,
}

impl ConstantTable {
    /// The table for the VM this crate was built against
    pub const CURRENT: ConstantTable = ConstantTable {
        result_success: InterpretResult::Success as i32,
        result_compile_error: InterpretResult::CompileError as i32,
        result_runtime_error: InterpretResult::RuntimeError as i32,
        type_bool: ValueType::Bool as i32,
        type_num: ValueType::Num as i32,
        type_foreign: ValueType::Foreign as i32,
        type_list: ValueType::List as i32,
        type_null: ValueType::Null as i32,
        type_string: ValueType::String as i32,
        type_unknown: ValueType::Unknown as i32,
        error_compile: ErrorKind::Compile as i32,
        error_runtime: ErrorKind::Runtime as i32,
        error_stack_trace: ErrorKind::StackTrace as i32,
    };

    /// Serialise the table as a JSON object
    pub fn to_json(&self) -> String {
        // A struct of plain integers always serialises.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Default for ConstantTable {
    fn default() -> Self {
        Self::CURRENT
    }
}
