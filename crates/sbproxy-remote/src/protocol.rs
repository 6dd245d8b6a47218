//! Plain data exchanged with the remote debugger: enums, flags and
//! value objects that carry no remote handle.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::handle::{FrameHandle, ModuleHandle, TypeHandle};

/// Remote service names, one per entity kind.
pub mod service {
    pub const VALUE: &str = "RemoteValueRpcService";
    pub const FRAME: &str = "RemoteFrameRpcService";
    pub const THREAD: &str = "RemoteThreadRpcService";
    pub const TARGET: &str = "RemoteTargetRpcService";
    pub const BREAKPOINT: &str = "RemoteBreakpointRpcService";
    pub const BREAKPOINT_LOCATION: &str = "SbBreakpointLocationRpcService";
    pub const PROCESS: &str = "SbProcessRpcService";
    pub const MODULE: &str = "SbModuleRpcService";
    pub const SECTION: &str = "SbSectionRpcService";
    pub const TYPE: &str = "SbTypeRpcService";
    pub const TYPE_MEMBER: &str = "SbTypeMemberRpcService";
    pub const SYMBOL: &str = "SbSymbolRpcService";
    pub const ADDRESS: &str = "SbAddressRpcService";
    pub const FUNCTION: &str = "SbFunctionRpcService";
    pub const UNIX_SIGNALS: &str = "SbUnixSignalsRpcService";
    pub const WATCHPOINT: &str = "SbWatchpointRpcService";
    pub const COMMAND_INTERPRETER: &str = "SbCommandInterpreterRpcService";
    pub const RETURN_OBJECT: &str = "SbCommandReturnObjectRpcService";
    pub const PLATFORM: &str = "SbPlatformRpcService";
    pub const LISTENER: &str = "SbListenerRpcService";
    pub const DEBUGGER: &str = "SbDebuggerRpcService";
}

/// Address the debugger uses for "no address".
pub const INVALID_ADDRESS: u64 = u64::MAX;

/// Display format for values and summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueFormat {
    #[default]
    Default,
    Invalid,
    Boolean,
    Binary,
    Bytes,
    BytesWithAscii,
    Char,
    CharPrintable,
    Complex,
    ComplexFloat,
    CString,
    Decimal,
    Enum,
    Hex,
    HexUppercase,
    Float,
    Octal,
    OsType,
    Unicode16,
    Unicode32,
    Unsigned,
    Pointer,
    VectorOfChar,
    VectorOfSInt8,
    VectorOfUInt8,
    VectorOfSInt16,
    VectorOfUInt16,
    VectorOfSInt32,
    VectorOfUInt32,
    VectorOfSInt64,
    VectorOfUInt64,
    VectorOfFloat16,
    VectorOfFloat32,
    VectorOfFloat64,
    VectorOfUInt128,
    ComplexInteger,
    CharArray,
    AddressInfo,
    HexFloat,
    Instruction,
    Void,
}

/// Where a value lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    VariableGlobal,
    VariableStatic,
    VariableArgument,
    VariableLocal,
    Register,
    RegisterSet,
    ConstResult,
    VariableThreadLocal,
    #[default]
    #[serde(other)]
    Invalid,
}

/// Why a thread stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    None,
    Trace,
    Breakpoint,
    Watchpoint,
    Signal,
    Exception,
    Exec,
    PlanComplete,
    Exiting,
    Instrumentation,
    #[default]
    #[serde(other)]
    Invalid,
}

/// Result of running a command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnStatus {
    SuccessFinishNoResult,
    SuccessFinishResult,
    SuccessContinuingNoResult,
    SuccessContinuingResult,
    Started,
    Failed,
    Quit,
    #[default]
    #[serde(other)]
    Invalid,
}

impl ReturnStatus {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::SuccessFinishNoResult
                | Self::SuccessFinishResult
                | Self::SuccessContinuingNoResult
                | Self::SuccessContinuingResult
                | Self::Started
        )
    }
}

/// Process state reported with state-change events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateType {
    Connected,
    Stopped,
    Running,
    Detached,
    Exited,
    #[default]
    #[serde(other)]
    Invalid,
}

/// Kind of an object-file section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionType {
    #[default]
    Invalid,
    Code,
    Container,
    Data,
    DataCString,
    Debug,
    ZeroFill,
    EhFrame,
    ElfSymbolTable,
    ElfDynamicSymbols,
    AbsoluteAddress,
    #[serde(other)]
    Other,
}

/// Source language of a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LanguageType {
    C,
    C89,
    C99,
    C11,
    CPlusPlus,
    CPlusPlus03,
    CPlusPlus11,
    CPlusPlus14,
    ObjC,
    ObjCPlusPlus,
    Rust,
    Swift,
    #[default]
    #[serde(other)]
    Unknown,
}

bitflags::bitflags! {
    /// Type classification bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u32 {
        const HAS_CHILDREN = 1 << 0;
        const HAS_VALUE = 1 << 1;
        const IS_ARRAY = 1 << 2;
        const IS_BLOCK = 1 << 3;
        const IS_BUILTIN = 1 << 4;
        const IS_CLASS = 1 << 5;
        const IS_CPLUSPLUS = 1 << 6;
        const IS_ENUMERATION = 1 << 7;
        const IS_FUNC_PROTOTYPE = 1 << 8;
        const IS_MEMBER = 1 << 9;
        const IS_OBJC = 1 << 10;
        const IS_POINTER = 1 << 11;
        const IS_REFERENCE = 1 << 12;
        const IS_STRUCT_UNION = 1 << 13;
        const IS_TEMPLATE = 1 << 14;
        const IS_TYPEDEF = 1 << 15;
        const IS_VECTOR = 1 << 16;
        const IS_SCALAR = 1 << 17;
        const IS_INTEGER = 1 << 18;
        const IS_FLOAT = 1 << 19;
        const IS_COMPLEX = 1 << 20;
        const IS_SIGNED = 1 << 21;
    }
}

bitflags::bitflags! {
    /// Which [`FrameInfo`] fields to compute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameInfoFlags: u32 {
        const FUNCNAME = 1 << 0;
        const RETURNTYPE = 1 << 1;
        const ARGS = 1 << 2;
        const LANGUAGE = 1 << 3;
        const MODULE = 1 << 4;
        const STACKRANGE = 1 << 5;
        const FRAME = 1 << 6;
        const DEBUGINFO = 1 << 7;
        const STALECODE = 1 << 8;
        const FUNCNAME_ARGS_TYPES = 1 << 10;
        const FUNCNAME_ARGS_NAMES = 1 << 11;
        const FUNCNAME_ARGS_VALUES = 1 << 12;
        const FUNCNAME_MODULE = 1 << 13;
    }
}

/// Flag sets travel as their raw bits; bits this side does not know
/// are kept.
macro_rules! raw_bits_serde {
    ($($name:ident),*) => {$(
        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u32(self.bits())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                u32::deserialize(deserializer).map(Self::from_bits_retain)
            }
        }
    )*};
}

raw_bits_serde!(TypeFlags, FrameInfoFlags);

/// A file path split the way the debugger stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSpec {
    pub directory: String,
    pub filename: String,
}

impl FileSpec {
    pub fn new(directory: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    /// `directory/filename`, or just the filename when there is no
    /// directory.
    pub fn path(&self) -> String {
        if self.directory.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.directory.trim_end_matches('/'), self.filename)
        }
    }
}

/// A source position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineEntry {
    pub file_name: String,
    pub directory: String,
    pub line: u32,
    pub column: u32,
}

/// Frame description for the call stack window, filled in according
/// to the requested [`FrameInfoFlags`]. `M` is the module: a raw
/// handle as received, a proxy once wrapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameInfo<M = ModuleHandle> {
    pub valid_fields: FrameInfoFlags,
    pub func_name: String,
    pub return_type: String,
    pub args: String,
    pub language: String,
    pub module_name: String,
    pub module: Option<M>,
    pub addr_min: u64,
    pub addr_max: u64,
    pub has_debug_info: bool,
    pub stale_code: bool,
}

impl<M> FrameInfo<M> {
    pub fn map_module<N>(self, f: impl FnOnce(M) -> Option<N>) -> FrameInfo<N> {
        FrameInfo {
            valid_fields: self.valid_fields,
            func_name: self.func_name,
            return_type: self.return_type,
            args: self.args,
            language: self.language,
            module_name: self.module_name,
            module: self.module.and_then(f),
            addr_min: self.addr_min,
            addr_max: self.addr_max,
            has_debug_info: self.has_debug_info,
            stale_code: self.stale_code,
        }
    }
}

/// A frame handle paired with its description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameWithInfo {
    pub frame: FrameHandle,
    pub info: Option<FrameInfo>,
}

/// Memory range of a frame's stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressRange {
    pub address_min: u64,
    pub address_max: u64,
}

/// One disassembled instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstructionInfo {
    pub address: u64,
    pub operands: String,
    pub mnemonic: String,
    pub comment: String,
    pub line_entry: Option<LineEntry>,
    pub symbol_name: Option<String>,
}

/// Every immutable field of a value plus its value and summary under
/// one format, returned by a single cached-view call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueInfo {
    #[serde(rename = "type")]
    pub type_info: Option<TypeHandle>,
    pub type_name: String,
    pub expression_path: String,
    pub has_expression_path: bool,
    pub num_children: u32,
    pub summary: String,
    pub value: String,
    pub value_type: ValueType,
    pub is_pointer_type: bool,
    pub byte_size: u64,
}

/// Breakpoint details attached to breakpoint events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakpointEventData {
    pub event_type: u32,
    pub breakpoint_id: i32,
}

/// A debugger event delivered to a listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    pub event_type: u32,
    pub description: String,
    pub has_process_resumed: bool,
    pub is_breakpoint_event: bool,
    pub state_type: StateType,
    pub breakpoint_data: Option<BreakpointEventData>,
}

impl Event {
    pub const STATE_CHANGED: u32 = 1 << 0;
    pub const INTERRUPT: u32 = 1 << 1;
    pub const STDOUT: u32 = 1 << 2;
    pub const STDERR: u32 = 1 << 3;

    pub fn is_state_change(&self) -> bool {
        self.event_type & Self::STATE_CHANGED != 0
    }
}

/// Outcome of placing a function-offset breakpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakpointError {
    Success,
    NoFunctionLocation,
    NoFunctionFound,
    PositionNotAvailable,
    /// The call failed or the debugger sent a value this client does
    /// not know.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Output of a shell command run on the remote platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellCommand {
    pub command: String,
    pub working_directory: Option<String>,
    pub timeout_seconds: u32,
    pub status: i32,
    pub signal: i32,
    pub output: String,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }
}

/// Options for connecting a platform to a remote stub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectOptions {
    pub url: String,
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_enum_names_fall_back() {
        let reason: StopReason = serde_json::from_value(json!("somethingNew")).unwrap();
        assert_eq!(reason, StopReason::Invalid);
        let section: SectionType = serde_json::from_value(json!("dwarfDebugInfo")).unwrap();
        assert_eq!(section, SectionType::Other);
    }

    #[test]
    fn formats_serialize_camel_case() {
        assert_eq!(serde_json::to_value(ValueFormat::HexUppercase).unwrap(), json!("hexUppercase"));
        assert_eq!(serde_json::to_value(ValueFormat::Default).unwrap(), json!("default"));
    }

    #[test]
    fn flag_sets_combine() {
        let flags = FrameInfoFlags::FUNCNAME | FrameInfoFlags::MODULE;
        assert!(flags.contains(FrameInfoFlags::FUNCNAME));
        assert!(!flags.contains(FrameInfoFlags::ARGS));
        assert_eq!(serde_json::to_value(flags).unwrap(), json!(17));
        assert!(TypeFlags::empty().bits() == 0);
        let unknown: FrameInfoFlags = serde_json::from_value(json!(1 << 30 | 1)).unwrap();
        assert!(unknown.contains(FrameInfoFlags::FUNCNAME));
        assert_eq!(unknown.bits(), 1 << 30 | 1);
    }

    #[test]
    fn frame_info_module_is_mapped() {
        let info: FrameInfo = serde_json::from_value(json!({
            "validFields": 16,
            "moduleName": "libc.so",
            "module": { "id": 5 }
        }))
        .unwrap();
        let mapped = info.map_module(|m| Some(m.id));
        assert_eq!(mapped.module, Some(5));
        assert_eq!(mapped.module_name, "libc.so");
        assert!(mapped.valid_fields.contains(FrameInfoFlags::MODULE));
    }

    #[test]
    fn return_status_success_variants() {
        assert!(ReturnStatus::SuccessFinishResult.is_success());
        assert!(!ReturnStatus::Failed.is_success());
        assert!(!ReturnStatus::Invalid.is_success());
    }

    #[test]
    fn file_spec_path_joins_parts() {
        assert_eq!(FileSpec::new("/src/", "main.cc").path(), "/src/main.cc");
        assert_eq!(FileSpec::new("", "main.cc").path(), "main.cc");
    }

    #[test]
    fn event_state_change_bit() {
        let event = Event {
            event_type: Event::STATE_CHANGED | Event::STDOUT,
            ..Event::default()
        };
        assert!(event.is_state_change());
        assert!(!Event::default().is_state_change());
    }
}
