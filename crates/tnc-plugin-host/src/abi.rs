//! IF-IMC/IF-IMV function-pointer ABI (spec §4.2).
//!
//! These typedefs mirror the C calling convention the original IF-IMC/IF-IMV
//! headers define: plain `u32` ids and result codes, raw buffer pointers with
//! explicit lengths, and `extern "C"` linkage throughout. Nothing here is
//! exposed past [`crate::imc`]/[`crate::imv`]; callers of this crate never
//! see a raw function pointer.

use std::os::raw::{c_char, c_void};
use tnc_types::{ConnectionState, Severity};

pub type ResultCode = u32;

pub const SUCCESS: ResultCode = 0;
pub const NOT_INITIALIZED: ResultCode = 1;
pub const ALREADY_INITIALIZED: ResultCode = 2;
pub const INVALID_PARAMETER: ResultCode = 3;
pub const NO_COMMON_VERSION: ResultCode = 4;
pub const FATAL: ResultCode = 5;

pub fn severity_from_u32(v: u32) -> Severity {
    match v {
        0 => Severity::Err,
        1 => Severity::Warning,
        2 => Severity::Notice,
        4 => Severity::Debug,
        _ => Severity::Info,
    }
}

/// Wire encoding of `NotifyConnectionChange`'s `new_state` parameter.
/// Original `libtnc.h` only ships the log-severity numbering; these six
/// codes are assigned here in the order `libtnctncc.c`/`libtnctncs.c` list
/// the states (Create, Handshake, the three access outcomes, Delete).
pub const STATE_CREATE: u32 = 0;
pub const STATE_HANDSHAKE: u32 = 1;
pub const STATE_ACCESS_ALLOWED: u32 = 2;
pub const STATE_ACCESS_ISOLATED: u32 = 3;
pub const STATE_ACCESS_NONE: u32 = 4;
pub const STATE_DELETE: u32 = 5;

pub const fn connection_state_to_u32(state: ConnectionState) -> u32 {
    match state {
        ConnectionState::Create => STATE_CREATE,
        ConnectionState::Handshake => STATE_HANDSHAKE,
        ConnectionState::AccessAllowed => STATE_ACCESS_ALLOWED,
        ConnectionState::AccessIsolated => STATE_ACCESS_ISOLATED,
        ConnectionState::AccessNone => STATE_ACCESS_NONE,
        ConnectionState::Delete => STATE_DELETE,
    }
}

// --- Entry points the plugin exports, the host calls -----------------------

pub type InitializeFn =
    unsafe extern "C" fn(id: u32, min_version: u32, max_version: u32, out_version: *mut u32) -> ResultCode;
pub type NotifyConnectionChangeFn = unsafe extern "C" fn(id: u32, conn_id: u32, new_state: u32) -> ResultCode;
pub type BeginHandshakeFn = unsafe extern "C" fn(imc_id: u32, conn_id: u32) -> ResultCode;
pub type SolicitRecommendationFn = unsafe extern "C" fn(imv_id: u32, conn_id: u32) -> ResultCode;
pub type ReceiveMessageFn =
    unsafe extern "C" fn(id: u32, conn_id: u32, msg: *const u8, msg_len: u32, msg_type: u32) -> ResultCode;
pub type BatchEndingFn = unsafe extern "C" fn(id: u32, conn_id: u32) -> ResultCode;
pub type TerminateFn = unsafe extern "C" fn(id: u32) -> ResultCode;
pub type BindFunctionFn =
    unsafe extern "C" fn(id: u32, name: *const c_char, out_fn: *mut *mut c_void) -> ResultCode;
pub type ProvideBindFunctionFn = unsafe extern "C" fn(id: u32, bind_fn: BindFunctionFn) -> ResultCode;

// --- Callbacks the host exports, the plugin calls through bindFunction -----

pub type ReportMessageTypesFn = unsafe extern "C" fn(id: u32, types: *const u32, count: u32) -> ResultCode;
pub type RequestHandshakeRetryFn = unsafe extern "C" fn(id: u32, conn_id: u32, reason: u32) -> ResultCode;
pub type SendMessageFn =
    unsafe extern "C" fn(id: u32, conn_id: u32, msg: *const u8, msg_len: u32, msg_type: u32) -> ResultCode;
pub type LogMessageFn = unsafe extern "C" fn(severity: u32, message: *const c_char) -> ResultCode;
pub type ProvideRecommendationFn = unsafe extern "C" fn(imv_id: u32, conn_id: u32, rec: u32, eval: u32) -> ResultCode;
pub type GetAttributeFn =
    unsafe extern "C" fn(conn_id: u32, attr_id: u32, buf: *mut u8, buf_len: u32, out_len: *mut u32) -> ResultCode;
pub type SetAttributeFn =
    unsafe extern "C" fn(conn_id: u32, attr_id: u32, buf: *const u8, buf_len: u32) -> ResultCode;
