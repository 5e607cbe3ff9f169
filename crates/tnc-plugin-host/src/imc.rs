//! IMC-side plugin host (spec §2 C4, §4.2). Symmetric with [`crate::imv`] —
//! the original `libtncimc.c`/`libtncimv.c` split is kept as two files here
//! rather than collapsed behind generics, since the two sides differ in
//! their mandatory entry point and callback set, not just in naming.

use libloading::Library;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tnc_collections::SlotTable;
use tnc_telemetry::{default_log_hook, SharedLogHook};
use tnc_types::{MessageType, TncError, TncResult, DEFAULT_PLUGIN_CAP, TNC_VERSION_1};

use crate::abi::{self, severity_from_u32};
use crate::config::parse_config_lines;
use crate::ports::ImcPort;

struct ImcRecord {
    library_path: String,
    // Kept alive for the lifetime of the record: every entry point below was
    // resolved from this handle and is only valid while it is open.
    _library: Library,
    subscriptions: Vec<MessageType>,
    initialize: abi::InitializeFn,
    notify_connection_change: Option<abi::NotifyConnectionChangeFn>,
    begin_handshake: abi::BeginHandshakeFn,
    receive_message: Option<abi::ReceiveMessageFn>,
    batch_ending: Option<abi::BatchEndingFn>,
    terminate: Option<abi::TerminateFn>,
    provide_bind_function: abi::ProvideBindFunctionFn,
}

struct ImcGlobal {
    slots: SlotTable<ImcRecord>,
    port: Option<Arc<dyn ImcPort>>,
    log_hook: SharedLogHook,
}

static IMC_GLOBAL: OnceLock<Mutex<ImcGlobal>> = OnceLock::new();

fn global() -> &'static Mutex<ImcGlobal> {
    IMC_GLOBAL.get_or_init(|| {
        Mutex::new(ImcGlobal {
            slots: SlotTable::new(DEFAULT_PLUGIN_CAP),
            port: None,
            log_hook: default_log_hook(),
        })
    })
}

/// The IMC-side plugin host (spec C4). All state lives behind a process-wide
/// mutex (spec §9 "Global mutable registries and singletons"); this type is
/// a zero-sized handle onto it.
pub struct ImcHost;

impl ImcHost {
    /// Wire the port this host forwards `send_message` calls through. Must
    /// be called once during `tncc` startup, before any plugin is loaded.
    pub fn set_port(port: Arc<dyn ImcPort>) {
        global().lock().port = Some(port);
    }

    pub fn set_log_hook(hook: SharedLogHook) {
        global().lock().log_hook = hook;
    }

    /// Load one plugin by shared-object path, run its handshake with the
    /// host (spec §4.2 initialization sequence), and register it.
    pub fn load(path: impl AsRef<str>) -> TncResult<u32> {
        let path = path.as_ref().to_string();
        let library = unsafe { Library::new(&path) }
            .map_err(|e| TncError::Fatal(format!("{path}: failed to open library: {e}")))?;

        macro_rules! required {
            ($name:literal) => {
                unsafe { library.get(concat!($name, "\0").as_bytes()) }
                    .map(|sym| *sym)
                    .map_err(|_| TncError::Fatal(format!("{path}: missing {}", $name)))?
            };
        }
        macro_rules! optional {
            ($name:literal) => {
                unsafe { library.get::<_>(concat!($name, "\0").as_bytes()) }
                    .ok()
                    .map(|sym| *sym)
            };
        }

        let initialize: abi::InitializeFn = required!("TNC_IMC_Initialize");
        let provide_bind_function: abi::ProvideBindFunctionFn = required!("TNC_IMC_ProvideBindFunction");
        let begin_handshake: abi::BeginHandshakeFn = required!("TNC_IMC_BeginHandshake");
        let notify_connection_change = optional!("TNC_IMC_NotifyConnectionChange");
        let receive_message = optional!("TNC_IMC_ReceiveMessage");
        let batch_ending = optional!("TNC_IMC_BatchEnding");
        let terminate = optional!("TNC_IMC_Terminate");

        let record = ImcRecord {
            library_path: path.clone(),
            _library: library,
            subscriptions: Vec::new(),
            initialize,
            notify_connection_change,
            begin_handshake,
            receive_message,
            batch_ending,
            terminate,
            provide_bind_function,
        };

        // Register before calling into the plugin: it may call back through
        // bindFunction using its id as soon as ProvideBindFunction returns,
        // and NotifyConnectionChange/BeginHandshake must find a record too.
        let id = {
            let mut g = global().lock();
            g.slots
                .reserve(record)
                .ok_or_else(|| TncError::Fatal("IMC plugin slot table is full".into()))?
        };

        let mut out_version = 0u32;
        let init_code = unsafe { initialize(id, TNC_VERSION_1, TNC_VERSION_1, &mut out_version) };
        if init_code != abi::SUCCESS {
            global().lock().slots.release(id);
            return Err(TncError::Fatal(format!(
                "{path}: TNC_IMC_Initialize returned {init_code}"
            )));
        }

        let bind_code = unsafe { provide_bind_function(id, imc_bind_function) };
        if bind_code != abi::SUCCESS {
            global().lock().slots.release(id);
            return Err(TncError::Fatal(format!(
                "{path}: TNC_IMC_ProvideBindFunction returned {bind_code}"
            )));
        }

        Ok(id)
    }

    /// Load every `IMC "<name>" <path>` line in a config file. Returns -1 if
    /// the file cannot be opened (spec §4.2), otherwise the count of plugins
    /// that loaded successfully; failures for individual lines are logged
    /// and skipped.
    pub fn load_config(path: &Path) -> i32 {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return -1;
        };
        let mut loaded = 0i32;
        for lib_path in parse_config_lines(&contents, "IMC") {
            match Self::load(&lib_path) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!("failed to load IMC {lib_path}: {e}"),
            }
        }
        loaded
    }

    /// Platform-default config location, overridable with `TNC_CONFIG_PATH`
    /// (spec §9: POSIX reads `/etc/tnc_config`; there is no registry-based
    /// enumeration to port on other platforms, so this fails there).
    pub fn load_std_config() -> i32 {
        if cfg!(windows) {
            tracing::warn!("registry-based IMC enumeration has no portable analogue here");
            return -1;
        }
        let path = std::env::var("TNC_CONFIG_PATH").unwrap_or_else(|_| "/etc/tnc_config".to_string());
        Self::load_config(Path::new(&path))
    }

    /// Subscriptions recorded so far, in slot order, for the router to fan a
    /// batch's messages out against.
    pub fn subscriptions_snapshot() -> Vec<(u32, Vec<MessageType>)> {
        global()
            .lock()
            .slots
            .iter()
            .map(|(id, r)| (id, r.subscriptions.clone()))
            .collect()
    }

    pub fn notify_all(conn_id: u32, new_state: u32) {
        let calls: Vec<(u32, String, abi::NotifyConnectionChangeFn)> = {
            let g = global().lock();
            g.slots
                .iter()
                .filter_map(|(id, r)| r.notify_connection_change.map(|f| (id, r.library_path.clone(), f)))
                .collect()
        };
        for (id, path, f) in calls {
            let code = unsafe { f(id, conn_id, new_state) };
            if code != abi::SUCCESS {
                tracing::warn!("IMC {id} ({path}) NotifyConnectionChange returned {code}");
            }
        }
    }

    pub fn begin_handshake_all(conn_id: u32) {
        let calls: Vec<(u32, abi::BeginHandshakeFn)> = {
            let g = global().lock();
            g.slots.iter().map(|(id, r)| (id, r.begin_handshake)).collect()
        };
        for (id, f) in calls {
            let code = unsafe { f(id, conn_id) };
            if code != abi::SUCCESS {
                tracing::warn!("IMC {id} BeginHandshake returned {code}");
            }
        }
    }

    pub fn deliver_message(id: u32, conn_id: u32, msg_type: MessageType, payload: &[u8]) {
        let f = {
            let g = global().lock();
            g.slots.get(id).and_then(|r| r.receive_message)
        };
        let Some(f) = f else { return };
        let code = unsafe { f(id, conn_id, payload.as_ptr(), payload.len() as u32, msg_type.to_u32()) };
        if code != abi::SUCCESS {
            tracing::warn!("IMC {id} ReceiveMessage returned {code}");
        }
    }

    pub fn batch_ending_all(conn_id: u32) {
        let calls: Vec<(u32, abi::BatchEndingFn)> = {
            let g = global().lock();
            g.slots
                .iter()
                .filter_map(|(id, r)| r.batch_ending.map(|f| (id, f)))
                .collect()
        };
        for (id, f) in calls {
            let code = unsafe { f(id, conn_id) };
            if code != abi::SUCCESS {
                tracing::warn!("IMC {id} BatchEnding returned {code}");
            }
        }
    }

    /// Call every loaded plugin's `Terminate`, then drop all records
    /// (closing their libraries) and reset id allocation.
    pub fn terminate_all() {
        let ids: Vec<u32> = global().lock().slots.iter().map(|(id, _)| id).collect();
        for id in ids {
            let f = global().lock().slots.get(id).and_then(|r| r.terminate);
            if let Some(f) = f {
                let code = unsafe { f(id) };
                if code != abi::SUCCESS {
                    tracing::warn!("IMC {id} Terminate returned {code}");
                }
            }
        }
        global().lock().slots.reset();
    }
}

// --- Reverse-ABI: functions the plugin calls back through bindFunction -----

unsafe extern "C" fn imc_bind_function(id: u32, name: *const c_char, out_fn: *mut *mut c_void) -> abi::ResultCode {
    if name.is_null() || out_fn.is_null() {
        return abi::INVALID_PARAMETER;
    }
    let name = CStr::from_ptr(name).to_string_lossy();
    match name.as_ref() {
        "TNC_TNCC_ReportMessageTypes" => {
            *out_fn = imc_report_message_types as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCC_RequestHandshakeRetry" => {
            *out_fn = imc_request_handshake_retry as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCC_SendMessage" => {
            *out_fn = imc_send_message as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCC_LogMessage" => {
            *out_fn = imc_log_message as *mut c_void;
            abi::SUCCESS
        }
        _ => {
            let _ = id;
            abi::INVALID_PARAMETER
        }
    }
}

unsafe extern "C" fn imc_report_message_types(id: u32, types: *const u32, count: u32) -> abi::ResultCode {
    if types.is_null() && count > 0 {
        return abi::INVALID_PARAMETER;
    }
    let parsed: Vec<MessageType> = if count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(types, count as usize)
            .iter()
            .map(|&raw| MessageType::from_u32(raw))
            .collect()
    };
    let mut g = global().lock();
    match g.slots.get_mut(id) {
        Some(record) => {
            record.subscriptions = parsed;
            abi::SUCCESS
        }
        None => abi::INVALID_PARAMETER,
    }
}

unsafe extern "C" fn imc_request_handshake_retry(id: u32, conn_id: u32, _reason: u32) -> abi::ResultCode {
    // Accepted but a no-op at this layer (spec §4.2): retriggering a
    // handshake is a TNCC connection-lifecycle decision, out of scope here.
    tracing::debug!("IMC {id} requested a handshake retry on connection {conn_id}");
    abi::SUCCESS
}

unsafe extern "C" fn imc_send_message(id: u32, conn_id: u32, msg: *const u8, msg_len: u32, msg_type: u32) -> abi::ResultCode {
    if msg.is_null() && msg_len > 0 {
        return abi::INVALID_PARAMETER;
    }
    let port = global().lock().port.clone();
    let Some(port) = port else {
        return abi::FATAL;
    };
    let payload = if msg_len == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(msg, msg_len as usize)
    };
    match port.send_message(conn_id, MessageType::from_u32(msg_type), payload) {
        Ok(()) => abi::SUCCESS,
        Err(_) => {
            let _ = id;
            abi::FATAL
        }
    }
}

unsafe extern "C" fn imc_log_message(severity: u32, message: *const c_char) -> abi::ResultCode {
    if message.is_null() {
        return abi::INVALID_PARAMETER;
    }
    let text = CStr::from_ptr(message).to_string_lossy().into_owned();
    let hook = global().lock().log_hook.clone();
    hook.log(severity_from_u32(severity), &text);
    abi::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_only_imc_lines() {
        let contents = "IMC \"a\" /a.so\nIMV \"b\" /b.so\n";
        assert_eq!(parse_config_lines(contents, "IMC"), vec!["/a.so".to_string()]);
    }

    #[test]
    fn load_nonexistent_library_is_fatal() {
        let err = ImcHost::load("/no/such/library.so").unwrap_err();
        assert!(matches!(err, TncError::Fatal(_)));
    }

    #[test]
    fn load_config_reports_minus_one_on_missing_file() {
        assert_eq!(ImcHost::load_config(Path::new("/no/such/tnc_config")), -1);
    }
}
