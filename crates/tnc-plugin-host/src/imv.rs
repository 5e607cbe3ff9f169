//! IMV-side plugin host (spec §2 C4, §4.2). See [`crate::imc`] for the
//! rationale behind keeping the two sides as separate, non-generic modules.

use libloading::Library;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tnc_collections::SlotTable;
use tnc_telemetry::{default_log_hook, SharedLogHook};
use tnc_types::{
    AttributeId, MessageType, Recommendation, TncError, TncResult, DEFAULT_PLUGIN_CAP, TNC_VERSION_1,
};

use crate::abi::{self, severity_from_u32};
use crate::config::parse_config_lines;
use crate::ports::ImvPort;

struct ImvRecord {
    library_path: String,
    _library: Library,
    subscriptions: Vec<MessageType>,
    initialize: abi::InitializeFn,
    notify_connection_change: Option<abi::NotifyConnectionChangeFn>,
    solicit_recommendation: abi::SolicitRecommendationFn,
    receive_message: Option<abi::ReceiveMessageFn>,
    batch_ending: Option<abi::BatchEndingFn>,
    terminate: Option<abi::TerminateFn>,
    provide_bind_function: abi::ProvideBindFunctionFn,
}

struct ImvGlobal {
    slots: SlotTable<ImvRecord>,
    port: Option<Arc<dyn ImvPort>>,
    log_hook: SharedLogHook,
}

static IMV_GLOBAL: OnceLock<Mutex<ImvGlobal>> = OnceLock::new();

fn global() -> &'static Mutex<ImvGlobal> {
    IMV_GLOBAL.get_or_init(|| {
        Mutex::new(ImvGlobal {
            slots: SlotTable::new(DEFAULT_PLUGIN_CAP),
            port: None,
            log_hook: default_log_hook(),
        })
    })
}

pub struct ImvHost;

impl ImvHost {
    pub fn set_port(port: Arc<dyn ImvPort>) {
        global().lock().port = Some(port);
    }

    pub fn set_log_hook(hook: SharedLogHook) {
        global().lock().log_hook = hook;
    }

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

        let initialize: abi::InitializeFn = required!("TNC_IMV_Initialize");
        let provide_bind_function: abi::ProvideBindFunctionFn = required!("TNC_IMV_ProvideBindFunction");
        let solicit_recommendation: abi::SolicitRecommendationFn = required!("TNC_IMV_SolicitRecommendation");
        let notify_connection_change = optional!("TNC_IMV_NotifyConnectionChange");
        let receive_message = optional!("TNC_IMV_ReceiveMessage");
        let batch_ending = optional!("TNC_IMV_BatchEnding");
        let terminate = optional!("TNC_IMV_Terminate");

        let record = ImvRecord {
            library_path: path.clone(),
            _library: library,
            subscriptions: Vec::new(),
            initialize,
            notify_connection_change,
            solicit_recommendation,
            receive_message,
            batch_ending,
            terminate,
            provide_bind_function,
        };

        let id = {
            let mut g = global().lock();
            g.slots
                .reserve(record)
                .ok_or_else(|| TncError::Fatal("IMV plugin slot table is full".into()))?
        };

        let mut out_version = 0u32;
        let init_code = unsafe { initialize(id, TNC_VERSION_1, TNC_VERSION_1, &mut out_version) };
        if init_code != abi::SUCCESS {
            global().lock().slots.release(id);
            return Err(TncError::Fatal(format!(
                "{path}: TNC_IMV_Initialize returned {init_code}"
            )));
        }

        let bind_code = unsafe { provide_bind_function(id, imv_bind_function) };
        if bind_code != abi::SUCCESS {
            global().lock().slots.release(id);
            return Err(TncError::Fatal(format!(
                "{path}: TNC_IMV_ProvideBindFunction returned {bind_code}"
            )));
        }

        Ok(id)
    }

    pub fn load_config(path: &Path) -> i32 {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return -1;
        };
        let mut loaded = 0i32;
        for lib_path in parse_config_lines(&contents, "IMV") {
            match Self::load(&lib_path) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!("failed to load IMV {lib_path}: {e}"),
            }
        }
        loaded
    }

    pub fn load_std_config() -> i32 {
        if cfg!(windows) {
            tracing::warn!("registry-based IMV enumeration has no portable analogue here");
            return -1;
        }
        let path = std::env::var("TNC_CONFIG_PATH").unwrap_or_else(|_| "/etc/tnc_config".to_string());
        Self::load_config(Path::new(&path))
    }

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
                tracing::warn!("IMV {id} ({path}) NotifyConnectionChange returned {code}");
            }
        }
    }

    /// Spec §4.4: TNCS solicits a recommendation from every IMV at the start
    /// of a handshake, mirroring TNCC's `begin_handshake_all`.
    pub fn solicit_recommendation_all(conn_id: u32) {
        let calls: Vec<(u32, abi::SolicitRecommendationFn)> = {
            let g = global().lock();
            g.slots.iter().map(|(id, r)| (id, r.solicit_recommendation)).collect()
        };
        for (id, f) in calls {
            let code = unsafe { f(id, conn_id) };
            if code != abi::SUCCESS {
                tracing::warn!("IMV {id} SolicitRecommendation returned {code}");
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
            tracing::warn!("IMV {id} ReceiveMessage returned {code}");
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
                tracing::warn!("IMV {id} BatchEnding returned {code}");
            }
        }
    }

    pub fn terminate_all() {
        let ids: Vec<u32> = global().lock().slots.iter().map(|(id, _)| id).collect();
        for id in ids {
            let f = global().lock().slots.get(id).and_then(|r| r.terminate);
            if let Some(f) = f {
                let code = unsafe { f(id) };
                if code != abi::SUCCESS {
                    tracing::warn!("IMV {id} Terminate returned {code}");
                }
            }
        }
        global().lock().slots.reset();
    }
}

unsafe extern "C" fn imv_bind_function(id: u32, name: *const c_char, out_fn: *mut *mut c_void) -> abi::ResultCode {
    if name.is_null() || out_fn.is_null() {
        return abi::INVALID_PARAMETER;
    }
    let name = CStr::from_ptr(name).to_string_lossy();
    match name.as_ref() {
        "TNC_TNCS_ReportMessageTypes" => {
            *out_fn = imv_report_message_types as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCS_RequestHandshakeRetry" => {
            *out_fn = imv_request_handshake_retry as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCS_SendMessage" => {
            *out_fn = imv_send_message as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCS_LogMessage" => {
            *out_fn = imv_log_message as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCS_ProvideRecommendation" => {
            *out_fn = imv_provide_recommendation as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCS_GetAttribute" => {
            *out_fn = imv_get_attribute as *mut c_void;
            abi::SUCCESS
        }
        "TNC_TNCS_SetAttribute" => {
            *out_fn = imv_set_attribute as *mut c_void;
            abi::SUCCESS
        }
        _ => {
            let _ = id;
            abi::INVALID_PARAMETER
        }
    }
}

unsafe extern "C" fn imv_report_message_types(id: u32, types: *const u32, count: u32) -> abi::ResultCode {
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

unsafe extern "C" fn imv_request_handshake_retry(id: u32, conn_id: u32, _reason: u32) -> abi::ResultCode {
    tracing::debug!("IMV {id} requested a handshake retry on connection {conn_id}");
    abi::SUCCESS
}

unsafe extern "C" fn imv_send_message(id: u32, conn_id: u32, msg: *const u8, msg_len: u32, msg_type: u32) -> abi::ResultCode {
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

unsafe extern "C" fn imv_log_message(severity: u32, message: *const c_char) -> abi::ResultCode {
    if message.is_null() {
        return abi::INVALID_PARAMETER;
    }
    let text = CStr::from_ptr(message).to_string_lossy().into_owned();
    let hook = global().lock().log_hook.clone();
    hook.log(severity_from_u32(severity), &text);
    abi::SUCCESS
}

unsafe extern "C" fn imv_provide_recommendation(imv_id: u32, conn_id: u32, rec: u32, eval: u32) -> abi::ResultCode {
    let recommendation = match rec {
        0 => Recommendation::Allow,
        1 => Recommendation::NoAccess,
        2 => Recommendation::Isolate,
        3 => Recommendation::NoRecommendation,
        _ => return abi::INVALID_PARAMETER,
    };
    let port = global().lock().port.clone();
    let Some(port) = port else {
        return abi::FATAL;
    };
    match port.provide_recommendation(imv_id, conn_id, recommendation, eval as i32) {
        Ok(()) => abi::SUCCESS,
        Err(_) => abi::FATAL,
    }
}

unsafe extern "C" fn imv_get_attribute(
    conn_id: u32,
    attr_id: u32,
    buf: *mut u8,
    buf_len: u32,
    out_len: *mut u32,
) -> abi::ResultCode {
    if out_len.is_null() {
        return abi::INVALID_PARAMETER;
    }
    let Some(attr) = AttributeId::from_u32(attr_id) else {
        return abi::INVALID_PARAMETER;
    };
    let port = global().lock().port.clone();
    let Some(port) = port else {
        return abi::FATAL;
    };
    match port.get_attribute(conn_id, attr) {
        Ok(value) => {
            *out_len = value.len() as u32;
            if !buf.is_null() && (buf_len as usize) >= value.len() {
                std::ptr::copy_nonoverlapping(value.as_ptr(), buf, value.len());
            }
            abi::SUCCESS
        }
        Err(_) => abi::INVALID_PARAMETER,
    }
}

unsafe extern "C" fn imv_set_attribute(conn_id: u32, attr_id: u32, buf: *const u8, buf_len: u32) -> abi::ResultCode {
    let Some(attr) = AttributeId::from_u32(attr_id) else {
        return abi::INVALID_PARAMETER;
    };
    if buf.is_null() && buf_len > 0 {
        return abi::INVALID_PARAMETER;
    }
    let value = if buf_len == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(buf, buf_len as usize)
    };
    let port = global().lock().port.clone();
    let Some(port) = port else {
        return abi::FATAL;
    };
    match port.set_attribute(conn_id, attr, value) {
        Ok(()) => abi::SUCCESS,
        Err(_) => abi::INVALID_PARAMETER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_nonexistent_library_is_fatal() {
        let err = ImvHost::load("/no/such/imv.so").unwrap_err();
        assert!(matches!(err, TncError::Fatal(_)));
    }

    #[test]
    fn load_config_reports_minus_one_on_missing_file() {
        assert_eq!(ImvHost::load_config(Path::new("/no/such/tnc_config")), -1);
    }
}
