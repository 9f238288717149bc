//! Device identity template and sysinfo reply construction.
//!
//! The template describes a KL130B smart bulb: model, firmware/hardware
//! versions, MAC-derived identifiers and capability flags. It is parsed
//! fresh for every reply and the live fields (`temperature`, `humidity`,
//! `err_code`) are inserted into the cloned document, so no request can
//! leak state into the next one.

use serde_json::Value;

use crate::error::{KasaError, Result};

/// Static device identity, serialized into every sysinfo reply.
const SYSINFO_TEMPLATE: &str = r#"{
    "system": {
        "get_sysinfo": {
            "sw_ver": "1.0.0 Build 000001 Rel.000001",
            "hw_ver": "1.0",
            "model": "KL130B(UN)",
            "deviceId": "80121C1874CF2DEA94DF3127F8DDF7D71DD7112F",
            "oemId": "E45F76AD3AF13E60B58D6F68739CD7E5",
            "hwId": "1E97141B9F0E939BD8F9679F0B6167C8",
            "rssi": -71,
            "latitude_i": 0,
            "longitude_i": 0,
            "alias": "Back Light",
            "status": "new",
            "description": "WiFi BLE Smart Bulb Bridge",
            "mic_type": "IOT.SMARTBULB",
            "mic_mac": "C0C9E3AD7C1D",
            "dev_state": "normal",
            "is_factory": false,
            "disco_ver": "1.0",
            "ctrl_protocols": {
                "name": "Linkie",
                "version": "1.0"
            },
            "active_mode": "none",
            "is_dimmable": 1,
            "is_color": 1,
            "is_variable_color_temp": 1,
            "light_state": {
                "on_off": 0
            },
            "err_code": 0
        }
    }
}"#;

/// Build a sysinfo reply document with live sensor readings.
///
/// The template is parsed per call (deep clone, never a shared mutable
/// document). `temperature` and `humidity` land under
/// `system.get_sysinfo`, alongside `err_code = 0`.
pub fn build_sysinfo_reply(temperature: f64, humidity: f64) -> Result<Value> {
    let mut document: Value = serde_json::from_str(SYSINFO_TEMPLATE)?;

    let sysinfo = document
        .get_mut("system")
        .and_then(|s| s.get_mut("get_sysinfo"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| KasaError::Protocol("sysinfo template missing system.get_sysinfo".into()))?;

    // JSON has no NaN/Inf; non-finite readings degrade to zero like any
    // other failed read.
    sysinfo.insert("temperature".into(), finite_or_zero(temperature).into());
    sysinfo.insert("humidity".into(), finite_or_zero(humidity).into());
    sysinfo.insert("err_code".into(), 0.into());

    Ok(document)
}

fn finite_or_zero(reading: f64) -> f64 {
    if reading.is_finite() {
        reading
    } else {
        0.0
    }
}
