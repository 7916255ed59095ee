#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/* Action results go to stdout, either as plain lines or collected into one JSON object
 * printed at the end. Diagnostics never come through here, they go to the logger. */
static JSON_OUTPUT: Mutex<BTreeMap<String, Value>> = Mutex::new(BTreeMap::new());
static JSON_MODE: Mutex<bool> = Mutex::new(false);

pub fn set_json_mode(json: bool) {
    *JSON_MODE.lock().expect("Failed to lock JSON_MODE") = json;
}

pub fn json_mode() -> bool {
    *JSON_MODE.lock().expect("Failed to lock JSON_MODE")
}

pub fn print_output(printed_output: &str) {
    if !json_mode() {
        println!("{}", printed_output);
    }
}

pub fn set_json_output(key: &str, value: Value) {
    JSON_OUTPUT
        .lock()
        .expect("Failed to lock JSON_OUTPUT")
        .insert(key.to_string(), value);
}

#[macro_export]
macro_rules! outln {
    ( $fmt:expr $(, $args:expr)*) => {
        $crate::util::print_output(&format!($fmt $(, $args)*))
    };
}

pub fn render_json_output() -> Result<String> {
    let map: serde_json::Map<String, Value> = JSON_OUTPUT
        .lock()
        .expect("Failed to lock JSON_OUTPUT")
        .clone()
        .into_iter()
        .collect();
    serde_json::to_string_pretty(&Value::Object(map))
        .context("Error serializing JSON")
}

pub fn print_json_output() -> Result<()> {
    println!("{}", render_json_output()?);
    Ok(())
}
