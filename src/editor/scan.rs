use serde_json::Value;

const IMAGE_TYPE_KEY: &str = "type";
const IMAGE_VALUE_KEY: &str = "value";
const BASE64_DISCRIMINATOR: &str = "base64";

/// Collect every embedded image payload in a segmentation result, depth
/// first. Array order is preserved; object members are visited in key order.
/// An embedded image is any object tagged `"type": "base64"` with a string
/// `"value"`, whatever key holds it.
///
/// When the result carries an `outputs` array only that array is scanned,
/// otherwise the whole result is.
pub fn embedded_images(result: &Value) -> Vec<String> {
    let root = match result.get("outputs") {
        Some(outputs @ Value::Array(_)) => outputs,
        _ => result,
    };
    let mut found = Vec::new();
    collect(root, &mut found);
    found
}

fn collect(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(payload) = embedded_payload(map) {
                found.push(payload.to_string());
                return;
            }
            for child in map.values() {
                collect(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, found);
            }
        }
        _ => {}
    }
}

fn embedded_payload(map: &serde_json::Map<String, Value>) -> Option<&str> {
    let tag = map.get(IMAGE_TYPE_KEY)?.as_str()?;
    if tag != BASE64_DISCRIMINATOR {
        return None;
    }
    map.get(IMAGE_VALUE_KEY)?
        .as_str()
        .filter(|payload| !payload.trim().is_empty())
}
