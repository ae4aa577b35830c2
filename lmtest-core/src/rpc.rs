use anyhow::{Result, ensure};
use serde_json::{Value, json};
use tracing::debug;

use crate::session::ShellSession;

/// Invoke `ubus call <namespace> <method>` on the target and decode the JSON
/// response.
///
/// Output that fails to decode yields an empty object instead of an error, so
/// callers must check for the keys they expect; an empty object can mean
/// either "nothing to report" or "unparseable response".
pub async fn ubus_call(
    session: &ShellSession,
    namespace: &str,
    method: &str,
    params: Option<&Value>,
) -> Result<Value> {
    let params = params.cloned().unwrap_or_else(|| json!({}));
    let command = format!("ubus call {namespace} {method} '{params}'");
    let stdout = session.run_check(&command).await?;
    Ok(decode_output(&stdout))
}

/// Join line-oriented command output and parse it as JSON, degrading to an
/// empty object on decode failure.
pub(crate) fn decode_output(lines: &[String]) -> Value {
    let joined = lines.join("\n");
    match serde_json::from_str(&joined) {
        Ok(value) => value,
        Err(e) => {
            debug!("ubus output did not decode as JSON: {e}");
            json!({})
        }
    }
}

/// Extract the JSON object embedded in mixed text output, from the first `{`
/// to the last `}`. Shared-state commands interleave log lines with their
/// JSON payload.
pub fn extract_json_from_mixed(text: &str) -> Result<Value> {
    let start = text.find('{');
    let end = text.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        anyhow::bail!("Could not find JSON in output:\n{text}");
    };
    ensure!(end > start, "Could not find JSON in output:\n{text}");

    serde_json::from_str(&text[start..=end])
        .map_err(|e| anyhow::anyhow!("Embedded JSON failed to parse: {e}\n{text}"))
}
