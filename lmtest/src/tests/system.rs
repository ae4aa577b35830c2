use anyhow::Result;
use serde_json::{Value, json};

use crate::define_test;
use crate::tests::{Test, TestContext};

use lmtest_core::rpc::ubus_call;

pub fn get_tests() -> Vec<Test> {
    vec![
        define_test!(
            "Board Info",
            "Query board identity over ubus",
            test_board_info
        ),
        define_test!(
            "System Info",
            "Query runtime system state over ubus",
            test_system_info
        ),
    ]
}

async fn test_board_info(ctx: &mut TestContext<'_>) -> Result<Value> {
    let board = ubus_call(ctx.shell, "system", "board", None).await?;

    // An empty object here can also mean the response failed to decode, so
    // check for the keys we actually need.
    let hostname = board.get("hostname").and_then(Value::as_str);
    anyhow::ensure!(
        hostname.is_some(),
        "ubus system board returned no hostname: {board}"
    );

    Ok(json!({
        "hostname": hostname,
        "model": board.get("model"),
        "release": board.get("release"),
    }))
}

async fn test_system_info(ctx: &mut TestContext<'_>) -> Result<Value> {
    let info = ubus_call(ctx.shell, "system", "info", None).await?;

    anyhow::ensure!(
        info.get("uptime").is_some(),
        "ubus system info returned no uptime: {info}"
    );

    Ok(json!({
        "uptime": info.get("uptime"),
        "load": info.get("load"),
        "memory": info.get("memory"),
    }))
}
