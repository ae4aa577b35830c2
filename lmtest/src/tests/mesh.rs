use anyhow::Result;
use serde_json::{Value, json};

use crate::define_test;
use crate::tests::{Test, TestContext};

pub fn get_tests() -> Vec<Test> {
    vec![
        define_test!(
            "Client Process",
            "Verify the vwifi client is still running",
            test_client_process
        ),
        define_test!(
            "Radio Count",
            "Verify the expected number of phys is enumerated",
            test_radio_count
        ),
        define_test!(
            "Mesh Interface",
            "Verify the mesh interface exists",
            test_mesh_interface
        ),
        define_test!(
            "Station Peers",
            "Verify all confederate stations are associated",
            test_station_peers
        ),
    ]
}

async fn test_client_process(ctx: &mut TestContext<'_>) -> Result<Value> {
    ctx.bringup.verify_client_running(ctx.shell).await?;

    Ok(json!({
        "client": ctx.bringup.remote_path,
        "running": true,
    }))
}

async fn test_radio_count(ctx: &mut TestContext<'_>) -> Result<Value> {
    let phys = ctx.bringup.assert_phy_count(ctx.shell).await?;

    Ok(json!({
        "phys": phys,
        "expected": ctx.bringup.expected_phys,
    }))
}

async fn test_mesh_interface(ctx: &mut TestContext<'_>) -> Result<Value> {
    let present = ctx.bringup.interface_present(ctx.shell).await?;
    anyhow::ensure!(
        present,
        "Interface {ifname} not listed",
        ifname = ctx.bringup.mesh_ifname
    );

    Ok(json!({
        "interface": ctx.bringup.mesh_ifname,
        "present": present,
    }))
}

async fn test_station_peers(ctx: &mut TestContext<'_>) -> Result<Value> {
    ctx.bringup.assert_stations(ctx.shell).await?;

    Ok(json!({
        "interface": ctx.bringup.mesh_ifname,
        "peers": ctx.bringup.peer_macs,
    }))
}
