use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::session::ShellSession;

/// Mesh bring-up sequencer
///
/// Drives a target into a state where its virtualized radio has joined the
/// simulated mesh run by the host-side vwifi server: uploads the client
/// binary, reloads the virtual radio driver, launches the client and waits
/// for the mesh interface and its peers to show up.
///
/// The companion vwifi server must already be running on the host; this
/// sequencer never starts or stops it.
#[derive(Debug, Clone)]
pub struct BringUp {
    /// Local path of the vwifi client binary to upload.
    pub client_binary: PathBuf,
    /// Where the client lands on the target.
    pub remote_path: String,
    pub pid_file: String,
    pub log_file: String,
    /// Additional virtual radios requested from mac80211_hwsim. The node's
    /// own radio plus these, on top of the host side's two, puts the driver
    /// level at four.
    pub extra_radios: u32,
    pub expected_phys: usize,
    /// Interface name whose appearance marks the mesh as joined.
    pub mesh_ifname: String,
    /// Confederate MACs expected in the station dump.
    pub peer_macs: Vec<String>,
    pub reload_settle: Duration,
    pub up_settle: Duration,
    /// Deadline for the mesh interface to appear.
    pub interface_deadline: Duration,
}

impl Default for BringUp {
    fn default() -> Self {
        Self {
            client_binary: PathBuf::from("vwifi/vwifi-client"),
            remote_path: "/usr/bin/vwifi-client".to_string(),
            pid_file: "/var/run/vwifi-client.pid".to_string(),
            log_file: "/tmp/vwifi-client.log".to_string(),
            extra_radios: 2,
            expected_phys: 4,
            mesh_ifname: "wlan0-mesh".to_string(),
            peer_macs: vec![
                "02:00:00:00:00:01".to_string(),
                "02:00:00:00:00:02".to_string(),
                "02:00:00:00:00:03".to_string(),
            ],
            reload_settle: Duration::from_secs(5),
            up_settle: Duration::from_secs(10),
            interface_deadline: Duration::from_secs(120),
        }
    }
}

impl BringUp {
    pub fn with_interface_deadline(mut self, deadline: Duration) -> Self {
        self.interface_deadline = deadline;
        self
    }

    /// Run the full bring-up sequence. Assertion failures abort immediately;
    /// bring-up is not retried.
    pub async fn run(&self, session: &ShellSession) -> Result<()> {
        info!("Starting mesh bring-up");

        self.upload_client(session).await?;
        let host_ip = self.host_ipv4(session)?;
        self.reload_hwsim(session).await?;
        self.launch_client(session, host_ip).await?;
        self.verify_client_running(session).await?;
        self.restart_wifi(session).await?;
        self.assert_phy_count(session).await?;
        self.wait_for_interface(session).await?;
        self.assert_stations(session).await?;

        info!("Mesh bring-up complete");
        Ok(())
    }

    async fn upload_client(&self, session: &ShellSession) -> Result<()> {
        session
            .upload(&self.client_binary, &self.remote_path)
            .await?;
        session
            .run_check(&format!("chmod +x {path}", path = self.remote_path))
            .await?;

        let binary_name = self
            .remote_path
            .rsplit('/')
            .next()
            .unwrap_or(self.remote_path.as_str());
        let located = session
            .run_check(&format!("which {binary_name}"))
            .await
            .context("Uploaded client binary not found in PATH")?;
        ensure!(
            located.first().map(String::as_str) == Some(self.remote_path.as_str()),
            "Client binary resolved to {located:?}, expected {expected}",
            expected = self.remote_path
        );

        Ok(())
    }

    /// The host's own routable IPv4 address, as seen on the route toward the
    /// target. Connecting a UDP socket never sends a packet; it only selects
    /// the local address.
    ///
    /// Only link-layer or non-IPv4 addresses available is an unrecoverable
    /// setup error, not retried.
    fn host_ipv4(&self, session: &ShellSession) -> Result<Ipv4Addr> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).context("Failed to bind discovery socket")?;
        socket
            .connect((session.host(), 9))
            .with_context(|| format!("No route toward {host}", host = session.host()))?;

        match socket.local_addr().context("Discovery socket has no local address")?.ip() {
            IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => {
                debug!("Host IPv4 toward {host} is {ip}", host = session.host());
                Ok(ip)
            }
            other => bail!("No routable IPv4 address found on the host, got {other}"),
        }
    }

    async fn reload_hwsim(&self, session: &ShellSession) -> Result<()> {
        // The module may not be loaded yet.
        let _ = session.run("rmmod mac80211_hwsim").await?;
        session
            .run_check(&format!(
                "insmod mac80211_hwsim radios={radios}",
                radios = self.extra_radios
            ))
            .await?;
        Ok(())
    }

    async fn launch_client(&self, session: &ShellSession, host_ip: Ipv4Addr) -> Result<()> {
        let client_args = format!(
            "{host_ip} --number {radios}",
            radios = self.extra_radios
        );

        let supervised = session.run("which start-stop-daemon").await?.success();
        let command = if supervised {
            format!(
                "start-stop-daemon -S -b -m -p {pid} -a /bin/sh -- -c 'exec {bin} {args} > {log} 2>&1'",
                pid = self.pid_file,
                bin = self.remote_path,
                args = client_args,
                log = self.log_file
            )
        } else {
            format!(
                "{bin} {args} > {log} 2>&1 & echo $! > {pid}",
                bin = self.remote_path,
                args = client_args,
                log = self.log_file,
                pid = self.pid_file
            )
        };

        debug!("Launching vwifi client against {host_ip}");
        session.run_check(&command).await?;
        Ok(())
    }

    pub async fn verify_client_running(&self, session: &ShellSession) -> Result<()> {
        let binary_name = self
            .remote_path
            .rsplit('/')
            .next()
            .unwrap_or(self.remote_path.as_str());
        let procs = session
            .run_check(&format!("ps | grep {binary_name} | grep -v grep"))
            .await
            .context("vwifi client process not found")?;
        ensure!(!procs.is_empty(), "vwifi client process not found");
        Ok(())
    }

    async fn restart_wifi(&self, session: &ShellSession) -> Result<()> {
        session.run_check("wifi reload").await?;
        tokio::time::sleep(self.reload_settle).await;
        session.run_check("wifi up").await?;
        tokio::time::sleep(self.up_settle).await;
        Ok(())
    }

    /// One token per enumerated phy in the listing.
    pub async fn assert_phy_count(&self, session: &ShellSession) -> Result<usize> {
        let lines = session.run_check("iw phy | grep Wiphy").await?;
        let phys: Vec<&str> = lines
            .iter()
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        ensure!(
            phys.len() == self.expected_phys,
            "Expected {expected} phys, found {found}: {phys:?}",
            expected = self.expected_phys,
            found = phys.len()
        );
        Ok(phys.len())
    }

    pub async fn interface_present(&self, session: &ShellSession) -> Result<bool> {
        let output = session.run_check("iw dev").await?;
        Ok(output
            .iter()
            .any(|line| line.split_whitespace().any(|token| token == self.mesh_ifname)))
    }

    /// Poll until the mesh interface appears, with exponential backoff and a
    /// hard deadline.
    async fn wait_for_interface(&self, session: &ShellSession) -> Result<()> {
        let deadline = Instant::now() + self.interface_deadline;
        let mut delay = Duration::from_secs(2);

        loop {
            if self.interface_present(session).await? {
                return Ok(());
            }

            if Instant::now() + delay > deadline {
                bail!(
                    "Interface {ifname} did not appear within {deadline}",
                    ifname = self.mesh_ifname,
                    deadline = humantime::format_duration(self.interface_deadline)
                );
            }

            debug!(
                "Interface {ifname} not up yet, retrying in {delay:?}",
                ifname = self.mesh_ifname
            );
            tokio::time::sleep(delay).await;
            delay = next_delay(delay);
        }
    }

    pub async fn assert_stations(&self, session: &ShellSession) -> Result<()> {
        let lines = session
            .run_check(&format!(
                "iw dev {ifname} station dump",
                ifname = self.mesh_ifname
            ))
            .await?;
        let dump = lines.join("\n").to_lowercase();

        for mac in &self.peer_macs {
            ensure!(
                dump.contains(&mac.to_lowercase()),
                "Station {mac} missing from dump:\n{dump}"
            );
        }
        Ok(())
    }
}

/// Backoff schedule for the interface wait: doubling, capped at 10 seconds.
pub(crate) fn next_delay(current: Duration) -> Duration {
    (current * 2).min(Duration::from_secs(10))
}
