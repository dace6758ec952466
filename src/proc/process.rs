use std::time::Duration;

use tracing::{debug, warn};

#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(windows)]
pub fn is_process_running(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
        .map(|o| {
            let out = String::from_utf8_lossy(&o.stdout);
            o.status.success() && !out.contains("INFO:") && out.contains(&pid.to_string())
        })
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
pub fn is_process_running(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), signal).is_ok()
}

/// Graceful termination: TERM, wait up to the grace period, then KILL.
/// Returns true once the process is gone.
#[cfg(unix)]
pub async fn terminate_with_grace(pid: u32, grace: Duration) -> bool {
    use nix::sys::signal::Signal;

    if !is_process_running(pid) {
        return true;
    }

    debug!(pid, "Sending TERM");
    send_signal(pid, Signal::SIGTERM);

    let poll = Duration::from_millis(200);
    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !is_process_running(pid) {
            return true;
        }
        tokio::time::sleep(poll).await;
    }

    warn!(pid, "Grace period elapsed, sending KILL");
    send_signal(pid, Signal::SIGKILL);
    tokio::time::sleep(poll).await;
    !is_process_running(pid)
}

#[cfg(windows)]
pub async fn terminate_with_grace(pid: u32, grace: Duration) -> bool {
    use std::process::Command;

    if !is_process_running(pid) {
        return true;
    }

    debug!(pid, "Requesting termination");
    let _ = Command::new("taskkill").args(["/PID", &pid.to_string()]).output();

    let poll = Duration::from_millis(200);
    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !is_process_running(pid) {
            return true;
        }
        tokio::time::sleep(poll).await;
    }

    warn!(pid, "Grace period elapsed, forcing termination");
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output();
    tokio::time::sleep(poll).await;
    !is_process_running(pid)
}

#[cfg(not(any(unix, windows)))]
pub async fn terminate_with_grace(_pid: u32, _grace: Duration) -> bool {
    false
}
