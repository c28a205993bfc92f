use std::{env, path::Path, process::Stdio};

use anyhow::Result;
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

/// Terminates every other process running from the same executable as us.
pub fn kill_previous_daemons(name: &Path) {
    let system = System::new_all();
    let current_id = get_current_pid().unwrap();
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_none()
        {
            continue;
        }

        info!("Terminating previous daemon {pid}");
        // SIGTERM gives the ledger a chance to run its final save. On Windows this
        // forcefully terminates the process, so the latest heartbeat write is the
        // freshest state there.
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
        process.wait();
    }
}

/// Intended for shutting down a previous daemon and starting a new one. Currently for
/// simplicity sake it operates using a detached process running our own `serve`.
pub fn restart_daemon() -> Result<()> {
    // The program uses the executable passed into the process. It's not the best
    // option but it will do the job in most cases.
    let process_name = env::current_exe().expect("Can't operate without an executable");
    kill_previous_daemons(&process_name);

    let mut command = std::process::Command::new(process_name);
    command.args(["serve"]);

    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Daemon started");
    Ok(())
}
