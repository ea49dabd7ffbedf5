use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use coreup_core::{CoreError, CoreResult, Os};

use crate::probe::CommandRunner;

const LINUX_CAPABILITIES: &str = "cap_net_bind_service,cap_net_admin,cap_dac_override=+ep";

pub fn mark_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Grants the binary the privileges it needs to open TUN devices.
///
/// The elevation prompt itself is handled by the OS helper (`pkexec` or
/// `osascript`).
pub fn grant_permission(runner: &dyn CommandRunner, os: Os, binary: &Path) -> CoreResult<()> {
    let absolute = std::path::absolute(binary).map_err(|err| CoreError::Execution {
        path: binary.to_path_buf(),
        message: format!("failed to resolve absolute path: {err}"),
    })?;

    match os {
        Os::Linux => {
            let args: [&OsStr; 3] = [
                OsStr::new("setcap"),
                OsStr::new(LINUX_CAPABILITIES),
                absolute.as_os_str(),
            ];
            runner.exec(Path::new("pkexec"), &args)?;
        }
        Os::Darwin => {
            let script = OsString::from(macos_grant_script(&absolute));
            let args: [&OsStr; 2] = [OsStr::new("-e"), script.as_os_str()];
            runner.exec(Path::new("osascript"), &args)?;
        }
        Os::Windows => {
            return Err(CoreError::Execution {
                path: absolute,
                message: "permission grant is not needed on windows".to_string(),
            });
        }
    }
    Ok(())
}

fn macos_grant_script(binary: &Path) -> String {
    let quoted = binary.display().to_string().replace('\'', r"'\''");
    format!(
        "do shell script \"chown root:admin '{quoted}' && chmod +sx '{quoted}'\" with administrator privileges"
    )
}
