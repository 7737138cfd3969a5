//! Administrator privilege check and elevated relaunch
//!
//! The downloader may need to write into protected folders, so on Windows the
//! application insists on running elevated. A non-elevated instance relaunches
//! itself through the UAC `runas` verb with its original arguments and then
//! exits; the elevated copy carries on.
//!
//! Other platforms have no elevation model here: the check reports
//! "not elevated" and a relaunch attempt is an error, so the gate is normally
//! configured off there.

use std::ffi::{OsStr, OsString};
use tracing::{debug, error, info};

use crate::core::models::{AppError, AppResult};

/// What the startup gate decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationDecision {
    /// Already elevated, continue startup
    AlreadyElevated,
    /// Elevation is not required by configuration
    NotRequired,
    /// An elevated copy was spawned; this instance must exit with code 0
    Relaunched,
}

/// OS privilege operations, separated so the gate can be exercised in tests
pub trait PrivilegeControl {
    fn is_elevated(&self) -> bool;

    /// Spawn an elevated copy of this executable with `args`
    fn relaunch_elevated(&self, args: &[OsString]) -> AppResult<()>;
}

/// The real operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPrivileges;

impl PrivilegeControl for SystemPrivileges {
    fn is_elevated(&self) -> bool {
        is_elevated()
    }

    fn relaunch_elevated(&self, args: &[OsString]) -> AppResult<()> {
        elevate_and_restart(args)
    }
}

/// Runs before anything else at startup
pub struct ElevationGate<P: PrivilegeControl> {
    control: P,
    required: bool,
}

impl<P: PrivilegeControl> ElevationGate<P> {
    pub fn new(control: P, required: bool) -> Self {
        Self { control, required }
    }

    pub fn check(&self, args: &[OsString]) -> AppResult<ElevationDecision> {
        if !self.required {
            debug!("Elevation not required by configuration");
            return Ok(ElevationDecision::NotRequired);
        }

        if self.control.is_elevated() {
            info!("Running with administrator privileges");
            return Ok(ElevationDecision::AlreadyElevated);
        }

        info!("Not running as administrator. Attempting to elevate privileges...");
        self.control.relaunch_elevated(args)?;
        info!("Successfully spawned elevated process. Exiting non-elevated instance.");
        Ok(ElevationDecision::Relaunched)
    }
}

/// Whether the current process has administrator rights.
///
/// Never fails: if the OS cannot be asked, the answer is `false`.
pub fn is_elevated() -> bool {
    debug!("Checking for administrator privileges...");
    let elevated = platform::is_user_admin();
    debug!("Administrator status: {}", elevated);
    elevated
}

/// Relaunch this executable elevated with `args` (program name excluded).
///
/// Returns `Ok(())` once the elevated copy has been spawned; the caller is
/// expected to exit with code 0 right after.
pub fn elevate_and_restart(args: &[OsString]) -> AppResult<()> {
    let exe = std::env::current_exe()
        .map_err(|e| AppError::Elevation(format!("cannot resolve executable path: {}", e)))?;
    let params = quote_parameters(args);
    let working_dir = std::env::current_dir().ok();

    info!("Executable path: {}", exe.display());
    debug!("Parameters: {}", params);

    match platform::shell_execute_runas(&exe, &params, working_dir.as_deref()) {
        Ok(()) => Ok(()),
        Err(message) => {
            error!("Failed to elevate: {}", message);
            Err(AppError::Elevation(message))
        }
    }
}

/// Quote one argument for a Windows command line (`CommandLineToArgvW` rules)
pub fn quote_argument(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');

    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.push_str(&"\\".repeat(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.push_str(&"\\".repeat(backslashes));
                backslashes = 0;
                quoted.push(c);
            }
        }
    }
    // backslashes right before the closing quote must be doubled
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

/// Join arguments into one quoted parameter string
pub fn quote_parameters<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| quote_argument(&arg.as_ref().to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(windows)]
mod platform {
    use std::ffi::OsStr;
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    use winapi::um::shellapi::ShellExecuteW;
    use winapi::um::shlobj::IsUserAnAdmin;
    use winapi::um::winuser::SW_SHOWNORMAL;

    fn wide(value: &OsStr) -> Vec<u16> {
        value.encode_wide().chain(once(0)).collect()
    }

    pub fn is_user_admin() -> bool {
        unsafe { IsUserAnAdmin() != 0 }
    }

    pub fn shell_execute_runas(exe: &Path, params: &str, working_dir: Option<&Path>) -> Result<(), String> {
        let verb = wide(OsStr::new("runas"));
        let file = wide(exe.as_os_str());
        let parameters = wide(OsStr::new(params));
        let directory = working_dir.map(|dir| wide(dir.as_os_str()));

        let instance = unsafe {
            ShellExecuteW(
                ptr::null_mut(),
                verb.as_ptr(),
                file.as_ptr(),
                parameters.as_ptr(),
                directory.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
                SW_SHOWNORMAL,
            )
        };

        // ShellExecuteW reports success with any value above 32
        let code = instance as isize;
        if code > 32 {
            Ok(())
        } else {
            Err(format!("ShellExecuteW returned error code {}", code))
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use std::path::Path;

    pub fn is_user_admin() -> bool {
        false
    }

    pub fn shell_execute_runas(_exe: &Path, _params: &str, _working_dir: Option<&Path>) -> Result<(), String> {
        Err("privilege elevation is only supported on Windows".to_string())
    }
}
