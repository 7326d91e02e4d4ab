//! Runtime environment guard
//!
//! The container image runs the bot as `botuser` (uid 1000) with a writable
//! data directory. The process checks both again at start so a wrong
//! deployment fails loudly instead of writing state as root.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::application::errors::EnvironmentError;
use crate::infrastructure::config::Config;

/// Name of the scratch file used to prove the data directory is writable
const WRITE_CHECK_FILE: &str = ".write-check";

/// Effective identity of the running process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    #[cfg(unix)]
    pub fn current() -> Self {
        let (uid, gid) = unsafe { (libc::geteuid(), libc::getegid()) };
        Self { uid, gid }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        Self { uid: u32::MAX, gid: u32::MAX }
    }

    pub fn is_privileged(&self) -> bool {
        self.uid == 0
    }

    pub fn ensure_unprivileged(&self) -> Result<(), EnvironmentError> {
        if self.is_privileged() {
            return Err(EnvironmentError::PrivilegedIdentity(self.uid));
        }
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={} gid={}", self.uid, self.gid)
    }
}

/// Create the data directory if needed and prove it is writable.
///
/// Safe to call repeatedly.
pub fn provision_data_dir(path: &Path) -> Result<PathBuf, EnvironmentError> {
    std::fs::create_dir_all(path).map_err(|source| EnvironmentError::DataDirUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    check_writable(path)?;
    Ok(path.to_path_buf())
}

fn check_writable(path: &Path) -> Result<(), EnvironmentError> {
    let scratch = path.join(WRITE_CHECK_FILE);
    std::fs::write(&scratch, b"ok")
        .and_then(|_| std::fs::remove_file(&scratch))
        .map_err(|source| EnvironmentError::DataDirNotWritable {
            path: path.to_path_buf(),
            source,
        })
}

/// Whether `path` can serve as the data directory. Reads only; a missing
/// directory passes when its nearest existing ancestor is writable.
fn inspect_data_dir(path: &Path) -> (bool, String) {
    if path.is_dir() {
        return if writable(path) {
            (true, format!("{} is writable", path.display()))
        } else {
            (false, format!("{} is not writable", path.display()))
        };
    }
    if path.exists() {
        return (false, format!("{} is not a directory", path.display()));
    }

    let ancestor = path
        .ancestors()
        .skip(1)
        .find(|p| !p.as_os_str().is_empty() && p.is_dir())
        .unwrap_or_else(|| Path::new("."));
    if writable(ancestor) {
        (true, format!("{} will be created", path.display()))
    } else {
        (false, format!("{} cannot be created in {}", path.display(), ancestor.display()))
    }
}

#[cfg(unix)]
fn writable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;
    let Ok(c_path) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Enforce the runtime contract before the bot starts
pub fn verify(config: &Config, identity: Identity) -> Result<PathBuf, EnvironmentError> {
    identity.ensure_unprivileged()?;
    let dir = provision_data_dir(&config.runtime.data_dir)?;
    tracing::info!("Runtime identity {}, data directory {}", identity, dir.display());
    Ok(dir)
}

/// One line of the `check-env` report
#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Result of inspecting the runtime contract without starting the bot
#[derive(Debug, Clone)]
pub struct EnvironmentReport {
    pub checks: Vec<Check>,
}

impl EnvironmentReport {
    pub fn inspect(config: &Config, identity: Identity) -> Self {
        let mut checks = Vec::new();

        checks.push(Check {
            name: "identity",
            ok: !identity.is_privileged(),
            detail: identity.to_string(),
        });

        let (ok, detail) = inspect_data_dir(&config.runtime.data_dir);
        checks.push(Check { name: "data-dir", ok, detail });

        let (ok, detail) = match config.timezone() {
            Ok(tz) => (true, tz.name().to_string()),
            Err(e) => (false, e.to_string()),
        };
        checks.push(Check { name: "timezone", ok, detail });

        checks.push(Check {
            name: "token",
            ok: config.bot.token.is_some(),
            detail: if config.bot.token.is_some() {
                "DISCORD_BOT_TOKEN is set".to_string()
            } else {
                "DISCORD_BOT_TOKEN is not set".to_string()
            },
        });

        Self { checks }
    }

    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }
}

impl fmt::Display for EnvironmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let mark = if check.ok { "ok" } else { "FAIL" };
            writeln!(f, "[{:>4}] {:<9} {}", mark, check.name, check.detail)?;
        }
        Ok(())
    }
}
