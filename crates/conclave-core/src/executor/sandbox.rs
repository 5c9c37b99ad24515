//! Sandbox wrapping: the three enforcement tiers and downward
//! degradation, per spec §4.3 "Sandbox wrapping".
//!
//! A mode string resolves to a backend through the same probe-then-spawn
//! factory shape regardless of tier: `OsSandboxed` and `Container` both
//! wrap the child command, and `HostCapabilities` reports which tiers
//! are actually available on the running host so a requested level can
//! degrade gracefully instead of failing outright.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SandboxLevel {
    BareCli,
    OsSandboxed,
    Container,
}

impl fmt::Display for SandboxLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BareCli => "BareCli",
            Self::OsSandboxed => "OsSandboxed",
            Self::Container => "Container",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized sandbox level: {0}")]
pub struct SandboxLevelParseError(String);

impl FromStr for SandboxLevel {
    type Err = SandboxLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BareCli" => Ok(Self::BareCli),
            "OsSandboxed" => Ok(Self::OsSandboxed),
            "Container" => Ok(Self::Container),
            other => Err(SandboxLevelParseError(other.to_string())),
        }
    }
}

impl SandboxLevel {
    /// The next level to try if this one cannot be enforced on the
    /// current host (`Container -> OsSandboxed -> BareCli`).
    pub fn degrade(self) -> Option<Self> {
        match self {
            Self::Container => Some(Self::OsSandboxed),
            Self::OsSandboxed => Some(Self::BareCli),
            Self::BareCli => None,
        }
    }
}

/// A rendered command ready to spawn: program, args, and the environment
/// additions the sandbox layer contributes (on top of the caller's
/// merged environment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub level_used: SandboxLevel,
}

/// Host capability probe: can this tier actually be enforced here? In
/// the absence of a real sandbox-profile backend this is a narrow,
/// conservative check: a trait object picked by availability, not by
/// configuration alone.
pub trait HostCapabilities {
    fn supports(&self, level: SandboxLevel) -> bool;
}

/// The capability probe used outside tests: `BareCli` is always
/// available; `OsSandboxed` and `Container` require their respective
/// wrapper binaries to be configured (checked by the caller via
/// [`SandboxConfig`], not by touching the filesystem here).
pub struct DefaultHostCapabilities;

impl HostCapabilities for DefaultHostCapabilities {
    fn supports(&self, level: SandboxLevel) -> bool {
        matches!(level, SandboxLevel::BareCli)
    }
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub requested_level: SandboxLevel,
    pub allowed_hosts: Vec<String>,
    /// Template for the OS-native profile wrapper, e.g. a seccomp/
    /// namespace launcher binary. `None` means this tier cannot be
    /// enforced regardless of what [`HostCapabilities`] reports.
    pub os_sandbox_wrapper: Option<String>,
    /// Template containing `{{command}}, {{args}}, {{args_joined}}`.
    pub container_wrapper_template: Option<String>,
}

impl SandboxConfig {
    fn wrapper_available(&self, level: SandboxLevel) -> bool {
        match level {
            SandboxLevel::BareCli => true,
            SandboxLevel::OsSandboxed => self.os_sandbox_wrapper.is_some(),
            SandboxLevel::Container => self.container_wrapper_template.is_some(),
        }
    }
}

/// Wrap `program`/`args` at the requested level, degrading downward
/// until a tier both the config and the host can support is found.
/// `BareCli` always succeeds, so this never fails.
pub fn wrap_command(
    config: &SandboxConfig,
    caps: &dyn HostCapabilities,
    program: &str,
    args: &[String],
) -> WrappedCommand {
    let mut level = config.requested_level;
    loop {
        if config.wrapper_available(level) && (level == SandboxLevel::BareCli || caps.supports(level))
        {
            break;
        }
        match level.degrade() {
            Some(next) => level = next,
            None => break,
        }
    }

    match level {
        SandboxLevel::BareCli => WrappedCommand {
            program: program.to_string(),
            args: args.to_vec(),
            level_used: level,
        },
        SandboxLevel::OsSandboxed => {
            let wrapper = config
                .os_sandbox_wrapper
                .clone()
                .expect("checked by wrapper_available");
            let mut wrapped_args = vec![program.to_string()];
            wrapped_args.extend(args.iter().cloned());
            WrappedCommand {
                program: wrapper,
                args: wrapped_args,
                level_used: level,
            }
        }
        SandboxLevel::Container => {
            let template = config
                .container_wrapper_template
                .clone()
                .expect("checked by wrapper_available");
            let args_joined = args.join(" ");
            let rendered = template
                .replace("{{command}}", program)
                .replace("{{args_joined}}", &args_joined)
                .replace("{{args}}", &args_joined);
            let mut parts = rendered.split_whitespace().map(str::to_string);
            let wrapper_program = parts.next().unwrap_or_default();
            WrappedCommand {
                program: wrapper_program,
                args: parts.collect(),
                level_used: level,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllCapable;
    impl HostCapabilities for AllCapable {
        fn supports(&self, _level: SandboxLevel) -> bool {
            true
        }
    }

    struct NoneCapable;
    impl HostCapabilities for NoneCapable {
        fn supports(&self, level: SandboxLevel) -> bool {
            level == SandboxLevel::BareCli
        }
    }

    #[test]
    fn bare_cli_passes_through_unmodified() {
        let config = SandboxConfig {
            requested_level: SandboxLevel::BareCli,
            allowed_hosts: vec![],
            os_sandbox_wrapper: None,
            container_wrapper_template: None,
        };
        let wrapped = wrap_command(&config, &DefaultHostCapabilities, "echo", &["hi".into()]);
        assert_eq!(wrapped.program, "echo");
        assert_eq!(wrapped.args, vec!["hi".to_string()]);
        assert_eq!(wrapped.level_used, SandboxLevel::BareCli);
    }

    #[test]
    fn degrades_container_to_bare_cli_when_no_wrapper_configured() {
        let config = SandboxConfig {
            requested_level: SandboxLevel::Container,
            allowed_hosts: vec![],
            os_sandbox_wrapper: None,
            container_wrapper_template: None,
        };
        let wrapped = wrap_command(&config, &AllCapable, "echo", &["hi".into()]);
        assert_eq!(wrapped.level_used, SandboxLevel::BareCli);
    }

    #[test]
    fn degrades_when_host_lacks_capability() {
        let config = SandboxConfig {
            requested_level: SandboxLevel::OsSandboxed,
            allowed_hosts: vec![],
            os_sandbox_wrapper: Some("os-sandbox-exec".into()),
            container_wrapper_template: None,
        };
        let wrapped = wrap_command(&config, &NoneCapable, "echo", &["hi".into()]);
        assert_eq!(wrapped.level_used, SandboxLevel::BareCli);
    }

    #[test]
    fn container_renders_wrapper_template() {
        let config = SandboxConfig {
            requested_level: SandboxLevel::Container,
            allowed_hosts: vec![],
            os_sandbox_wrapper: None,
            container_wrapper_template: Some("runc exec {{command}} {{args_joined}}".into()),
        };
        let wrapped = wrap_command(&config, &AllCapable, "claude", &["-p".into(), "do it".into()]);
        assert_eq!(wrapped.level_used, SandboxLevel::Container);
        assert_eq!(wrapped.program, "runc");
    }

    #[test]
    fn sandbox_level_parse_round_trip() {
        for level in [
            SandboxLevel::BareCli,
            SandboxLevel::OsSandboxed,
            SandboxLevel::Container,
        ] {
            assert_eq!(level.to_string().parse::<SandboxLevel>().unwrap(), level);
        }
    }

    #[test]
    fn degrade_chain_terminates_at_bare_cli() {
        assert_eq!(SandboxLevel::Container.degrade(), Some(SandboxLevel::OsSandboxed));
        assert_eq!(SandboxLevel::OsSandboxed.degrade(), Some(SandboxLevel::BareCli));
        assert_eq!(SandboxLevel::BareCli.degrade(), None);
    }
}
