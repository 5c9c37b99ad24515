//! Builds the ordered adapter chain the role executor probes, per spec
//! §4.3 "Adapter definition" / §9 "`cliAdapterOrder`", always terminated
//! by the internal `local-echo` fallback.

use conclave_core::config::RuntimeOptions;
use conclave_core::executor::adapter::{Adapter, CliAdapterSpec, CliAdapter, LocalEchoAdapter, LOCAL_ECHO_ID};
use conclave_core::executor::sandbox::{DefaultHostCapabilities, SandboxConfig};

fn spec_for(name: &str) -> CliAdapterSpec {
    CliAdapterSpec {
        id: name.to_string(),
        probe_command: name.to_string(),
        probe_args: vec!["--version".to_string()],
        execute_command: name.to_string(),
        execute_args: vec!["-p".to_string(), "{{args}}".to_string()],
        reject_output_substrings: vec!["REJECT".to_string(), "permission denied".to_string()],
        model_flag: Some("--model".to_string()),
        model_env_var: None,
        reasoning_flag: Some("--reasoning".to_string()),
        reasoning_env_var: None,
        mode_flag: Some("--mode".to_string()),
    }
}

fn sandbox_config(opts: &RuntimeOptions) -> SandboxConfig {
    let os_sandbox_wrapper = match opts.sandbox_mode.as_str() {
        "auto" | "bare" => None,
        other => Some(other.to_string()),
    };
    SandboxConfig {
        requested_level: opts.sandbox_level,
        allowed_hosts: opts.sandbox_allowed_hosts.clone(),
        os_sandbox_wrapper,
        container_wrapper_template: None,
    }
}

/// Every entry in `cli_adapter_order` other than `local-echo` becomes a
/// [`CliAdapter`] probed in that order; `local-echo` is always appended
/// last regardless of whether it appears in the configured order, since
/// [`conclave_core::executor::RoleExecutor::new`] requires the final
/// adapter to be internal.
pub fn build_adapters(opts: &RuntimeOptions) -> Vec<Box<dyn Adapter>> {
    let sandbox = sandbox_config(opts);
    let mut adapters: Vec<Box<dyn Adapter>> = Vec::new();
    for name in &opts.cli_adapter_order {
        if name.eq_ignore_ascii_case(LOCAL_ECHO_ID) {
            continue;
        }
        adapters.push(Box::new(CliAdapter::new(spec_for(name), sandbox.clone(), Box::new(DefaultHostCapabilities))));
    }
    adapters.push(Box::new(LocalEchoAdapter));
    adapters
}
