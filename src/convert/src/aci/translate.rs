//! OCI spec → ACI image manifest translation.
//!
//! [`translate`] is a pure function: the same inputs always produce the same
//! manifest. Each field group is built by its own helper.

use std::path::Path;

use oci2aci_core::error::{ConvertError, Result};
use serde_json::json;

use super::manifest::{
    App, EnvironmentVariable, EventHandler, EventName, ImageManifest, Isolator, MountPoint,
};
use super::types::{AcIdentifier, AcName, Label};
use super::{
    AC_VERSION, IMAGE_MANIFEST_KIND, ISOLATOR_CAPABILITIES_RETAIN, ISOLATOR_CPU, ISOLATOR_MEMORY,
};
use crate::oci::{Hook, Hooks, OciSpec, Process, RuntimeSpec};

/// Exec used when the process declares no arguments.
pub const DEFAULT_EXEC: &str = "/bin/sh";

/// Placeholder exec for a lifecycle phase without hooks.
pub const NOOP_EXEC: [&str; 2] = ["/bin/echo", "-n"];

const GIB: i64 = 1024 * 1024 * 1024;

/// Build the image manifest for a bundle.
///
/// `name` is validated by the caller; nothing here derives it from the bundle.
///
/// # Errors
///
/// Returns [`ConvertError::TranslateError`] if an environment entry lacks `=`
/// or a mount name is not a valid AC name.
pub fn translate(
    name: &AcIdentifier,
    spec: &OciSpec,
    runtime: &RuntimeSpec,
) -> Result<ImageManifest> {
    let app = App {
        exec: exec(&spec.process),
        user: spec.process.user.uid.to_string(),
        group: spec.process.user.gid.to_string(),
        event_handlers: event_handlers(&runtime.hooks),
        working_directory: spec.process.cwd.clone(),
        environment: environment(&spec.process.env)?,
        mount_points: mount_points(spec)?,
        ports: Vec::new(),
        isolators: isolators(spec, runtime)?,
    };

    Ok(ImageManifest {
        ac_kind: IMAGE_MANIFEST_KIND.to_string(),
        ac_version: AC_VERSION.to_string(),
        name: name.clone(),
        labels: labels(spec)?,
        app: Some(app),
    })
}

/// Always `version`, `os` and `arch`, in that order.
fn labels(spec: &OciSpec) -> Result<Vec<Label>> {
    Ok(vec![
        Label::new(AcIdentifier::new("version")?, &spec.version),
        Label::new(AcIdentifier::new("os")?, &spec.platform.os),
        Label::new(AcIdentifier::new("arch")?, &spec.platform.arch),
    ])
}

/// Relative `args[0]` is prefixed with `cwd` by plain string concatenation.
fn exec(process: &Process) -> Vec<String> {
    let Some((program, rest)) = process.args.split_first() else {
        return vec![DEFAULT_EXEC.to_string()];
    };

    let program = if Path::new(program).is_absolute() {
        program.clone()
    } else {
        let prefix = if process.cwd.is_empty() {
            "/"
        } else {
            process.cwd.as_str()
        };
        format!("{}{}", prefix, program)
    };

    std::iter::once(program).chain(rest.iter().cloned()).collect()
}

fn event_handlers(hooks: &Hooks) -> Vec<EventHandler> {
    vec![
        event_handler(EventName::PreStart, &hooks.prestart),
        event_handler(EventName::PostStop, &hooks.poststop),
    ]
}

/// Flatten every hook's path, args and env into one exec vector.
fn event_handler(name: EventName, hooks: &[Hook]) -> EventHandler {
    let mut exec: Vec<String> = hooks
        .iter()
        .flat_map(|hook| {
            std::iter::once(&hook.path)
                .chain(hook.args.iter())
                .chain(hook.env.iter())
                .cloned()
        })
        .collect();

    if exec.is_empty() {
        exec = NOOP_EXEC.iter().map(|s| s.to_string()).collect();
    }

    EventHandler { name, exec }
}

fn environment(env: &[String]) -> Result<Vec<EnvironmentVariable>> {
    env.iter()
        .map(|entry| {
            let (name, value) = entry.split_once('=').ok_or_else(|| {
                ConvertError::TranslateError(format!(
                    "malformed environment variable {:?}: expected KEY=VALUE",
                    entry
                ))
            })?;
            Ok(EnvironmentVariable {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn mount_points(spec: &OciSpec) -> Result<Vec<MountPoint>> {
    spec.mounts
        .iter()
        .map(|mount| {
            let name = AcName::new(mount.name.as_str()).map_err(|e| {
                ConvertError::TranslateError(format!("mount point {:?}: {}", mount.path, e))
            })?;
            Ok(MountPoint {
                name,
                path: mount.path.clone(),
                read_only: false,
            })
        })
        .collect()
}

/// Only facts present in the source become isolators.
fn isolators(spec: &OciSpec, runtime: &RuntimeSpec) -> Result<Vec<Isolator>> {
    let mut isolators = Vec::new();

    let quota = runtime.cpu_quota();
    if quota != 0 {
        isolators.push(Isolator {
            name: AcIdentifier::new(ISOLATOR_CPU)?,
            value_raw: json!({ "limit": format!("{}m", quota) }),
        });
    }

    let limit = runtime.memory_limit();
    if limit != 0 {
        // Whole gigabytes, truncated.
        isolators.push(Isolator {
            name: AcIdentifier::new(ISOLATOR_MEMORY)?,
            value_raw: json!({ "limit": format!("{}G", limit / GIB) }),
        });
    }

    let capabilities = &spec.linux.capabilities;
    if !capabilities.is_empty() {
        isolators.push(Isolator {
            name: AcIdentifier::new(ISOLATOR_CAPABILITIES_RETAIN)?,
            value_raw: json!({ "set": capabilities }),
        });
    }

    Ok(isolators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{Cpu, Memory, Platform, Resources, User};

    fn name() -> AcIdentifier {
        AcIdentifier::new("example").unwrap()
    }

    fn spec_with_args(args: &[&str], cwd: &str) -> OciSpec {
        let mut spec = OciSpec::default();
        spec.process.args = args.iter().map(|s| s.to_string()).collect();
        spec.process.cwd = cwd.to_string();
        spec
    }

    fn runtime_with_resources(quota: i64, limit: i64) -> RuntimeSpec {
        let mut runtime = RuntimeSpec::default();
        runtime.linux.resources = Some(Resources {
            cpu: Cpu { quota },
            memory: Memory { limit },
        });
        runtime
    }

    fn app(manifest: &ImageManifest) -> &App {
        manifest.app.as_ref().unwrap()
    }

    fn hook(path: &str, args: &[&str], env: &[&str]) -> Hook {
        Hook {
            path: path.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: env.iter().map(|s| s.to_string()).collect(),
        }
    }

    // --- header fields ---

    #[test]
    fn test_header_fields() {
        let manifest = translate(&name(), &OciSpec::default(), &RuntimeSpec::default()).unwrap();
        assert_eq!(manifest.ac_kind, "ImageManifest");
        assert_eq!(manifest.ac_version, AC_VERSION);
        assert_eq!(manifest.name.as_str(), "example");
    }

    #[test]
    fn test_labels_fixed_order() {
        let mut spec = OciSpec::default();
        spec.version = "0.2.0".to_string();
        spec.platform = Platform {
            os: "linux".to_string(),
            arch: "amd64".to_string(),
        };
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        let labels: Vec<(&str, &str)> = manifest
            .labels
            .iter()
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![("version", "0.2.0"), ("os", "linux"), ("arch", "amd64")]
        );
    }

    #[test]
    fn test_labels_kept_when_empty() {
        let manifest = translate(&name(), &OciSpec::default(), &RuntimeSpec::default()).unwrap();
        assert_eq!(manifest.labels.len(), 3);
        assert!(manifest.labels.iter().all(|l| l.value.is_empty()));
    }

    // --- exec ---

    #[test]
    fn test_exec_defaults_to_shell() {
        let spec = spec_with_args(&[], "/srv");
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        assert_eq!(app(&manifest).exec, vec!["/bin/sh"]);
    }

    #[test]
    fn test_exec_absolute_kept() {
        let spec = spec_with_args(&["/usr/bin/app", "--port", "80"], "/srv");
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        assert_eq!(app(&manifest).exec, vec!["/usr/bin/app", "--port", "80"]);
    }

    #[test]
    fn test_exec_relative_concatenates_cwd() {
        let spec = spec_with_args(&["./app"], "/srv");
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        assert_eq!(app(&manifest).exec, vec!["/srv./app"]);
    }

    #[test]
    fn test_exec_relative_without_cwd_uses_root() {
        let spec = spec_with_args(&["sh", "-c", "true"], "");
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        assert_eq!(app(&manifest).exec, vec!["/sh", "-c", "true"]);
    }

    // --- user / group / working directory ---

    #[test]
    fn test_user_group_rendering() {
        let mut spec = OciSpec::default();
        spec.process.user = User { uid: 1000, gid: 50 };
        spec.process.cwd = "/work".to_string();
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        let app = app(&manifest);
        assert_eq!(app.user, "1000");
        assert_eq!(app.group, "50");
        assert_eq!(app.working_directory, "/work");
    }

    // --- event handlers ---

    #[test]
    fn test_event_handlers_default_to_noop() {
        let manifest = translate(&name(), &OciSpec::default(), &RuntimeSpec::default()).unwrap();
        let app = app(&manifest);
        assert_eq!(app.event_handlers.len(), 2);
        assert_eq!(app.event_handlers[0].name, EventName::PreStart);
        assert_eq!(app.event_handlers[1].name, EventName::PostStop);
        for handler in &app.event_handlers {
            assert_eq!(handler.exec, vec!["/bin/echo", "-n"]);
        }
    }

    #[test]
    fn test_event_handlers_flatten_hooks_in_order() {
        let mut runtime = RuntimeSpec::default();
        runtime.hooks.prestart = vec![
            hook("/bin/net-setup", &["--bridge", "br0"], &["DEBUG=1"]),
            hook("/bin/mount-setup", &[], &[]),
        ];
        runtime.hooks.poststop = vec![hook("/bin/cleanup", &["-f"], &[])];

        let manifest = translate(&name(), &OciSpec::default(), &runtime).unwrap();
        let app = app(&manifest);
        assert_eq!(
            app.event_handler(EventName::PreStart).unwrap().exec,
            vec![
                "/bin/net-setup",
                "--bridge",
                "br0",
                "DEBUG=1",
                "/bin/mount-setup"
            ]
        );
        assert_eq!(
            app.event_handler(EventName::PostStop).unwrap().exec,
            vec!["/bin/cleanup", "-f"]
        );
    }

    #[test]
    fn test_event_handler_only_one_phase_populated() {
        let mut runtime = RuntimeSpec::default();
        runtime.hooks.poststop = vec![hook("/bin/cleanup", &[], &[])];
        let manifest = translate(&name(), &OciSpec::default(), &runtime).unwrap();
        let app = app(&manifest);
        assert_eq!(
            app.event_handler(EventName::PreStart).unwrap().exec,
            NOOP_EXEC.to_vec()
        );
        assert_eq!(
            app.event_handler(EventName::PostStop).unwrap().exec,
            vec!["/bin/cleanup"]
        );
    }

    // --- environment ---

    #[test]
    fn test_environment_splits_on_first_equals() {
        let mut spec = OciSpec::default();
        spec.process.env = vec![
            "PATH=/usr/bin:/bin".to_string(),
            "OPTS=a=b=c".to_string(),
            "EMPTY=".to_string(),
        ];
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        let env: Vec<(&str, &str)> = app(&manifest)
            .environment
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
            .collect();
        assert_eq!(
            env,
            vec![("PATH", "/usr/bin:/bin"), ("OPTS", "a=b=c"), ("EMPTY", "")]
        );
    }

    #[test]
    fn test_environment_malformed_entry_is_error() {
        let mut spec = OciSpec::default();
        spec.process.env = vec!["PATH=/bin".to_string(), "NOVALUE".to_string()];
        let err = translate(&name(), &spec, &RuntimeSpec::default()).unwrap_err();
        assert!(matches!(err, ConvertError::TranslateError(_)));
        assert!(err.to_string().contains("NOVALUE"));
    }

    // --- mount points ---

    #[test]
    fn test_mount_points_are_read_write() {
        let mut spec = OciSpec::default();
        spec.mounts = vec![
            crate::oci::MountPoint {
                name: "proc".to_string(),
                path: "/proc".to_string(),
            },
            crate::oci::MountPoint {
                name: "data-1".to_string(),
                path: "/data".to_string(),
            },
        ];
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        let mounts = &app(&manifest).mount_points;
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].name.as_str(), "proc");
        assert_eq!(mounts[1].path, "/data");
        assert!(mounts.iter().all(|m| !m.read_only));
    }

    #[test]
    fn test_mount_point_bad_name_is_error() {
        let mut spec = OciSpec::default();
        spec.mounts = vec![crate::oci::MountPoint {
            name: "Data_Volume".to_string(),
            path: "/data".to_string(),
        }];
        let err = translate(&name(), &spec, &RuntimeSpec::default()).unwrap_err();
        assert!(matches!(err, ConvertError::TranslateError(_)));
    }

    // --- isolators ---

    #[test]
    fn test_no_isolators_without_sources() {
        let runtime = runtime_with_resources(0, 0);
        let manifest = translate(&name(), &OciSpec::default(), &runtime).unwrap();
        assert!(app(&manifest).isolators.is_empty());
        let json = String::from_utf8(manifest.to_pretty_json().unwrap()).unwrap();
        assert!(!json.contains("isolators"));
    }

    #[test]
    fn test_resource_isolators() {
        let manifest = translate(
            &name(),
            &OciSpec::default(),
            &runtime_with_resources(50000, 536870912),
        )
        .unwrap();
        let app = app(&manifest);
        assert_eq!(
            app.isolator(ISOLATOR_CPU).unwrap().value_raw,
            json!({"limit": "50000m"})
        );
        assert_eq!(
            app.isolator(ISOLATOR_MEMORY).unwrap().value_raw,
            json!({"limit": "0G"})
        );
    }

    #[test]
    fn test_memory_isolator_truncates() {
        let limit = 3 * GIB + GIB / 2;
        let runtime = runtime_with_resources(0, limit);
        let manifest = translate(&name(), &OciSpec::default(), &runtime).unwrap();
        let app = app(&manifest);
        assert!(app.isolator(ISOLATOR_CPU).is_none());
        assert_eq!(
            app.isolator(ISOLATOR_MEMORY).unwrap().value_raw,
            json!({"limit": "3G"})
        );
    }

    #[test]
    fn test_cpu_only_isolator() {
        let runtime = runtime_with_resources(2000, 0);
        let manifest = translate(&name(), &OciSpec::default(), &runtime).unwrap();
        let app = app(&manifest);
        assert_eq!(app.isolators.len(), 1);
        assert_eq!(app.isolators[0].name.as_str(), ISOLATOR_CPU);
    }

    #[test]
    fn test_capabilities_isolator_preserves_order() {
        let mut spec = OciSpec::default();
        spec.linux.capabilities = vec![
            "CAP_NET_BIND_SERVICE".to_string(),
            "CAP_AUDIT_WRITE".to_string(),
            "CAP_KILL".to_string(),
        ];
        let manifest = translate(&name(), &spec, &RuntimeSpec::default()).unwrap();
        let isolator = app(&manifest).isolator(ISOLATOR_CAPABILITIES_RETAIN).unwrap();
        assert_eq!(
            isolator.value_raw,
            json!({"set": ["CAP_NET_BIND_SERVICE", "CAP_AUDIT_WRITE", "CAP_KILL"]})
        );
    }

    #[test]
    fn test_isolator_order() {
        let mut spec = OciSpec::default();
        spec.linux.capabilities = vec!["CAP_KILL".to_string()];
        let manifest = translate(&name(), &spec, &runtime_with_resources(1, GIB)).unwrap();
        let names: Vec<&str> = app(&manifest)
            .isolators
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![ISOLATOR_CPU, ISOLATOR_MEMORY, ISOLATOR_CAPABILITIES_RETAIN]
        );
    }

    // --- determinism ---

    #[test]
    fn test_translation_is_idempotent() {
        let mut spec = spec_with_args(&["app", "--flag"], "/opt/");
        spec.process.env = vec!["A=1".to_string(), "B=2".to_string()];
        spec.linux.capabilities = vec!["CAP_CHOWN".to_string()];
        let runtime = runtime_with_resources(100, 4 * GIB);

        let first = translate(&name(), &spec, &runtime).unwrap().to_pretty_json().unwrap();
        let second = translate(&name(), &spec, &runtime).unwrap().to_pretty_json().unwrap();
        assert_eq!(first, second);
    }
}
