use k8s_openapi::api::core::v1::{
    EnvVar, HTTPGetAction, HostAlias, HostPathVolumeSource, Probe, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// lxcfs exposes container-scoped views of these `/proc` files on every node.
const LXCFS_PROC_FILES: [&str; 6] = ["cpuinfo", "diskstats", "meminfo", "stat", "swaps", "uptime"];
const LXCFS_PROC_ROOT: &str = "/var/lib/lxcfs/proc";

const LOCALTIME_VOLUME: &str = "localtime";
const LOCALTIME_HOST_PATH: &str = "/usr/share/zoneinfo/Asia/Shanghai";
const LOCALTIME_MOUNT_PATH: &str = "/etc/localtime";

pub const TIMEZONE: &str = "Asia/Shanghai";
pub const LOCALE: &str = "en_US.UTF-8";

/// Readiness probe every workload gets. Fixed operational constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpReadinessProbe {
    pub path: &'static str,
    pub port: i32,
    pub failure_threshold: i32,
    pub initial_delay_seconds: i32,
    pub period_seconds: i32,
    pub timeout_seconds: i32,
    pub success_threshold: i32,
}

pub const READINESS_PROBE: HttpReadinessProbe = HttpReadinessProbe {
    path: "/hs",
    port: 8080,
    failure_threshold: 12,
    initial_delay_seconds: 60,
    period_seconds: 5,
    timeout_seconds: 3,
    success_threshold: 3,
};

impl From<HttpReadinessProbe> for Probe {
    fn from(probe: HttpReadinessProbe) -> Self {
        Probe {
            http_get: Some(HTTPGetAction {
                path: Some(probe.path.to_owned()),
                port: IntOrString::Int(probe.port),
                ..HTTPGetAction::default()
            }),
            failure_threshold: Some(probe.failure_threshold),
            initial_delay_seconds: Some(probe.initial_delay_seconds),
            period_seconds: Some(probe.period_seconds),
            timeout_seconds: Some(probe.timeout_seconds),
            success_threshold: Some(probe.success_threshold),
            ..Probe::default()
        }
    }
}

fn host_path_volume(name: &str, path: &str) -> Volume {
    Volume {
        name: name.to_owned(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_owned(),
            type_: None,
        }),
        ..Volume::default()
    }
}

fn volume_mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_owned(),
        mount_path: mount_path.to_owned(),
        ..VolumeMount::default()
    }
}

/// The seven host-path volumes, and their mounts in the same order.
pub fn default_volumes_and_mounts() -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut volumes = Vec::with_capacity(LXCFS_PROC_FILES.len() + 1);
    let mut mounts = Vec::with_capacity(LXCFS_PROC_FILES.len() + 1);

    for file in LXCFS_PROC_FILES.iter() {
        volumes.push(host_path_volume(
            file,
            &format!("{}/{}", LXCFS_PROC_ROOT, file),
        ));
        mounts.push(volume_mount(file, &format!("/proc/{}", file)));
    }

    volumes.push(host_path_volume(LOCALTIME_VOLUME, LOCALTIME_HOST_PATH));
    mounts.push(volume_mount(LOCALTIME_VOLUME, LOCALTIME_MOUNT_PATH));

    (volumes, mounts)
}

pub fn default_readiness_probe() -> Probe {
    Probe::from(READINESS_PROBE)
}

fn host_alias(ip: &str, hostnames: &[&str]) -> HostAlias {
    HostAlias {
        ip: Some(ip.to_owned()),
        hostnames: Some(hostnames.iter().map(|name| name.to_string()).collect()),
    }
}

const IPV4_LOCALHOST_NAMES: [&str; 3] = ["localhost.localdomain", "localhost4", "localhost4.localdomain4"];
const IPV6_LOCALHOST_NAMES: [&str; 3] = ["localhost.localdomain", "localhost6", "localhost6.localdomain6"];

/// Loopback aliases for IPv4 and IPv6.
pub fn default_host_aliases() -> Vec<HostAlias> {
    vec![
        host_alias("127.0.0.1", &IPV4_LOCALHOST_NAMES),
        host_alias("::1", &IPV6_LOCALHOST_NAMES),
    ]
}

/// Alias list older deployments were created with: a second `127.0.0.1`
/// entry without hostnames. Kept so existing pods can be reproduced exactly.
pub fn legacy_host_aliases() -> Vec<HostAlias> {
    vec![
        host_alias("127.0.0.1", &IPV4_LOCALHOST_NAMES),
        HostAlias {
            ip: Some("127.0.0.1".to_owned()),
            hostnames: None,
        },
    ]
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: Some(value.to_owned()),
        value_from: None,
    }
}

/// `TZ`, `LANG` and `LC_ALL`, in that order.
pub fn default_locale_env() -> Vec<EnvVar> {
    vec![
        env_var("TZ", TIMEZONE),
        env_var("LANG", LOCALE),
        env_var("LC_ALL", LOCALE),
    ]
}
