use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

use crate::utils::error::Error;
use crate::workload::defaults::READINESS_PROBE;
use crate::workload::naming::service_name;

/// Cluster service fronting every pod labelled `app=<app_name>` on the
/// application port.
pub fn build_service(app_name: &str, namespace: &str) -> Result<Service, Error> {
    let name = service_name(app_name)?;

    let mut selector = BTreeMap::new();
    selector.insert("app".to_owned(), app_name.to_owned());

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_owned()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".to_owned()),
                port: READINESS_PROBE.port,
                target_port: Some(IntOrString::Int(READINESS_PROBE.port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        status: None,
    })
}
