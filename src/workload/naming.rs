use crate::utils::error::Error;

const ESCAPED_DOT: &str = "\\.";

/// Container name for an app: every literal `\.` becomes `-`, plain dots stay.
pub fn container_name(app_name: &str) -> String {
    app_name.replace(ESCAPED_DOT, "-")
}

/// Service name for an app: dots become `-`, and a leading digit gets an `s`
/// prefix since service names must start with a letter.
pub fn service_name(app_name: &str) -> Result<String, Error> {
    let first = match app_name.chars().next() {
        Some(first) => first,
        None => {
            return Err(Error::ValidationError(
                "appName is required to derive a service name".to_owned(),
            ))
        }
    };

    let service = app_name.replace('.', "-");
    if first.is_ascii_digit() {
        Ok(format!("s{}", service))
    } else {
        Ok(service)
    }
}

/// Pod hostname: literal `\.` sequences are removed.
pub fn hostname(pod_name: &str) -> String {
    pod_name.replace(ESCAPED_DOT, "")
}

/// `ENV` variable value: `fat*` and `lpt*` map to `fat`, `uat*` to `uat`,
/// anything else passes through.
pub fn environment_label(environment: &str) -> String {
    if environment.starts_with("fat") || environment.starts_with("lpt") {
        "fat".to_owned()
    } else if environment.starts_with("uat") {
        "uat".to_owned()
    } else {
        environment.to_owned()
    }
}
