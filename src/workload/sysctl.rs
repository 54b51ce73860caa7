use k8s_openapi::api::core::v1::Sysctl;
use log::warn;
use regex::Regex;

use crate::utils::error::{Error, PartialParseWarning};

/// Dotted or slashed segments of lowercase alphanumerics, `-` and `_`.
const SYSCTL_NAME_PATTERN: &str =
    r"^([a-z0-9]([-_a-z0-9]*[a-z0-9])?[./])*[a-z0-9]([-_a-z0-9]*[a-z0-9])?$";

/// Tolerant parser for `key=value[, key=value...]` kernel parameter lists.
#[derive(Debug, Clone)]
pub struct SysctlParser {
    name_pattern: Regex,
}

impl SysctlParser {
    pub fn new() -> Result<Self, Error> {
        Ok(SysctlParser {
            name_pattern: Regex::new(SYSCTL_NAME_PATTERN)?,
        })
    }

    /// Entries that are not a single `=` with non-empty sides, or whose key is
    /// not a valid sysctl name, are dropped and reported as warnings.
    pub fn parse(&self, spec: &str) -> (Vec<Sysctl>, Vec<PartialParseWarning>) {
        let mut sysctls = Vec::new();
        let mut warnings = Vec::new();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let pair: Vec<&str> = entry.split('=').map(str::trim).collect();
            let warning = match pair.as_slice() {
                [name, value] if !name.is_empty() && !value.is_empty() => {
                    if self.name_pattern.is_match(name) {
                        sysctls.push(Sysctl {
                            name: name.to_string(),
                            value: value.to_string(),
                        });
                        continue;
                    }
                    PartialParseWarning::new("sysctl", entry, "invalid kernel parameter name")
                }
                _ => PartialParseWarning::new("sysctl", entry, "expected a single key=value pair"),
            };

            warn!("{}", warning);
            warnings.push(warning);
        }

        (sysctls, warnings)
    }
}
