use std::collections::BTreeMap;

/// Renders labels as an equality-based selector, `k1=v1,k2=v2`, in key order.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<String>>()
        .join(",")
}
