/// Deterministic view name for the GenerationQuery `name`.
///
/// `view_` followed by the name, with every character outside
/// `[A-Za-z0-9_]` replaced by `_`.
pub fn generation_query_view_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 5);
    out.push_str("view_");
    out.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' {
            c
        } else {
            '_'
        }
    }));
    out
}

/// `true` if `name` can be used unquoted as a view name.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_and_sanitized() {
        assert_eq!(generation_query_view_name("A"), "view_A");
        assert_eq!(generation_query_view_name("pod-cpu.usage"), "view_pod_cpu_usage");
        assert_eq!(generation_query_view_name("node_memory"), "view_node_memory");
    }

    #[test]
    fn generated_names_are_valid_identifiers() {
        for name in ["A", "pod-cpu", "9lives", "ünïcode"] {
            assert!(is_valid_identifier(&generation_query_view_name(name)), "{name}");
        }
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a;drop"));
    }
}
