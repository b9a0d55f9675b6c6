use crate::{
    job::JobConfig,
    job::Scope,
    options::{KEY_FE_HTTP, KEY_PASSWORD, KEY_USERNAME, LEGACY_FE_NODES, LEGACY_PASSWORD, LEGACY_USER},
};
use std::collections::BTreeMap;
use tracing::debug;

/// Resolves raw `key -> value` options into one immutable [`JobConfig`].
///
/// Pairs are taken in order and the first occurrence of a key wins, so a
/// caller layering several origins passes the highest-precedence origin
/// first. Legacy bare keys are then reconciled with their namespaced
/// counterparts: a bare `user`/`password` is promoted when the namespaced
/// credential is absent, and whichever of `fe.http.url`/`fenodes` is missing
/// is synthesized from the other.
pub fn resolve<I, K, V>(options: I) -> JobConfig
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut resolved = BTreeMap::new();
    for (key, value) in options {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            continue;
        }
        resolved.entry(key).or_insert_with(|| value.into());
    }

    reconcile_legacy_keys(&mut resolved);
    JobConfig::from_resolved(resolved)
}

fn reconcile_legacy_keys(options: &mut BTreeMap<String, String>) {
    promote(options, LEGACY_USER, KEY_USERNAME);
    promote(options, LEGACY_PASSWORD, KEY_PASSWORD);

    let endpoints = Scope::Write
        .candidates(KEY_FE_HTTP)
        .into_iter()
        .find_map(|key| options.get(&key).cloned());

    match (endpoints, options.get(LEGACY_FE_NODES).cloned()) {
        (Some(urls), None) => {
            let joined = split_list(&urls).join(",");
            debug!(key = LEGACY_FE_NODES, value = %joined, "Synthesized legacy endpoint key");
            options.insert(LEGACY_FE_NODES.to_string(), joined);
        }
        (None, Some(nodes)) => {
            let joined = split_list(&nodes).join(",");
            debug!(key = KEY_FE_HTTP, value = %joined, "Synthesized endpoint list from legacy key");
            options.insert(KEY_FE_HTTP.to_string(), joined);
        }
        _ => {}
    }
}

fn promote(options: &mut BTreeMap<String, String>, legacy: &str, namespaced: &str) {
    if options.contains_key(namespaced) {
        return;
    }
    if let Some(value) = options.get(legacy).cloned() {
        debug!(from = legacy, to = namespaced, "Promoted legacy option");
        options.insert(namespaced.to_string(), value);
    }
}

/// Splits a comma-separated option into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::WRITE_PREFIX;

    fn opts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let input = opts(&[
            ("fe.http.url", "a:8030,b:8030"),
            ("user", "root"),
            ("write.properties.format", "csv"),
        ]);
        assert_eq!(resolve(input.clone()), resolve(input));
    }

    #[test]
    fn test_legacy_credentials_are_promoted() {
        let config = resolve(opts(&[("user", "root"), ("password", "secret")]));
        assert_eq!(config.get(KEY_USERNAME), Some("root"));
        assert_eq!(config.get(KEY_PASSWORD), Some("secret"));
    }

    #[test]
    fn test_namespaced_credentials_win() {
        let config = resolve(opts(&[
            ("user", "legacy"),
            ("request.auth.user", "namespaced"),
        ]));
        assert_eq!(config.get(KEY_USERNAME), Some("namespaced"));
        assert_eq!(config.get(LEGACY_USER), Some("legacy"));
    }

    #[test]
    fn test_endpoint_list_synthesizes_legacy_key() {
        let config = resolve(opts(&[("fe.http.url", "a:8030, b:8030")]));
        assert_eq!(config.get(LEGACY_FE_NODES), Some("a:8030,b:8030"));
    }

    #[test]
    fn test_scoped_endpoint_list_synthesizes_legacy_key() {
        let config = resolve(opts(&[("read.fe.http.url", "r:8030")]));
        assert_eq!(config.get(LEGACY_FE_NODES), Some("r:8030"));
        assert_eq!(config.get(KEY_FE_HTTP), None);

        let config = resolve(opts(&[
            ("read.fe.http.url", "r:8030"),
            ("write.fe.http.url", "w:8030"),
        ]));
        assert_eq!(config.get(LEGACY_FE_NODES), Some("w:8030"));
    }

    #[test]
    fn test_legacy_endpoint_synthesizes_list() {
        let config = resolve(opts(&[("fenodes", "a:8030")]));
        assert_eq!(config.get(KEY_FE_HTTP), Some("a:8030"));
    }

    #[test]
    fn test_both_endpoint_keys_are_preserved() {
        let config = resolve(opts(&[("fenodes", "legacy:8030"), ("fe.http.url", "new:8030")]));
        assert_eq!(config.get(LEGACY_FE_NODES), Some("legacy:8030"));
        assert_eq!(config.get(KEY_FE_HTTP), Some("new:8030"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let key = format!("{WRITE_PREFIX}database");
        let config = resolve(vec![
            (key.clone(), "first".to_string()),
            (key.clone(), "second".to_string()),
        ]);
        assert_eq!(config.get(&key), Some("first"));
    }
}
