/// Namespace prepended to tube names when none is configured
pub const DEFAULT_TUBE_NAMESPACE: &str = "backburner.worker.queue";

/// Turn a class-style name into a tube-style name.
///
/// `SendEmail` becomes `send-email`, `HTTPServer` becomes `http-server`,
/// `Reports::Nightly_run` becomes `reports/nightly-run`.
pub fn dasherize(word: &str) -> String {
    let word = word.replace("::", "/");
    let chars: Vec<char> = word.chars().collect();
    let mut out = String::with_capacity(word.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let after_word = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let acronym_end = prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase());
            if after_word || acronym_end {
                out.push('-');
            }
        }

        match c {
            '_' => out.push('-'),
            c => out.push(c.to_ascii_lowercase()),
        }
    }

    out
}

/// Expand a logical queue name into the namespaced tube name used on the
/// server.
///
/// Already-expanded names come back unchanged, so this can be applied to
/// anything that looks like a queue name before talking to the connection.
/// Anything after a `:` is dropped.
pub fn expand_tube_name(namespace: &str, name: &str) -> String {
    let prefix = namespace.trim_end_matches('.');
    let name = dasherize(name.trim());

    let expanded = if prefix.is_empty() {
        name
    } else {
        let key = prefix.to_ascii_lowercase();
        let local = name.strip_prefix(&key).unwrap_or(&name);
        format!("{}.{}", prefix, local)
    };

    let mut collapsed = String::with_capacity(expanded.len());
    for c in expanded.chars() {
        if c == '.' && collapsed.ends_with('.') {
            continue;
        }
        collapsed.push(c);
    }

    match collapsed.split_once(':') {
        Some((head, _)) => head.to_string(),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dasherize() {
        assert_eq!(dasherize("SendEmail"), "send-email");
        assert_eq!(dasherize("HTTPServer"), "http-server");
        assert_eq!(dasherize("Reports::Nightly_run"), "reports/nightly-run");
        assert_eq!(dasherize("Job2Go"), "job2-go");
        assert_eq!(dasherize("already-dashed"), "already-dashed");
    }

    #[test]
    fn test_expand_tube_name() {
        let ns = "backburner.worker.queue";

        assert_eq!(expand_tube_name(ns, "SendEmail"), "backburner.worker.queue.send-email");
        assert_eq!(expand_tube_name(ns, "newsletter"), "backburner.worker.queue.newsletter");
        assert_eq!(
            expand_tube_name(ns, "backburner.worker.queue.newsletter"),
            "backburner.worker.queue.newsletter"
        );
        assert_eq!(expand_tube_name("app.", "mail:5"), "app.mail");
        assert_eq!(expand_tube_name("app", ".mail"), "app.mail");
    }

    #[test]
    fn test_expand_without_namespace() {
        assert_eq!(expand_tube_name("", "SendEmail"), "send-email");
    }

    proptest! {
        #[test]
        fn expansion_is_idempotent(
            ns in "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}",
            name in "[A-Za-z][A-Za-z0-9_]{0,15}",
        ) {
            let once = expand_tube_name(&ns, &name);
            let twice = expand_tube_name(&ns, &once);
            prop_assert_eq!(&once, &twice);
            let prefix = format!("{}.", ns);
            prop_assert!(once.starts_with(&prefix));
        }
    }
}
