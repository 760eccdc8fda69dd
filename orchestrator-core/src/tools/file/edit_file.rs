//! Find-and-replace primitive shared by `apply_patch` and `multiedit`.

/// Replaces `old` with `new` in `content`. Fails if `old` is empty, absent,
/// or (when `replace_all` is false) ambiguous — present more than once,
/// since a single unqualified replace would otherwise pick an arbitrary
/// occurrence.
pub fn replace(content: &str, old: &str, new: &str, replace_all: bool) -> Result<String, String> {
    if old.is_empty() {
        return Err("oldString must not be empty".to_string());
    }
    let count = content.matches(old).count();
    if count == 0 {
        return Err(format!("oldString not found: {}", preview(old)));
    }
    if !replace_all && count > 1 {
        return Err(format!(
            "oldString matches {count} locations; pass replaceAll or add more context to disambiguate"
        ));
    }
    if replace_all {
        Ok(content.replace(old, new))
    } else {
        Ok(content.replacen(old, new, 1))
    }
}

fn preview(s: &str) -> String {
    let truncated: String = s.chars().take(80).collect();
    if truncated.len() < s.len() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_single_occurrence() {
        assert_eq!(replace("a b a", "b", "c", false).unwrap(), "a c a");
    }

    #[test]
    fn rejects_ambiguous_match_without_replace_all() {
        let err = replace("a a a", "a", "b", false).unwrap_err();
        assert!(err.contains("3 locations"));
    }

    #[test]
    fn replace_all_replaces_every_occurrence() {
        assert_eq!(replace("a a a", "a", "b", true).unwrap(), "b b b");
    }

    #[test]
    fn missing_old_string_errors() {
        assert!(replace("abc", "zzz", "y", false).is_err());
    }

    #[test]
    fn empty_old_string_errors() {
        assert!(replace("abc", "", "y", false).is_err());
    }
}
