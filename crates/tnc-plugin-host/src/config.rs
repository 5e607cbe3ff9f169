//! Plugin config-file grammar (spec §4.2): one plugin per line,
//! `<KIND> "<name>" <path>`. Blank lines and lines starting with `#` are
//! skipped; anything else that fails to parse is skipped with a warning
//! rather than aborting the whole file.

/// Extract the `<path>` field of every line tagged `kind` ("IMC" or "IMV").
/// The `<name>` field is accepted but not retained; only the path is needed
/// to `dlopen` the plugin.
pub fn parse_config_lines(contents: &str, kind: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            parse_config_line(kind, line)
        })
        .collect()
}

fn parse_config_line(kind: &str, line: &str) -> Option<String> {
    let rest = line.strip_prefix(kind)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    let after = rest[end + 1..].trim();
    if after.is_empty() {
        None
    } else {
        Some(after.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_path_per_matching_line() {
        let contents = "# comment\nIMC \"Sample IMC\" /usr/lib/tnc/sample.imc.so\nIMV \"Sample IMV\" /usr/lib/tnc/sample.imv.so\n";
        assert_eq!(
            parse_config_lines(contents, "IMC"),
            vec!["/usr/lib/tnc/sample.imc.so".to_string()]
        );
        assert_eq!(
            parse_config_lines(contents, "IMV"),
            vec!["/usr/lib/tnc/sample.imv.so".to_string()]
        );
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        assert!(parse_config_lines("\n  \n# nothing here\n", "IMC").is_empty());
    }

    #[test]
    fn kind_prefix_must_be_a_whole_word() {
        // "IMCFOO" must not be mistaken for an IMC line.
        assert!(parse_config_lines("IMCFOO \"x\" /a\n", "IMC").is_empty());
    }
}
