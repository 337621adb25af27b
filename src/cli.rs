use std::str::FromStr;

/// Command-line arguments after the program name.
pub fn args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Value of `--name=value` or `--name value`.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(name)
            && let Some(raw) = raw.strip_prefix('=')
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.starts_with("--")
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn parse_arg<T: FromStr>(args: &[String], name: &str) -> Option<T> {
    arg_value(args, name).and_then(|raw| raw.parse::<T>().ok())
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

/// Arguments that are neither flags nor flag values. `valued` lists the
/// flags that take a separate value.
pub fn positionals(args: &[String], valued: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = valued.contains(&arg.as_str());
            continue;
        }
        out.push(arg.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn reads_both_value_forms() {
        let args = argv("--json out.json --trials=500 --plain");
        assert_eq!(arg_value(&args, "--json").as_deref(), Some("out.json"));
        assert_eq!(parse_arg::<u32>(&args, "--trials"), Some(500));
        assert!(has_flag(&args, "--plain"));
        assert_eq!(arg_value(&args, "--plain"), None);
    }

    #[test]
    fn flag_prefix_is_not_a_match() {
        let args = argv("--jsonl=x");
        assert_eq!(arg_value(&args, "--json"), None);
    }

    #[test]
    fn positionals_skip_flag_values() {
        let args = argv("Spain --divisor 400 Uruguay --plain");
        assert_eq!(positionals(&args, &["--divisor"]), vec!["Spain", "Uruguay"]);
    }
}
