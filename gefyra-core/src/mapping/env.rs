use std::collections::BTreeMap;

use super::MappingError;

pub type EnvMap = BTreeMap<String, String>;

/// Splits a `KEY=value` token on the first `=` only.
pub fn parse_env_token(token: &str) -> Result<(String, String), MappingError> {
    match token.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(MappingError::InvalidEnv(token.to_owned())),
    }
}

pub fn parse_env_tokens<I, S>(tokens: I) -> Result<EnvMap, MappingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut env = EnvMap::new();

    for token in tokens {
        let (key, value) = parse_env_token(token.as_ref())?;

        env.insert(key, value);
    }

    Ok(env)
}

/// Parses the raw output of a remote `env` call. Lines without `=` are
/// skipped instead of rejected.
pub fn parse_remote_env(raw: &str) -> EnvMap {
    raw.lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Overrides always win over the base map.
pub fn merge_env(mut base: EnvMap, overrides: EnvMap) -> EnvMap {
    base.extend(overrides);

    base
}

pub fn to_env_list(env: &EnvMap) -> Vec<String> {
    env.iter().map(|(key, value)| format!("{key}={value}")).collect()
}

#[cfg(test)]
mod tests {
    use crate::mapping::MappingError;

    use super::{merge_env, parse_env_token, parse_env_tokens, parse_remote_env, to_env_list, EnvMap};

    #[test]
    fn splits_on_first_equals_only() {
        let env = parse_env_tokens([
            "APP=test-app",
            "TEST=tautology=tautology=tautology",
            "123NUM=blubb",
            "VERSION=1.2.3",
            "EMPTY=",
        ])
        .unwrap();

        assert_eq!(
            env,
            EnvMap::from([
                ("APP".to_owned(), "test-app".to_owned()),
                ("TEST".to_owned(), "tautology=tautology=tautology".to_owned()),
                ("123NUM".to_owned(), "blubb".to_owned()),
                ("VERSION".to_owned(), "1.2.3".to_owned()),
                ("EMPTY".to_owned(), "".to_owned()),
            ])
        );
    }

    #[test]
    fn token_without_equals_is_rejected() {
        let error = parse_env_token("APP").unwrap_err();

        assert_eq!(error, MappingError::InvalidEnv("APP".to_owned()));
        assert!(error.to_string().contains("use 'KEY=value'"));
        assert!(parse_env_token("=value").is_err());
    }

    #[test]
    fn later_token_overwrites_earlier() {
        let env = parse_env_tokens(["A=1", "A=2"]).unwrap();

        assert_eq!(env["A"], "2");
    }

    #[test]
    fn remote_env_skips_lines_without_equals() {
        let env = parse_remote_env("PATH=/usr/bin\ngarbage\nA=1=2\n\nB=2\n");

        assert_eq!(env.len(), 3);
        assert_eq!(env["A"], "1=2");
        assert_eq!(env["PATH"], "/usr/bin");
    }

    #[test]
    fn overrides_win_regardless_of_base_content() {
        let remote = parse_remote_env("A=1\nB=2\n");
        let overrides = parse_env_tokens(["B=3", "C=4"]).unwrap();

        let merged = merge_env(remote, overrides);

        assert_eq!(to_env_list(&merged), vec!["A=1", "B=3", "C=4"]);
    }
}
