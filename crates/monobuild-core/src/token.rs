//! トークン置換エンジン
//!
//! テンプレート中の `#{NAME}#` を値で置き換えます。
//!
//! キーは大文字に変換してから以下の順で検索し、最初に見つかった値を使います:
//! 1. 名前付き値（キーは大文字化される）
//! 2. 名前付き値（`.` を `_` に置き換えたキー）
//! 3. 環境変数
//! 4. 環境変数（`.` を `_` に置き換えたキー）

use crate::error::{CoreError, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

/// 名前付き値
pub type Variables = HashMap<String, serde_json::Value>;

/// `#{...}#` にマッチするパターン（最短一致）
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\{(.*?)\}#").expect("token pattern is a valid regex"));

/// 値が見つからないトークンの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    /// `MissingToken` エラーにする
    Error,
    /// プレースホルダーをそのまま残す
    Keep,
}

/// テンプレートにトークンが含まれているか
pub fn contains_tokens(text: &str) -> bool {
    TOKEN_PATTERN.is_match(text)
}

/// テンプレート中のトークンを置換
///
/// 値が見つかったトークンは、同じプレースホルダーの出現箇所すべてが置き換えられる。
pub fn substitute(
    template: &str,
    values: &Variables,
    env: &HashMap<String, String>,
    on_missing: OnMissing,
) -> Result<String> {
    let upper_cased: HashMap<String, String> = values
        .iter()
        .filter_map(|(key, value)| value_to_string(value).map(|v| (key.to_uppercase(), v)))
        .collect();

    let placeholders: Vec<(String, String)> = TOKEN_PATTERN
        .captures_iter(template)
        .map(|caps| (caps[0].to_string(), caps[1].to_string()))
        .collect();

    let mut content = template.to_string();
    let mut processed = HashSet::new();

    for (placeholder, raw_key) in placeholders {
        if !processed.insert(placeholder.clone()) {
            continue;
        }

        let key = raw_key.to_uppercase();
        match lookup(&key, &upper_cased, env) {
            Some(value) => {
                content = content.replace(&placeholder, value);
            }
            None if on_missing == OnMissing::Error => {
                debug!(
                    key = %key,
                    variables = ?upper_cased.keys().collect::<Vec<_>>(),
                    "No value found for token"
                );
                return Err(CoreError::MissingToken { key: raw_key });
            }
            None => {
                debug!(key = %key, "Leaving unresolved token in place");
            }
        }
    }

    Ok(content)
}

fn lookup<'a>(
    key: &str,
    values: &'a HashMap<String, String>,
    env: &'a HashMap<String, String>,
) -> Option<&'a str> {
    let underscored = key.replace('.', "_");
    values
        .get(key)
        .or_else(|| values.get(&underscored))
        .or_else(|| env.get(key))
        .or_else(|| env.get(&underscored))
        .map(String::as_str)
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, serde_json::Value)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let values = vars(&[("servicename", json!("api"))]);
        let result = substitute(
            "name: #{servicename}#\napp: #{SERVICENAME}#-#{servicename}#",
            &values,
            &HashMap::new(),
            OnMissing::Error,
        )
        .unwrap();
        assert_eq!(result, "name: api\napp: api-api");
    }

    #[test]
    fn test_named_values_take_precedence_over_env() {
        let values = vars(&[("version", json!("1.0"))]);
        let env = env(&[("VERSION", "9.9")]);
        let result = substitute("v=#{version}#", &values, &env, OnMissing::Error).unwrap();
        assert_eq!(result, "v=1.0");
    }

    #[test]
    fn test_env_fallback_and_dot_variant() {
        let env = env(&[("DB_HOST", "postgres"), ("PORT", "5432")]);
        let result = substitute(
            "#{db.host}#:#{port}#",
            &Variables::new(),
            &env,
            OnMissing::Error,
        )
        .unwrap();
        assert_eq!(result, "postgres:5432");
    }

    #[test]
    fn test_dot_variant_in_named_values() {
        let values = vars(&[("image_tag", json!("latest"))]);
        let result =
            substitute("#{image.tag}#", &values, &HashMap::new(), OnMissing::Error).unwrap();
        assert_eq!(result, "latest");
    }

    #[test]
    fn test_numbers_are_converted_to_text() {
        let values = vars(&[("replicas", json!(3)), ("ratio", json!(0.5))]);
        let result = substitute(
            "#{replicas}# #{ratio}#",
            &values,
            &HashMap::new(),
            OnMissing::Error,
        )
        .unwrap();
        assert_eq!(result, "3 0.5");
    }

    #[test]
    fn test_missing_token_error_names_the_key() {
        let result = substitute(
            "a: #{known}#\nb: #{missing.key}#",
            &vars(&[("known", json!("x"))]),
            &HashMap::new(),
            OnMissing::Error,
        );
        match result {
            Err(CoreError::MissingToken { key }) => assert_eq!(key, "missing.key"),
            other => panic!("Expected MissingToken, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_token_is_kept_in_keep_mode() {
        let result = substitute(
            "image: #{image}#\nsecret: #{secret}#",
            &vars(&[("image", json!("r/a@sha256:1"))]),
            &HashMap::new(),
            OnMissing::Keep,
        )
        .unwrap();
        assert_eq!(result, "image: r/a@sha256:1\nsecret: #{secret}#");
    }

    #[test]
    fn test_null_value_counts_as_missing() {
        let result = substitute(
            "#{empty}#",
            &vars(&[("empty", serde_json::Value::Null)]),
            &HashMap::new(),
            OnMissing::Keep,
        )
        .unwrap();
        assert_eq!(result, "#{empty}#");
    }

    #[test]
    fn test_placeholders_on_one_line_match_shortest() {
        let values = vars(&[("a", json!("1")), ("b", json!("2"))]);
        let result =
            substitute("#{a}#/#{b}#", &values, &HashMap::new(), OnMissing::Error).unwrap();
        assert_eq!(result, "1/2");
    }

    #[test]
    fn test_resolved_text_is_unchanged_by_second_pass() {
        let values = vars(&[("servicename", json!("api")), ("port", json!(80))]);
        let env = env(&[("REGION", "eu")]);
        let template = "svc: #{servicename}#\nport: #{port}#\nregion: #{region}#";

        let once = substitute(template, &values, &env, OnMissing::Error).unwrap();
        let twice = substitute(&once, &values, &env, OnMissing::Error).unwrap();
        assert_eq!(once, twice);
        assert!(!contains_tokens(&once));
    }

    #[test]
    fn test_contains_tokens() {
        assert!(contains_tokens("image: #{IMAGE}#"));
        assert!(!contains_tokens("image: nginx"));
        assert!(!contains_tokens("#{unterminated"));
    }
}
