//! Loads conversion job files.
//!
//! Job files are YAML with environment variable substitution using
//! `${VAR}` and `${VAR:-default}` syntax, validated after parsing.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::JobConfig;

// ============================================================================
// Loading Functions
// ============================================================================

/// Load and validate a job file.
pub fn load_job_config<P: AsRef<Path>>(path: P) -> Result<JobConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read job config from {:?}", path))?;

    parse_job_config(&content).with_context(|| format!("Invalid job config {:?}", path))
}

pub fn parse_job_config(content: &str) -> Result<JobConfig> {
    let expanded = expand_env_vars(content)?;

    let config: JobConfig =
        serde_yaml::from_str(&expanded).context("Failed to parse job config YAML")?;

    config.validate()?;

    Ok(config)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve `VAR` or `VAR:-default`
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("COG_TEST_VAR", "test_value");
        let result = expand_env_vars("prefix_${COG_TEST_VAR}_suffix").unwrap();
        assert_eq!(result, "prefix_test_value_suffix");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("COG_NONEXISTENT_VAR");
        let result = expand_env_vars("value_${COG_NONEXISTENT_VAR:-default}_end").unwrap();
        assert_eq!(result, "value_default_end");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("COG_REQUIRED_VAR");
        assert!(expand_env_vars("${COG_REQUIRED_VAR}").is_err());
    }

    #[test]
    fn test_expand_env_vars_unclosed() {
        assert!(expand_env_vars("bucket: ${S3_BUCKET").is_err());
    }

    #[test]
    fn test_resolve_var_expr_override_default() {
        std::env::set_var("COG_SET_VAR", "custom");
        let result = resolve_var_expr("COG_SET_VAR:-default").unwrap();
        assert_eq!(result, "custom");
    }

    #[test]
    fn test_parse_job_with_env() {
        std::env::set_var("COG_TEST_BUCKET", "ghgc-data-store-staging");
        std::env::remove_var("COG_TEST_PREFIX");
        let job = parse_job_config(
            r#"
plugin: odiac_ffco2_v2024
source:
  type: directory
  path: /data/odiac
output:
  type: s3
  bucket: ${COG_TEST_BUCKET}
  prefix: ${COG_TEST_PREFIX:-odiac-ffco2-monthgrid-v2024/}
"#,
        )
        .unwrap();

        match &job.output {
            OutputConfig::S3 { bucket, prefix } => {
                assert_eq!(bucket.as_deref(), Some("ghgc-data-store-staging"));
                assert_eq!(prefix, "odiac-ffco2-monthgrid-v2024/");
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_load_job_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        fs::write(
            &path,
            "plugin: gpw\nsource: {type: directory, path: ./in}\noutput: {type: local, path: ./out}\n",
        )
        .unwrap();
        assert_eq!(load_job_config(&path).unwrap().plugin, "gpw");

        assert!(load_job_config(dir.path().join("missing.yaml")).is_err());
    }
}
