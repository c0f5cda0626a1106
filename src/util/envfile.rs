use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_TEMPLATE_PATH: &str = ".env.template";

/// Parse `KEY=value` lines. Blank lines and `#` comments are ignored; values
/// may be wrapped in single or double quotes.
pub fn parse_env_str(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((key, val)) = s.split_once('=') else {
            warn!("ignoring .env line {} without '=': {}", idx + 1, line);
            continue;
        };
        let key = key.trim();
        let mut val = val.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }
        if !key.is_empty() {
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

/// Parse `.env` in the working directory, if present. Does not modify the
/// process environment.
pub fn parse_env_file() -> Result<HashMap<String, String>> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path).context("reading .env")?;
    Ok(parse_env_str(&content))
}

/// Load `.env` into the process environment without overriding variables
/// that are already set. Must run before any other thread starts.
pub fn load_dotenv_if_present() -> Result<usize> {
    let mut loaded = 0;
    for (k, v) in parse_env_file()? {
        if std::env::var_os(&k).is_none() {
            unsafe {
                std::env::set_var(&k, &v);
            }
            loaded += 1;
        }
    }
    Ok(loaded)
}

const TEMPLATE: &str = r#"# addr_dedupe environment configuration template
# Copy this file to .env and uncomment what you need.
# Command-line flags take precedence over these values.

# Logging
#RUST_LOG=info
# 1 switches to the tracing subscriber
#ADDR_DEDUPE_TRACING=0

# map
#ADDR_DEDUPE_ZOOM=19

# reduce
#ADDR_DEDUPE_FORMAT=csv
#ADDR_DEDUPE_LINKAGE=connected
#ADDR_DEDUPE_SCOPE=per-group
#ADDR_DEDUPE_TOKENS=/path/to/street_tokens.txt
#ADDR_DEDUPE_PRESORTED=false
#ADDR_DEDUPE_SORT=sort
#ADDR_DEDUPE_SUMMARY=summary.csv
"#;

/// Write a commented `.env.template` listing every supported variable.
pub fn write_env_template(path: &Path) -> Result<()> {
    fs::write(path, TEMPLATE).with_context(|| format!("writing {}", path.display()))
}
