use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Paths {
    /// Markdown sources, one post per `slug.md` file or `slug/index.md` directory
    pub content_dir: PathBuf,
    /// Source directory for files referenced by `![[file]]` embeds
    pub assets_dir: PathBuf,
    /// Publish target. Images land in `images/`, embeds in `assets/`
    pub public_dir: PathBuf,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Defaults {
    #[serde(default = "default_index_base_name")]
    pub index_base_name: String,
    #[serde(default)]
    pub response_cache_secs: i64,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            index_base_name: default_index_base_name(),
            response_cache_secs: 0,
        }
    }
}

fn default_index_base_name() -> String {
    "index".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct Server {
    pub address: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Site {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
}

fn default_lang() -> String {
    "en-US".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub paths: Paths,
    #[serde(default)]
    pub defaults: Defaults,
    pub server: Server,
    pub site: Site,
    pub log: Option<Log>,
}

fn parse_path(path: PathBuf) -> io::Result<PathBuf> {
    if !path.starts_with("${exe_dir}") {
        return Ok(path);
    }

    let cur_exe = env::current_exe()?;
    let exe_dir = cur_exe.parent().ok_or_else(|| {
        io::Error::new(ErrorKind::NotFound, "Executable has no parent directory")
    })?;
    let rest = path.strip_prefix("${exe_dir}").unwrap_or(&path);
    Ok(exe_dir.join(rest))
}

pub fn parse_config(cfg_content: &str) -> io::Result<Config> {
    let mut cfg: Config = match toml::from_str::<Config>(cfg_content) {
        Ok(cfg) => cfg,
        Err(e) => return Err(io::Error::new(
            ErrorKind::InvalidData, format!("Error parsing configuration file: {}", e))),
    };

    cfg.paths = Paths {
        content_dir: parse_path(cfg.paths.content_dir)?,
        assets_dir: parse_path(cfg.paths.assets_dir)?,
        public_dir: parse_path(cfg.paths.public_dir)?,
    };

    Ok(cfg)
}

pub fn read_config(cfg_path: &Path) -> io::Result<Config> {
    let cfg_content = match fs::read_to_string(cfg_path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening configuration file {}: {}", cfg_path.display(), e))),
    };

    parse_config(&cfg_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r##"
[paths]
content_dir = "content/posts"
assets_dir = "content/assets"
public_dir = "public"

[server]
address = "127.0.0.1"
port = 6789

[site]
title = "Cosine"
link = "https://blog.example.com"
description = "welcome to my blog!"
author_name = "Cosine"
author_email = "me@example.com"

[log]
level = "Debug"
log_to_console = true
"##;

    #[test]
    fn test_parse_config() {
        let cfg = parse_config(CONFIG).unwrap();
        assert_eq!(cfg.paths.content_dir, PathBuf::from("content/posts"));
        assert_eq!(cfg.defaults.index_base_name, "index");
        assert_eq!(cfg.defaults.response_cache_secs, 0);
        assert_eq!(cfg.server.port, 6789);
        assert_eq!(cfg.site.lang, "en-US");
        let log = cfg.log.unwrap();
        assert_eq!(log.level, LogLevel::Debug);
        assert!(log.location.is_none());
    }

    #[test]
    fn test_exe_dir_expansion() {
        let cfg = parse_config(&CONFIG.replace("\"public\"", "\"${exe_dir}/public\"")).unwrap();
        let exe = env::current_exe().unwrap();
        assert_eq!(cfg.paths.public_dir, exe.parent().unwrap().join("public"));
    }

    #[test]
    fn test_invalid_config() {
        let err = parse_config("[paths]\ncontent_dir = 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_missing_file() {
        let err = read_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
