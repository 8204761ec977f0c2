// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Top-level HTTP block generator.
//!
//! Render the reverse proxy's `http { ... }` block from a handful of
//! settings, each with a sensible default. Writing the block moves an existing
//! file aside as `<name>.bak` first, replacing any older `.bak`.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{remove_file, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Tunable setting of HTTP block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpSetting {
    ServerTokens,
    IncludeMime,
    DefaultType,
    ErrorLogPath,
    ErrorLogLevel,
    AccessLogPath,
    Sendfile,
    IncludeServers,
}

impl HttpSetting {
    /// Every setting in prompt order.
    pub const ALL: [HttpSetting; 8] = [
        HttpSetting::ServerTokens,
        HttpSetting::IncludeMime,
        HttpSetting::DefaultType,
        HttpSetting::ErrorLogPath,
        HttpSetting::ErrorLogLevel,
        HttpSetting::AccessLogPath,
        HttpSetting::Sendfile,
        HttpSetting::IncludeServers,
    ];

    /// Short prompt label.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::ServerTokens => "Hide NGINX version (server_tokens)",
            Self::IncludeMime => "Path to MIME types file (include)",
            Self::DefaultType => "Default MIME type (default_type)",
            Self::ErrorLogPath => "Error log path",
            Self::ErrorLogLevel => "Error log level (e.g., warn, debug)",
            Self::AccessLogPath => "Access log path",
            Self::Sendfile => "Sendfile (on/off)",
            Self::IncludeServers => "Include server blocks directory/pattern",
        }
    }

    /// What the setting controls.
    pub fn description(self) -> &'static str {
        match self {
            Self::ServerTokens => "When off, NGINX hides its version in error pages and headers",
            Self::IncludeMime => "File defining MIME types for file extensions",
            Self::DefaultType => "MIME type for files with unknown extensions",
            Self::ErrorLogPath => "File NGINX logs error messages to",
            Self::ErrorLogLevel => "Minimum severity of logged messages",
            Self::AccessLogPath => "File NGINX logs incoming requests to",
            Self::Sendfile => "When on, NGINX transfers files with the sendfile system call",
            Self::IncludeServers => "Path or pattern of included server blocks",
        }
    }
}

/// Settings of HTTP block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBlock {
    pub server_tokens: String,
    pub include_mime: String,
    pub default_type: String,
    pub error_log_path: String,
    pub error_log_level: String,
    pub access_log_path: String,
    pub sendfile: String,
    pub include_servers: String,
}

impl HttpBlock {
    pub fn get(&self, setting: HttpSetting) -> &str {
        match setting {
            HttpSetting::ServerTokens => &self.server_tokens,
            HttpSetting::IncludeMime => &self.include_mime,
            HttpSetting::DefaultType => &self.default_type,
            HttpSetting::ErrorLogPath => &self.error_log_path,
            HttpSetting::ErrorLogLevel => &self.error_log_level,
            HttpSetting::AccessLogPath => &self.access_log_path,
            HttpSetting::Sendfile => &self.sendfile,
            HttpSetting::IncludeServers => &self.include_servers,
        }
    }

    pub fn set(&mut self, setting: HttpSetting, value: impl Into<String>) {
        let slot = match setting {
            HttpSetting::ServerTokens => &mut self.server_tokens,
            HttpSetting::IncludeMime => &mut self.include_mime,
            HttpSetting::DefaultType => &mut self.default_type,
            HttpSetting::ErrorLogPath => &mut self.error_log_path,
            HttpSetting::ErrorLogLevel => &mut self.error_log_level,
            HttpSetting::AccessLogPath => &mut self.access_log_path,
            HttpSetting::Sendfile => &mut self.sendfile,
            HttpSetting::IncludeServers => &mut self.include_servers,
        };
        *slot = value.into();
    }

    /// Write rendered block to target path.
    ///
    /// An existing file is renamed to `<name>.bak` first, replacing an older
    /// backup.
    ///
    /// # Errors
    ///
    /// - Return [`HttpConfError::Backup`] if existing file cannot be moved.
    /// - Return [`HttpConfError::Write`] if block cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<HttpConfWrite> {
        let path = path.as_ref();
        let backup = if path.exists() {
            let mut backup = path.as_os_str().to_os_string();
            backup.push(".bak");
            let backup = PathBuf::from(backup);

            match remove_file(&backup) {
                Err(err) if err.kind() != ErrorKind::NotFound => {
                    return Err(HttpConfError::Backup {
                        source: err,
                        path: backup,
                    });
                }
                _ => {}
            }
            rename(path, &backup).map_err(|err| HttpConfError::Backup {
                source: err,
                path: backup.clone(),
            })?;
            info!("moved existing {:?} to {:?}", path.display(), backup.display());
            Some(backup)
        } else {
            None
        };

        write(path, self.to_string()).map_err(|err| HttpConfError::Write {
            source: err,
            path: path.into(),
        })?;
        info!("wrote HTTP block to {:?}", path.display());

        Ok(HttpConfWrite {
            path: path.into(),
            backup,
        })
    }
}

impl Default for HttpBlock {
    fn default() -> Self {
        Self {
            server_tokens: "off".into(),
            include_mime: "mime.types".into(),
            default_type: "application/octet-stream".into(),
            error_log_path: "/var/log/nginx/error.log".into(),
            error_log_level: "warn".into(),
            access_log_path: "/var/log/nginx/access.log".into(),
            sendfile: "on".into(),
            include_servers: "/etc/nginx/conf.d/servers/*.conf".into(),
        }
    }
}

impl Display for HttpBlock {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "###")?;
        writeln!(fmt, "# HTTP BLOCK")?;
        writeln!(fmt, "###")?;
        writeln!(fmt)?;
        writeln!(fmt, "http {{")?;
        writeln!(fmt, "    # Hide NGINX version")?;
        writeln!(fmt, "    server_tokens   {};", self.server_tokens)?;
        writeln!(fmt, "    include         {};", self.include_mime)?;
        writeln!(fmt, "    default_type    {};", self.default_type)?;
        writeln!(fmt)?;
        writeln!(
            fmt,
            "    error_log       {} {};    # change warn to debug if installing a development server",
            self.error_log_path, self.error_log_level
        )?;
        writeln!(
            fmt,
            "    access_log      {};       # enable access logging",
            self.access_log_path
        )?;
        writeln!(fmt, "    sendfile        {};", self.sendfile)?;
        writeln!(fmt)?;
        writeln!(fmt, "    ###")?;
        writeln!(fmt, "    # SERVER BLOCKS")?;
        writeln!(fmt, "    ###")?;
        writeln!(fmt, "    include          {};", self.include_servers)?;
        writeln!(fmt, "}}")
    }
}

/// Outcome of writing HTTP block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfWrite {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
}

/// HTTP block error types.
#[derive(Debug, thiserror::Error)]
pub enum HttpConfError {
    #[error("failed to move existing HTTP block to {:?}", path.display())]
    Backup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to write HTTP block to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = HttpConfError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::read_to_string;

    #[test]
    fn render_default_block() {
        let expect = indoc! {"
            ###
            # HTTP BLOCK
            ###

            http {
                # Hide NGINX version
                server_tokens   off;
                include         mime.types;
                default_type    application/octet-stream;

                error_log       /var/log/nginx/error.log warn;    # change warn to debug if installing a development server
                access_log      /var/log/nginx/access.log;       # enable access logging
                sendfile        on;

                ###
                # SERVER BLOCKS
                ###
                include          /etc/nginx/conf.d/servers/*.conf;
            }
        "};
        assert_eq!(HttpBlock::default().to_string(), expect);
    }

    #[test]
    fn set_and_get_setting() {
        let mut block = HttpBlock::default();
        block.set(HttpSetting::ErrorLogLevel, "debug");
        assert_eq!(block.get(HttpSetting::ErrorLogLevel), "debug");
        assert!(block.to_string().contains("error.log debug;"));
    }

    #[sealed_test]
    fn write_moves_previous_aside() -> anyhow::Result<()> {
        std::fs::write("http.conf.bak", "oldest")?;
        std::fs::write("http.conf", "previous")?;

        let written = HttpBlock::default().write("http.conf")?;
        assert_eq!(written.backup, Some(PathBuf::from("http.conf.bak")));
        assert_eq!(read_to_string("http.conf.bak")?, "previous");
        assert_eq!(read_to_string("http.conf")?, HttpBlock::default().to_string());

        Ok(())
    }

    #[sealed_test]
    fn write_fresh_file() -> anyhow::Result<()> {
        let written = HttpBlock::default().write("http.conf")?;
        assert_eq!(written.backup, None);
        assert!(Path::new("http.conf").exists());

        Ok(())
    }
}
