//! Argument model for invoking the external database utility.
//!
//! A [`CommandLine`] is an ordered list of `key=value` arguments plus bare
//! flags. It has two renderings:
//!
//! - [`Display`](std::fmt::Display): the human-readable string form with
//!   quoted values, e.g. `db="/tmp/a b.db" out="/tmp/c.db" nogui`. This is
//!   what gets logged.
//! - [`CommandLine::argv`]: one token per argument with the quotes stripped,
//!   which is what a shell would hand the program after word splitting.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::correlation::CorrelationId;

/// A single argument on the utility's command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// `key=value` rendered without quotes (`socket=9999`).
    Plain { key: &'static str, value: String },
    /// `key="value"` rendered with quotes (paths, passwords).
    Quoted { key: &'static str, value: String },
    /// A bare flag (`nogui`).
    Flag(&'static str),
}

impl Arg {
    /// The token handed to the operating system, without shell quoting.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Plain { key, value } | Self::Quoted { key, value } => format!("{key}={value}"),
            Self::Flag(name) => (*name).to_string(),
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Plain { key, .. } | Self::Quoted { key, .. } => key,
            Self::Flag(name) => name,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain { key, value } => write!(f, "{key}={value}"),
            Self::Quoted { key, value } => write!(f, "{key}=\"{value}\""),
            Self::Flag(name) => f.write_str(name),
        }
    }
}

/// Ordered argument list for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    args: Vec<Arg>,
}

impl CommandLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key="<path>"`.
    #[must_use]
    pub fn path(self, key: &'static str, path: &Path) -> Self {
        self.quoted(key, path.display().to_string())
    }

    /// Appends `key="<value>"`.
    #[must_use]
    pub fn quoted(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.args.push(Arg::Quoted {
            key,
            value: value.into(),
        });
        self
    }

    /// Appends `key=<value>`.
    #[must_use]
    pub fn plain(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.args.push(Arg::Plain {
            key,
            value: value.to_string(),
        });
        self
    }

    /// Appends a bare flag.
    #[must_use]
    pub fn flag(mut self, name: &'static str) -> Self {
        self.args.push(Arg::Flag(name));
        self
    }

    /// Appends `encrypt=true password="<key>"` when a key is present.
    #[must_use]
    pub fn encrypt_with(self, key: Option<&str>) -> Self {
        match key {
            Some(key) => self.plain("encrypt", true).quoted("password", key),
            None => self,
        }
    }

    /// Appends the reply routing suffix: `socket=<port> socketcb=<id> nogui`.
    #[must_use]
    pub fn with_callback(self, port: u16, cb: CorrelationId) -> Self {
        self.plain("socket", port).plain("socketcb", cb).flag("nogui")
    }

    /// OS-level argument tokens.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.args.iter().map(Arg::token).collect()
    }

    /// Value of the last argument named `key`, or `Some("")` for a flag.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .rev()
            .find(|arg| arg.key() == key)
            .map(|arg| match arg {
                Arg::Plain { value, .. } | Arg::Quoted { value, .. } => value.as_str(),
                Arg::Flag(_) => "",
            })
    }

    /// Display adapter that masks `password` values, for logging.
    #[must_use]
    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(self)
    }

    /// Correlation identifier from the `socketcb=` argument, if present.
    #[must_use]
    pub fn callback_id(&self) -> Option<CorrelationId> {
        self.value_of("socketcb")?.parse().ok().map(CorrelationId)
    }

    /// Reply port from the `socket=` argument, if present.
    #[must_use]
    pub fn callback_port(&self) -> Option<u16> {
        self.value_of("socket")?.parse().ok()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

/// [`CommandLine`] rendering with secrets masked.
#[derive(Debug, Clone, Copy)]
pub struct Redacted<'a>(&'a CommandLine);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, arg) in self.0.args.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            match arg {
                Arg::Quoted { key, .. } if *key == "password" => write!(f, "{key}=\"***\"")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

/// A unit of work understood by the database utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkCommand {
    /// Build a database by running a SQL script.
    CreateFromSource {
        source: PathBuf,
        dest: PathBuf,
        key: Option<String>,
    },
    /// Copy an existing SQLite store, optionally encrypting it.
    CreateFromExistingStore {
        store: PathBuf,
        dest: PathBuf,
        key: Option<String>,
    },
    /// Decrypt an encrypted store into `dest`.
    Decrypt {
        encrypted: PathBuf,
        dest: PathBuf,
        key: String,
    },
}

impl WorkCommand {
    /// Encryption is a store copy with a key.
    #[must_use]
    pub fn encrypt(path: impl Into<PathBuf>, dest: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self::CreateFromExistingStore {
            store: path.into(),
            dest: dest.into(),
            key: Some(key.into()),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateFromSource { .. } => "create_from_source",
            Self::CreateFromExistingStore { key: Some(_), .. } => "encrypt_store",
            Self::CreateFromExistingStore { key: None, .. } => "copy_store",
            Self::Decrypt { .. } => "decrypt",
        }
    }

    /// Work arguments without the reply routing suffix.
    #[must_use]
    pub fn to_command_line(&self) -> CommandLine {
        match self {
            Self::CreateFromSource { source, dest, key } => CommandLine::new()
                .path("sql", source)
                .path("out", dest)
                .encrypt_with(key.as_deref()),
            Self::CreateFromExistingStore { store, dest, key } => CommandLine::new()
                .path("db", store)
                .path("out", dest)
                .encrypt_with(key.as_deref()),
            Self::Decrypt {
                encrypted,
                dest,
                key,
            } => CommandLine::new()
                .path("db", encrypted)
                .path("out", dest)
                .plain("decrypt", true)
                .quoted("password", key.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_from_source_without_key() {
        let cmd = WorkCommand::CreateFromSource {
            source: "test.sql".into(),
            dest: "test.db".into(),
            key: None,
        };
        assert_eq!(cmd.to_command_line().to_string(), r#"sql="test.sql" out="test.db""#);
    }

    #[test]
    fn create_from_source_with_key() {
        let cmd = WorkCommand::CreateFromSource {
            source: "a.sql".into(),
            dest: "a.db".into(),
            key: Some("s3cret".into()),
        };
        assert_eq!(
            cmd.to_command_line().to_string(),
            r#"sql="a.sql" out="a.db" encrypt=true password="s3cret""#
        );
    }

    #[test]
    fn decrypt_command() {
        let cmd = WorkCommand::Decrypt {
            encrypted: "enc.db".into(),
            dest: "plain.db".into(),
            key: "k".into(),
        };
        assert_eq!(
            cmd.to_command_line().to_string(),
            r#"db="enc.db" out="plain.db" decrypt=true password="k""#
        );
    }

    #[test]
    fn encrypt_is_store_copy_with_key() {
        let cmd = WorkCommand::encrypt("in.db", "out.db", "k2");
        assert_eq!(cmd.kind(), "encrypt_store");
        assert_eq!(
            cmd.to_command_line().to_string(),
            r#"db="in.db" out="out.db" encrypt=true password="k2""#
        );
    }

    #[test]
    fn callback_suffix_appended() {
        let line = WorkCommand::CreateFromExistingStore {
            store: "x.db".into(),
            dest: "y.db".into(),
            key: None,
        }
        .to_command_line()
        .with_callback(9999, CorrelationId(7));

        assert_eq!(
            line.to_string(),
            r#"db="x.db" out="y.db" socket=9999 socketcb=7 nogui"#
        );
        assert_eq!(line.callback_port(), Some(9999));
        assert_eq!(line.callback_id(), Some(CorrelationId(7)));
        assert_eq!(line.value_of("nogui"), Some(""));
    }

    #[test]
    fn argv_strips_quotes_and_keeps_spaces_in_one_token() {
        let line = CommandLine::new()
            .path("out", Path::new("/tmp/my dir/x.db"))
            .flag("nogui");
        assert_eq!(line.argv(), vec!["out=/tmp/my dir/x.db", "nogui"]);
    }

    #[test]
    fn redacted_masks_password_only() {
        let line = WorkCommand::encrypt("in.db", "out.db", "hunter2").to_command_line();
        assert_eq!(
            line.redacted().to_string(),
            r#"db="in.db" out="out.db" encrypt=true password="***""#
        );
        assert_eq!(line.value_of("password"), Some("hunter2"));
    }

    #[test]
    fn missing_callback_is_none() {
        let line = CommandLine::new().plain("socket", "not-a-port");
        assert!(line.callback_port().is_none());
        assert!(line.callback_id().is_none());
    }
}
