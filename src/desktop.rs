//! Desktop integration: application launching and URL opening

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::{Error, Result};

/// Base URL for web searches
pub const SEARCH_URL: &str = "https://www.google.com/search?q=";

/// Base URL for driving directions
pub const MAPS_URL: &str = "https://www.google.com/maps/dir/?api=1&destination=";

/// Opens resources on the user's desktop
pub trait Desktop: Send + Sync {
    /// Launch the executable (or app bundle) at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned
    fn launch(&self, path: &Path) -> Result<()>;

    /// Open `url` in the default browser
    ///
    /// # Errors
    ///
    /// Returns error if the platform opener cannot be spawned
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Desktop backed by the platform's process launcher
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDesktop;

impl SystemDesktop {
    fn spawn_detached(program: &str, args: &[&str]) -> Result<()> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|e| Error::Launch(format!("failed to spawn {program}: {e}")))
    }
}

impl Desktop for SystemDesktop {
    fn launch(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "launching application");
        let path_str = path.to_string_lossy();

        if cfg!(target_os = "macos") {
            Self::spawn_detached("open", &[&path_str])
        } else {
            Self::spawn_detached(&path_str, &[])
        }
    }

    fn open_url(&self, url: &str) -> Result<()> {
        tracing::info!(url, "opening url");

        if cfg!(target_os = "macos") {
            Self::spawn_detached("open", &[url])
        } else if cfg!(target_os = "windows") {
            Self::spawn_detached("cmd", &["/C", "start", "", url])
        } else {
            Self::spawn_detached("xdg-open", &[url])
        }
    }
}

/// Spoken application names mapped to executables
#[derive(Debug, Clone, Default)]
pub struct AppCatalog {
    paths: BTreeMap<String, PathBuf>,
    aliases: BTreeMap<String, String>,
}

impl AppCatalog {
    /// Build a catalog from name → path and alias → name tables
    ///
    /// Keys are lowercased so lookups match normalized utterances.
    #[must_use]
    pub fn new(paths: BTreeMap<String, PathBuf>, aliases: BTreeMap<String, String>) -> Self {
        Self {
            paths: paths
                .into_iter()
                .map(|(name, path)| (name.trim().to_lowercase(), path))
                .collect(),
            aliases: aliases
                .into_iter()
                .map(|(alias, name)| (alias.trim().to_lowercase(), name.trim().to_lowercase()))
                .collect(),
        }
    }

    /// Common applications for the current platform
    #[must_use]
    pub fn platform_default() -> Self {
        let paths: &[(&str, &str)] = if cfg!(target_os = "windows") {
            &[
                ("notepad", r"C:\Windows\System32\notepad.exe"),
                ("calculator", r"C:\Windows\System32\calc.exe"),
                ("paint", r"C:\Windows\System32\mspaint.exe"),
            ]
        } else if cfg!(target_os = "macos") {
            &[
                ("notepad", "/System/Applications/TextEdit.app"),
                ("calculator", "/System/Applications/Calculator.app"),
                ("vs code", "/Applications/Visual Studio Code.app"),
                ("terminal", "/System/Applications/Utilities/Terminal.app"),
            ]
        } else {
            &[
                ("notepad", "/usr/bin/gedit"),
                ("calculator", "/usr/bin/gnome-calculator"),
                ("vs code", "/usr/bin/code"),
                ("terminal", "/usr/bin/gnome-terminal"),
            ]
        };

        let aliases = [
            ("vscode", "vs code"),
            ("visual studio code", "vs code"),
            ("code", "vs code"),
            ("text editor", "notepad"),
            ("calc", "calculator"),
        ];

        Self::new(
            paths
                .iter()
                .map(|(name, path)| ((*name).to_string(), PathBuf::from(path)))
                .collect(),
            aliases
                .iter()
                .map(|(alias, name)| ((*alias).to_string(), (*name).to_string()))
                .collect(),
        )
    }

    /// Canonical application names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Resolve an alias to its canonical name
    #[must_use]
    pub fn normalize(&self, name: &str) -> String {
        let name = name.trim().to_lowercase();
        self.aliases.get(&name).cloned().unwrap_or(name)
    }

    /// Find the executable for a spoken name
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is unknown or its path does not exist
    pub fn locate(&self, name: &str) -> Result<(String, &Path)> {
        let canonical = self.normalize(name);
        let path = self
            .paths
            .get(&canonical)
            .ok_or_else(|| Error::NotFound(format!("no application named '{canonical}'")))?;

        if !path.exists() {
            return Err(Error::NotFound(format!(
                "application path missing: {}",
                path.display()
            )));
        }

        Ok((canonical, path.as_path()))
    }

    /// The known name or alias that `target` starts with, as a whole word
    ///
    /// Longer names win so "visual studio code" beats "code".
    #[must_use]
    pub fn known_prefix(&self, target: &str) -> Option<&str> {
        let mut candidates: Vec<&str> = self
            .paths
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
            .collect();
        candidates.sort_by_key(|name| std::cmp::Reverse(name.len()));

        candidates.into_iter().find(|name| {
            target
                .strip_prefix(name)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
        })
    }
}

/// URL for a domain-like target, or `None` if it should be searched instead
///
/// A single token containing a dot counts as a domain; a missing scheme
/// defaults to https.
#[must_use]
pub fn direct_url(target: &str) -> Option<String> {
    let target = target.trim();
    if !target.contains('.') || target.contains(char::is_whitespace) {
        return None;
    }

    if target.starts_with("http://") || target.starts_with("https://") {
        Some(target.to_string())
    } else {
        Some(format!("https://{target}"))
    }
}

/// Web search URL for `query`
#[must_use]
pub fn search_url(query: &str) -> String {
    format!("{SEARCH_URL}{}", urlencoding::encode(query.trim()))
}

/// Directions URL for `place`
#[must_use]
pub fn maps_url(place: &str) -> String {
    format!("{MAPS_URL}{}", urlencoding::encode(place.trim()))
}
