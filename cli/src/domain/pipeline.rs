//! Command pipeline types: the ordered command list, placeholder
//! substitution, and per-command execution records.

use std::fmt;

/// Environment variable carrying the just-in-time runner configuration.
pub const JITCONFIG_ENV: &str = "ACTIONS_RUNNER_INPUT_JITCONFIG";

/// Placeholder replaced with the value of [`JITCONFIG_ENV`].
pub const JITCONFIG_PLACEHOLDER: &str = "${ACTIONS_RUNNER_INPUT_JITCONFIG}";

const REDACTED: &str = "***";

/// Values shorter than this are not masked in captured output; they would
/// blank out unrelated text.
const MIN_REDACTED_LEN: usize = 4;

/// Commands that turn a freshly booted runner image into a live runner.
const RUNNER_BOOTSTRAP: &[&str] = &[
    "tar -zxf /opt/runner-cache/actions-runner-linux-*.tar.gz",
    r"rm -rf \$HOME",
    "sudo chown -R 1000:1000 /etc/skel/",
    "mv /etc/skel/.cargo /home/ubuntu/",
    "mv /etc/skel/.nvm /home/ubuntu/",
    "mv /etc/skel/.rustup /home/ubuntu/",
    "mv /etc/skel/.dotnet /home/ubuntu/",
    "mv /etc/skel/.composer /home/ubuntu/",
    "sudo setfacl -m u:ubuntu:rw /var/run/docker.sock",
    "sudo sysctl fs.inotify.max_user_instances=1280",
    "sudo sysctl fs.inotify.max_user_watches=655360",
    "export PATH=$PATH:/home/ubuntu/.local/bin && export HOME=/home/ubuntu && export NVM_DIR=/home/ubuntu/.nvm && bash -x /home/ubuntu/run.sh --jitconfig \"${ACTIONS_RUNNER_INPUT_JITCONFIG}\"",
];

// ── CommandSpec ──────────────────────────────────────────────────────────────

/// An ordered, immutable list of shell command templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    commands: Vec<String>,
}

impl CommandSpec {
    #[must_use]
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// The default pipeline: unpack the cached runner, move the toolchains
    /// into the login account, tune the host, then start the runner with the
    /// job token.
    #[must_use]
    pub fn runner_bootstrap() -> Self {
        Self::new(RUNNER_BOOTSTRAP.iter().copied())
    }

    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ── Substitutions ────────────────────────────────────────────────────────────

/// Placeholder → value pairs applied to every command before it is issued.
///
/// Replacement is literal: values are inserted verbatim with no shell
/// escaping, so the command text is exactly what the template spells out.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair. Empty placeholders are ignored.
    #[must_use]
    pub fn with(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        if !placeholder.is_empty() {
            self.pairs.push((placeholder, value.into()));
        }
        self
    }

    /// The job-token substitution used by the default pipeline.
    #[must_use]
    pub fn jitconfig(token: impl Into<String>) -> Self {
        Self::new().with(JITCONFIG_PLACEHOLDER, token)
    }

    /// Replaces every placeholder occurrence in `template` in one left to
    /// right pass. Inserted values are never scanned again; when two
    /// placeholders start at the same offset the one added first wins.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        let mut expanded = String::with_capacity(template.len());
        let mut rest = template;
        while let Some((at, placeholder, value)) = self.next_placeholder(rest) {
            expanded.push_str(&rest[..at]);
            expanded.push_str(value);
            rest = &rest[at + placeholder.len()..];
        }
        expanded.push_str(rest);
        expanded
    }

    fn next_placeholder(&self, text: &str) -> Option<(usize, &str, &str)> {
        self.pairs
            .iter()
            .filter_map(|(placeholder, value)| {
                text.find(placeholder.as_str())
                    .map(|at| (at, placeholder.as_str(), value.as_str()))
            })
            .min_by_key(|(at, _, _)| *at)
    }

    /// Masks substituted values in `text`, longest first. Values shorter
    /// than a few bytes are left alone.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let mut values: Vec<&str> = self
            .pairs
            .iter()
            .map(|(_, value)| value.as_str())
            .filter(|value| value.len() >= MIN_REDACTED_LEN)
            .collect();
        values.sort_by_key(|value| std::cmp::Reverse(value.len()));
        values
            .into_iter()
            .fold(text.to_string(), |acc, value| acc.replace(value, REDACTED))
    }
}

impl fmt::Debug for Substitutions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.pairs.iter().map(|(k, _)| (k, REDACTED)))
            .finish()
    }
}

// ── ExecutionRecord ──────────────────────────────────────────────────────────

/// The outcome of one issued command.
#[derive(Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub index: usize,
    /// The template, safe to log.
    pub command: String,
    /// The text actually sent, after substitution.
    pub issued: String,
    /// Combined stdout and stderr as received.
    pub output: Vec<u8>,
    /// Remote exit status, `None` when the command never reported one.
    pub exit_status: Option<u32>,
}

impl ExecutionRecord {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }

    #[must_use]
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl fmt::Debug for ExecutionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRecord")
            .field("index", &self.index)
            .field("command", &self.command)
            .field("output_bytes", &self.output.len())
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

/// The last `max_lines` lines of `text`.
#[must_use]
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
