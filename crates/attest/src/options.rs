//! Command-line option model: the flag table, parsing, TTY-sensitive
//! defaults, and glob filter patterns.
//!
//! Every boolean flag can be inverted with `--no-<name>`. Flags explicitly
//! passed on the command line (or via [`crate::Engine::default_args`]) win
//! over the terminal-derived defaults; anything left untouched resolves
//! against the TTY state and the `NO_COLOR` environment variable.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use glob::Pattern;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// A fatal configuration error. Nothing runs when one of these surfaces;
/// the process exits nonzero with the diagnostic on stderr.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown option `{0}`")]
    UnknownFlag(String),
    #[error("option --{0} requires a value")]
    MissingValue(&'static str),
    #[error("option --{0} does not take a value")]
    UnexpectedValue(String),
    #[error("invalid filter pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("cannot open log file `{}`: {source}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot launch debugger: {0}")]
    Debugger(#[source] io::Error),
}

// ============================================================================
// Flag table
// ============================================================================

struct FlagSpec {
    long: &'static str,
    short: Option<char>,
    takes_value: bool,
    help: &'static str,
}

const FLAGS: &[FlagSpec] = &[
    FlagSpec { long: "version", short: Some('v'), takes_value: false, help: "Print the version and exit." },
    FlagSpec { long: "help", short: Some('h'), takes_value: false, help: "Print this help text and exit." },
    FlagSpec { long: "list", short: Some('l'), takes_value: false, help: "List enabled suites and cases without running them." },
    FlagSpec { long: "color", short: Some('c'), takes_value: false, help: "Colorize output. Default: on when stdout is a terminal and NO_COLOR is unset." },
    FlagSpec { long: "quiet", short: Some('q'), takes_value: false, help: "Suppress all output except failures and the final total." },
    FlagSpec { long: "maybes", short: Some('m'), takes_value: false, help: "Print a progress notice before each case runs. Default: on when stdout is a terminal." },
    FlagSpec { long: "cr", short: None, takes_value: false, help: "End the progress notice with a carriage return so the result line overwrites it. Default: on when stdout is a terminal." },
    FlagSpec { long: "timer", short: Some('t'), takes_value: false, help: "Print elapsed time per case, suite, and total. Default: on." },
    FlagSpec { long: "log", short: None, takes_value: true, help: "Write output to FILE instead of stdout. \"-\" means stdout." },
    FlagSpec { long: "rerun-failed", short: None, takes_value: false, help: "Re-execute a failing case once more, for debugger breakpoints." },
    FlagSpec { long: "gdb", short: Some('g'), takes_value: false, help: "Relaunch under gdb with --rerun-failed injected." },
];

fn lookup_long(name: &str) -> Option<&'static FlagSpec> {
    FLAGS.iter().find(|f| f.long == name)
}

fn lookup_short(short: char) -> Option<&'static FlagSpec> {
    FLAGS.iter().find(|f| f.short == Some(short))
}

/// Render the `--help` text.
pub fn usage(prog: &str) -> String {
    let mut out = format!(
        "Usage: {prog} [options] [patterns...]\n\n\
         Runs the registered test suites. Positional arguments are glob\n\
         patterns matched against each suite's dotted full name; when any\n\
         are given, only matching suites (and their descendants) run.\n\n\
         Options (boolean flags invert with --no-<name>):\n"
    );
    for flag in FLAGS {
        let short = flag
            .short
            .map(|c| format!("-{c}, "))
            .unwrap_or_else(|| "    ".to_string());
        let long = if flag.takes_value {
            format!("--{} <FILE>", flag.long)
        } else {
            format!("--{}", flag.long)
        };
        out.push_str(&format!("  {short}{long:<18} {}\n", flag.help));
    }
    out
}

// ============================================================================
// Filter patterns
// ============================================================================

/// The compiled set of glob patterns from the command line's positional
/// arguments. An empty set enables everything.
#[derive(Default)]
pub struct FilterSet {
    patterns: Vec<Pattern>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a suite with the given dotted full name is enabled.
    /// A suite is enabled if no patterns were given, if its parent is
    /// enabled, or if its own full name matches at least one pattern.
    pub fn enabled(&self, full_name: &str, parent_enabled: bool) -> bool {
        self.patterns.is_empty()
            || parent_enabled
            || self.patterns.iter().any(|p| p.matches(full_name))
    }
}

// ============================================================================
// Options
// ============================================================================

/// Where reporter output goes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

/// The resolved option set for one run.
pub struct Options {
    pub version: bool,
    pub help: bool,
    pub list: bool,
    pub color: bool,
    pub quiet: bool,
    pub maybes: bool,
    pub cr: bool,
    pub timer: bool,
    pub log: LogTarget,
    pub rerun_failed: bool,
    pub gdb: bool,
    pub filters: FilterSet,
}

// Parsed state before defaults resolve. `None` means the user never touched
// the flag and the TTY-derived default applies.
#[derive(Default)]
struct RawOptions {
    version: Option<bool>,
    help: Option<bool>,
    list: Option<bool>,
    color: Option<bool>,
    quiet: Option<bool>,
    maybes: Option<bool>,
    cr: Option<bool>,
    timer: Option<bool>,
    log: Option<String>,
    rerun_failed: Option<bool>,
    gdb: Option<bool>,
    patterns: Vec<Pattern>,
}

impl RawOptions {
    fn set_bool(&mut self, long: &'static str, value: bool) {
        match long {
            "version" => self.version = Some(value),
            "help" => self.help = Some(value),
            "list" => self.list = Some(value),
            "color" => self.color = Some(value),
            "quiet" => self.quiet = Some(value),
            "maybes" => self.maybes = Some(value),
            "cr" => self.cr = Some(value),
            "timer" => self.timer = Some(value),
            "rerun-failed" => self.rerun_failed = Some(value),
            "gdb" => self.gdb = Some(value),
            other => unreachable!("flag table out of sync: {other}"),
        }
    }

    fn set_value(&mut self, long: &'static str, value: String) {
        match long {
            "log" => self.log = Some(value),
            other => unreachable!("flag table out of sync: {other}"),
        }
    }

    fn resolve(self, tty: bool, no_color: bool) -> Options {
        // The terminal-derived defaults follow the actual output target: a
        // --log file is never a terminal, whatever stdout is.
        let log_to_file = !matches!(self.log.as_deref(), None | Some("-"));
        let out_tty = tty && !log_to_file;
        Options {
            version: self.version.unwrap_or(false),
            help: self.help.unwrap_or(false),
            list: self.list.unwrap_or(false),
            color: self.color.unwrap_or(out_tty && !no_color),
            quiet: self.quiet.unwrap_or(false),
            maybes: self.maybes.unwrap_or(out_tty),
            cr: self.cr.unwrap_or(out_tty),
            timer: self.timer.unwrap_or(true),
            log: match self.log.as_deref() {
                None | Some("-") => LogTarget::Stdout,
                Some(path) => LogTarget::File(PathBuf::from(path)),
            },
            rerun_failed: self.rerun_failed.unwrap_or(false),
            gdb: self.gdb.unwrap_or(false),
            filters: FilterSet {
                patterns: self.patterns,
            },
        }
    }
}

impl Options {
    /// Parse options from an argument list (without the program name),
    /// resolving TTY-sensitive defaults against the real terminal and the
    /// `NO_COLOR` environment variable.
    pub fn parse<I>(args: I) -> Result<Options, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let tty = io::stdout().is_terminal();
        let no_color = std::env::var_os("NO_COLOR").is_some();
        Options::parse_from(args, tty, no_color)
    }

    /// Parse with an explicit terminal state. Later arguments override
    /// earlier ones, which is how compiled-in default arguments stay
    /// overridable from the real command line.
    pub fn parse_from<I>(args: I, tty: bool, no_color: bool) -> Result<Options, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut raw = RawOptions::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if let Some(rest) = arg.strip_prefix("--") {
                let (name, inline) = match rest.split_once('=') {
                    Some((n, v)) => (n, Some(v.to_string())),
                    None => (rest, None),
                };
                let (invert, key) = match name.strip_prefix("no-") {
                    Some(stripped) if lookup_long(stripped).is_some() => (true, stripped),
                    _ => (false, name),
                };
                let Some(spec) = lookup_long(key) else {
                    return Err(ConfigError::UnknownFlag(arg));
                };
                if spec.takes_value {
                    if invert {
                        return Err(ConfigError::UnknownFlag(arg));
                    }
                    let value = match inline {
                        Some(v) => v,
                        None => args.next().ok_or(ConfigError::MissingValue(spec.long))?,
                    };
                    raw.set_value(spec.long, value);
                } else {
                    if inline.is_some() {
                        return Err(ConfigError::UnexpectedValue(key.to_string()));
                    }
                    raw.set_bool(spec.long, !invert);
                }
            } else if let Some(rest) = arg.strip_prefix('-') {
                let mut chars = rest.chars();
                let (Some(short), None) = (chars.next(), chars.next()) else {
                    return Err(ConfigError::UnknownFlag(arg));
                };
                let Some(spec) = lookup_short(short) else {
                    return Err(ConfigError::UnknownFlag(arg));
                };
                if spec.takes_value {
                    let value = args.next().ok_or(ConfigError::MissingValue(spec.long))?;
                    raw.set_value(spec.long, value);
                } else {
                    raw.set_bool(spec.long, true);
                }
            } else {
                let pattern = Pattern::new(&arg).map_err(|source| ConfigError::BadPattern {
                    pattern: arg.clone(),
                    source,
                })?;
                raw.patterns.push(pattern);
            }
        }

        Ok(raw.resolve(tty, no_color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, ConfigError> {
        Options::parse_from(args.iter().map(|s| s.to_string()), false, false)
    }

    fn parse_tty(args: &[&str], no_color: bool) -> Options {
        Options::parse_from(args.iter().map(|s| s.to_string()), true, no_color).unwrap()
    }

    #[test]
    fn defaults_without_terminal() {
        let opts = parse(&[]).unwrap();
        assert!(!opts.color);
        assert!(!opts.maybes);
        assert!(!opts.cr);
        assert!(opts.timer);
        assert!(!opts.quiet);
        assert_eq!(opts.log, LogTarget::Stdout);
    }

    #[test]
    fn defaults_with_terminal() {
        let opts = parse_tty(&[], false);
        assert!(opts.color);
        assert!(opts.maybes);
        assert!(opts.cr);
    }

    #[test]
    fn no_color_env_disables_color_default_only() {
        assert!(!parse_tty(&[], true).color);
        assert!(parse_tty(&["--color"], true).color);
    }

    #[test]
    fn log_file_target_disables_terminal_defaults() {
        let opts = parse_tty(&["--log", "out.txt"], false);
        assert!(!opts.color);
        assert!(!opts.maybes);
        assert!(!opts.cr);
        assert!(parse_tty(&["--log", "out.txt", "--color"], false).color);
        assert!(parse_tty(&["--log", "-"], false).color);
    }

    #[test]
    fn boolean_flags_invert() {
        let opts = parse_tty(&["--no-maybes", "--no-timer"], false);
        assert!(!opts.maybes);
        assert!(!opts.timer);
    }

    #[test]
    fn later_arguments_win() {
        let opts = parse(&["--quiet", "--no-quiet"]).unwrap();
        assert!(!opts.quiet);
    }

    #[test]
    fn short_flags() {
        let opts = parse(&["-q", "-l", "-c"]).unwrap();
        assert!(opts.quiet);
        assert!(opts.list);
        assert!(opts.color);
    }

    #[test]
    fn log_value_forms() {
        assert_eq!(parse(&["--log", "-"]).unwrap().log, LogTarget::Stdout);
        assert_eq!(
            parse(&["--log", "out.txt"]).unwrap().log,
            LogTarget::File(PathBuf::from("out.txt"))
        );
        assert_eq!(
            parse(&["--log=out.txt"]).unwrap().log,
            LogTarget::File(PathBuf::from("out.txt"))
        );
    }

    #[test]
    fn missing_log_value_is_fatal() {
        assert!(matches!(
            parse(&["--log"]),
            Err(ConfigError::MissingValue("log"))
        ));
    }

    #[test]
    fn unknown_flags_are_fatal() {
        assert!(matches!(
            parse(&["--frobnicate"]),
            Err(ConfigError::UnknownFlag(_))
        ));
        assert!(matches!(parse(&["-Z"]), Err(ConfigError::UnknownFlag(_))));
        assert!(matches!(parse(&["-qz"]), Err(ConfigError::UnknownFlag(_))));
    }

    #[test]
    fn positionals_become_patterns() {
        let opts = parse(&["net.*", "fs"]).unwrap();
        assert!(opts.filters.enabled("net.tcp", false));
        assert!(opts.filters.enabled("fs", false));
        assert!(!opts.filters.enabled("proc", false));
    }

    #[test]
    fn malformed_pattern_is_fatal() {
        assert!(matches!(
            parse(&["a["]),
            Err(ConfigError::BadPattern { .. })
        ));
    }

    #[test]
    fn empty_filter_enables_everything() {
        let opts = parse(&[]).unwrap();
        assert!(opts.filters.enabled("anything.at.all", false));
    }

    #[test]
    fn parent_enablement_is_inherited() {
        let opts = parse(&["a"]).unwrap();
        assert!(opts.filters.enabled("a", false));
        assert!(opts.filters.enabled("a.child", true));
        assert!(!opts.filters.enabled("b", false));
    }

    #[test]
    fn usage_mentions_every_flag() {
        let text = usage("attest");
        for flag in super::FLAGS {
            assert!(text.contains(&format!("--{}", flag.long)), "{}", flag.long);
        }
    }
}
