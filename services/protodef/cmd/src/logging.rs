use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// ANSI color codes for console output
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths
const COMPONENT_WIDTH: usize = 18;
const LOG_LEVEL_WIDTH: usize = 7;

/// `[timestamp] [component] [level] message` formatter
pub struct ProtodefLogFormatter {
    app_name: String,
    color_enabled: bool,
}

/// Log with a `component` tag
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl ProtodefLogFormatter {
    pub fn new(app_name: impl Into<String>, color: bool) -> Self {
        Self {
            app_name: app_name.into(),
            color_enabled: color && is_terminal(),
        }
    }

    /// Component column, padded or truncated to a fixed width
    fn format_component(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(comp) => format!("{}-{}", self.app_name, comp),
            None => self.app_name.clone(),
        };

        if name.chars().count() > COMPONENT_WIDTH {
            let cut: String = name.chars().take(COMPONENT_WIDTH - 1).collect();
            format!("{}…", cut)
        } else {
            format!("{:<width$}", name, width = COMPONENT_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };

        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH + 2)
    }

    fn color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }

    /// Render one line without the trailing newline
    fn render(&self, level: &tracing::Level, visitor: &FieldVisitor, timestamp: &str) -> String {
        let color = self.color_for_level(level);
        let (reset, cyan) = if self.color_enabled {
            (COLOR_RESET, COLOR_CYAN)
        } else {
            ("", "")
        };

        let mut line = format!(
            "{}[{}] [{}] [{}{}{}] {}",
            cyan,
            timestamp,
            self.format_component(visitor.component.as_deref()),
            color,
            self.format_log_level(level),
            reset,
            visitor.message
        );
        for (key, value) in &visitor.fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        line.push_str(reset);
        line
    }
}

impl<S, N> FormatEvent<S, N> for ProtodefLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        writeln!(
            writer,
            "{}",
            self.render(event.metadata().level(), &visitor, &timestamp)
        )
    }
}

/// Collects the message, the component tag, and any extra fields
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        let text = unquote(format!("{:?}", value));
        match field.name() {
            "message" => self.message = text,
            "component" => self.component = Some(text),
            name => self.fields.push((name, text)),
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            name => self.fields.push((name, value.to_string())),
        }
    }
}

fn unquote(text: String) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text[1..text.len() - 1].to_string()
    } else {
        text
    }
}

/// Whether stderr is a color-capable terminal
fn is_terminal() -> bool {
    std::io::stderr().is_terminal() && color_allowed(|key| std::env::var(key).ok())
}

/// `NO_COLOR` unset and `TERM` set to something other than `dumb`
fn color_allowed(lookup: impl Fn(&str) -> Option<String>) -> bool {
    if lookup("NO_COLOR").is_some() {
        return false;
    }
    matches!(lookup("TERM"), Some(term) if term != "dumb")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> ProtodefLogFormatter {
        ProtodefLogFormatter::new("protodef", false)
    }

    #[test]
    fn test_component_column() {
        let formatter = plain();
        assert_eq!(formatter.format_component(None).trim_end(), "protodef");
        assert_eq!(
            formatter.format_component(Some("load")).trim_end(),
            "protodef-load"
        );
        assert_eq!(formatter.format_component(None).len(), COMPONENT_WIDTH);

        let long = formatter.format_component(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), COMPONENT_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_render_without_color() {
        let visitor = FieldVisitor {
            message: "Loaded 3 definitions".to_string(),
            component: Some("load".to_string()),
            fields: vec![("skipped", "1".to_string())],
        };
        let line = plain().render(&tracing::Level::INFO, &visitor, "2024-01-01 00:00:00.000");

        assert!(line.starts_with("[2024-01-01 00:00:00.000] [protodef-load"));
        assert!(line.contains("ℹ INFO"));
        assert!(line.ends_with("Loaded 3 definitions skipped=1"));
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn test_color_allowed() {
        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |key: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            }
        };
        assert!(color_allowed(env(&[("TERM", "xterm-256color")])));
        assert!(!color_allowed(env(&[("TERM", "dumb")])));
        assert!(!color_allowed(env(&[("TERM", "xterm"), ("NO_COLOR", "1")])));
        assert!(!color_allowed(env(&[])));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"S_CHAT\"".to_string()), "S_CHAT");
        assert_eq!(unquote("42".to_string()), "42");
        assert_eq!(unquote("\"".to_string()), "\"");
    }
}
