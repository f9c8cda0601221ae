//! Line-prefix modifiers
//!
//! A modifier appends text in front of every flushed line. Modifiers run in
//! registration order, followed by the indentation and thread-name modifiers,
//! which are always active.
//!
//! Clock modifiers read the wall clock when they run, i.e. when a line is
//! handed to its writer, not when its first character was produced.

use super::thread_context::{self, ThreadLocalText};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Built-in modifier kinds that can be named in configuration.
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::ModifierKind;
/// use chrono::{Local, TimeZone};
///
/// let at = Local.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// let mut out = String::new();
/// ModifierKind::DateTime.write_at(&mut out, &at);
/// assert_eq!(out, "250108-103045 ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Localized short date: `01/08/25 `
    Date,

    /// Time of day with microseconds: `10:30:45.123456 `
    Time,

    /// Compact date and time: `250108-103045 `
    DateTime,

    /// Numeric id of the writing thread followed by a space
    ThreadId,

    /// A constant string
    Fixed(String),
}

impl ModifierKind {
    /// Append this modifier's text for the given instant.
    pub fn write_at(&self, out: &mut String, now: &DateTime<Local>) {
        use std::fmt::Write;
        // Writing into a String cannot fail
        let _ = match self {
            ModifierKind::Date => write!(out, "{} ", now.format("%x")),
            ModifierKind::Time => write!(out, "{} ", now.format("%H:%M:%S%.6f")),
            ModifierKind::DateTime => write!(out, "{} ", now.format("%y%m%d-%H%M%S")),
            ModifierKind::ThreadId => write!(out, "{} ", thread_context::thread_tag()),
            ModifierKind::Fixed(text) => out.write_str(text),
        };
    }
}

/// Closure form of a modifier.
pub type ModifierFn = Arc<dyn Fn(&mut String) + Send + Sync>;

/// One entry of a [`ModifierPipeline`].
#[derive(Clone)]
pub enum Modifier {
    Builtin(ModifierKind),
    ThreadLocal(ThreadLocalText),
    Custom(ModifierFn),
}

impl Modifier {
    pub fn date() -> Self {
        Modifier::Builtin(ModifierKind::Date)
    }

    pub fn time() -> Self {
        Modifier::Builtin(ModifierKind::Time)
    }

    pub fn datetime() -> Self {
        Modifier::Builtin(ModifierKind::DateTime)
    }

    pub fn thread_id() -> Self {
        Modifier::Builtin(ModifierKind::ThreadId)
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Modifier::Builtin(ModifierKind::Fixed(text.into()))
    }

    /// Write the calling thread's value of `text`.
    pub fn thread_local_text(text: ThreadLocalText) -> Self {
        Modifier::ThreadLocal(text)
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&mut String) + Send + Sync + 'static,
    {
        Modifier::Custom(Arc::new(f))
    }

    /// Append this modifier's text to `out`.
    pub fn write(&self, out: &mut String) {
        match self {
            Modifier::Builtin(kind) => kind.write_at(out, &Local::now()),
            Modifier::ThreadLocal(text) => text.write_to(out),
            Modifier::Custom(f) => f(out),
        }
    }
}

impl From<ModifierKind> for Modifier {
    fn from(kind: ModifierKind) -> Self {
        Modifier::Builtin(kind)
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            Modifier::ThreadLocal(text) => f.debug_tuple("ThreadLocal").field(text).finish(),
            Modifier::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Ordered set of modifiers applied to every line.
#[derive(Debug, Clone, Default)]
pub struct ModifierPipeline {
    modifiers: Vec<Modifier>,
}

impl ModifierPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, modifier: impl Into<Modifier>) {
        self.modifiers.push(modifier.into());
    }

    /// Remove all caller-supplied modifiers. Indentation and thread name stay.
    pub fn clear(&mut self) {
        self.modifiers.clear();
    }

    /// Replace the caller-supplied modifiers as a whole.
    pub fn replace<I>(&mut self, modifiers: I)
    where
        I: IntoIterator<Item = Modifier>,
    {
        self.modifiers = modifiers.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Run every modifier in order, then indentation and thread name.
    pub fn apply(&self, out: &mut String) {
        for modifier in &self.modifiers {
            modifier.write(out);
        }
        thread_context::write_indentation(out);
        thread_context::write_thread_name(out);
    }

    /// Prefix for a line written now from the calling thread.
    pub fn prefix(&self) -> String {
        let mut out = String::new();
        self.apply(&mut out);
        out
    }
}

impl FromIterator<Modifier> for ModifierPipeline {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        Self {
            modifiers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thread_context::{indent, set_thread_name, unindent};
    use chrono::TimeZone;

    fn fixed_datetime() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    #[test]
    fn test_builtin_formats() {
        let at = fixed_datetime();
        let mut out = String::new();
        ModifierKind::Date.write_at(&mut out, &at);
        assert_eq!(out, "01/08/25 ");

        out.clear();
        ModifierKind::Time.write_at(&mut out, &at);
        assert_eq!(out, "10:30:45.123456 ");

        out.clear();
        ModifierKind::DateTime.write_at(&mut out, &at);
        assert_eq!(out, "250108-103045 ");

        out.clear();
        ModifierKind::Fixed("app| ".to_string()).write_at(&mut out, &at);
        assert_eq!(out, "app| ");
    }

    #[test]
    fn test_apply_order_with_always_active_modifiers() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.register(Modifier::fixed("A"));
        pipeline.register(Modifier::custom(|out| out.push('B')));

        set_thread_name("[worker] ");
        indent();
        assert_eq!(pipeline.prefix(), "AB\t[worker] ");
        unindent();
        set_thread_name("");
        assert_eq!(pipeline.prefix(), "AB");
    }

    #[test]
    fn test_clear_and_replace() {
        let mut pipeline: ModifierPipeline =
            vec![Modifier::fixed("x"), Modifier::fixed("y")].into_iter().collect();
        assert_eq!(pipeline.len(), 2);
        pipeline.clear();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.prefix(), "");

        pipeline.replace(vec![Modifier::fixed("z")]);
        assert_eq!(pipeline.prefix(), "z");
    }

    #[test]
    fn test_thread_id_modifier() {
        let mut out = String::new();
        Modifier::thread_id().write(&mut out);
        assert!(out.ends_with(' '));
        assert!(out.trim_end().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_thread_local_text_modifier() {
        let text = ThreadLocalText::new();
        let pipeline: ModifierPipeline =
            std::iter::once(Modifier::thread_local_text(text.clone())).collect();
        assert_eq!(pipeline.prefix(), "");
        text.set("<tx> ");
        assert_eq!(pipeline.prefix(), "<tx> ");
    }

    #[test]
    fn test_modifier_kind_serde() {
        let kinds = vec![ModifierKind::Date, ModifierKind::Fixed("> ".to_string())];
        let json = serde_json::to_string(&kinds).unwrap();
        assert_eq!(json, r#"["date",{"fixed":"> "}]"#);
        let back: Vec<ModifierKind> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kinds);
    }
}
