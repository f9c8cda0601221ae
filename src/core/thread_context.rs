//! Per-thread prefix state
//!
//! This module provides:
//! - indentation depth, rendered as tabs in front of every line
//! - the thread name written in front of every line
//! - `IndentGuard`: RAII guard for a scoped indentation level
//! - `ThreadLocalText`: a named per-thread string usable as a modifier
//!
//! All of it is confined to the calling thread, so no locking is involved.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

thread_local! {
    static INDENTATION: Cell<usize> = const { Cell::new(0) };
    static THREAD_NAME: RefCell<String> = const { RefCell::new(String::new()) };
    static THREAD_TAG_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static LOCAL_TEXTS: RefCell<HashMap<u64, LocalText>> = RefCell::new(HashMap::new());
}

static NEXT_TEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Increase the indentation of lines written from this thread by one tab.
pub fn indent() {
    INDENTATION.with(|depth| depth.set(depth.get() + 1));
}

/// Decrease the indentation by one tab; no-op at depth zero.
pub fn unindent() {
    INDENTATION.with(|depth| depth.set(depth.get().saturating_sub(1)));
}

pub fn indentation() -> usize {
    INDENTATION.with(Cell::get)
}

/// Append the current indentation to `out`.
pub fn write_indentation(out: &mut String) {
    let depth = indentation();
    out.extend(std::iter::repeat('\t').take(depth));
}

/// Set the name written in front of lines from this thread.
pub fn set_thread_name(name: impl Into<String>) {
    let name = name.into();
    THREAD_NAME.with(|cell| *cell.borrow_mut() = name);
}

pub fn clear_thread_name() {
    THREAD_NAME.with(|cell| cell.borrow_mut().clear());
}

pub fn thread_name() -> String {
    THREAD_NAME.with(|cell| cell.borrow().clone())
}

/// Append the thread name to `out`.
pub fn write_thread_name(out: &mut String) {
    THREAD_NAME.with(|cell| out.push_str(&cell.borrow()));
}

/// Numeric identifier of the calling thread, as used in per-thread file names.
pub fn thread_tag() -> String {
    THREAD_TAG_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| {
                // ThreadId only exposes its number through Debug: "ThreadId(7)"
                let id = format!("{:?}", std::thread::current().id());
                id.chars().filter(char::is_ascii_digit).collect()
            })
            .clone()
    })
}

/// RAII guard that indents for as long as it is alive.
///
/// ```
/// use rust_log_pipeline::core::thread_context::{indentation, IndentGuard};
///
/// {
///     let _guard = IndentGuard::new();
///     assert_eq!(indentation(), 1);
/// }
/// assert_eq!(indentation(), 0);
/// ```
#[must_use = "the indentation is removed when the guard is dropped"]
pub struct IndentGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl IndentGuard {
    pub fn new() -> Self {
        indent();
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Default for IndentGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IndentGuard {
    fn drop(&mut self) {
        unindent();
    }
}

#[derive(Debug)]
struct TextKey(u64);

/// A thread's value for one `ThreadLocalText`.
struct LocalText {
    owner: Weak<TextKey>,
    value: String,
}

/// A string with a separate value on every thread.
///
/// Handles are cheap to clone; all clones refer to the same per-thread slot.
/// Register one with [`Modifier::thread_local_text`](crate::Modifier::thread_local_text)
/// to write its current value in front of each line.
///
/// A thread's value lives until the thread exits or calls [`clear`](Self::clear).
/// Values of handles dropped everywhere are purged the next time that thread
/// sets any value.
#[derive(Debug, Clone)]
pub struct ThreadLocalText {
    key: Arc<TextKey>,
}

impl ThreadLocalText {
    pub fn new() -> Self {
        Self {
            key: Arc::new(TextKey(NEXT_TEXT_ID.fetch_add(1, Ordering::Relaxed))),
        }
    }

    fn id(&self) -> u64 {
        self.key.0
    }

    /// Set the value seen by the calling thread.
    pub fn set(&self, text: impl Into<String>) {
        let text = LocalText {
            owner: Arc::downgrade(&self.key),
            value: text.into(),
        };
        LOCAL_TEXTS.with(|texts| {
            let mut texts = texts.borrow_mut();
            texts.retain(|_, slot| slot.owner.strong_count() > 0);
            texts.insert(self.id(), text);
        });
    }

    pub fn clear(&self) {
        LOCAL_TEXTS.with(|texts| {
            texts.borrow_mut().remove(&self.id());
        });
    }

    /// Value for the calling thread; empty if never set.
    pub fn get(&self) -> String {
        LOCAL_TEXTS.with(|texts| {
            texts
                .borrow()
                .get(&self.id())
                .map(|slot| slot.value.clone())
                .unwrap_or_default()
        })
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        LOCAL_TEXTS.with(|texts| {
            if let Some(slot) = texts.borrow().get(&self.id()) {
                out.push_str(&slot.value);
            }
        });
    }
}

impl PartialEq for ThreadLocalText {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.key, &other.key)
    }
}

impl Eq for ThreadLocalText {}

#[cfg(test)]
fn local_text_count() -> usize {
    LOCAL_TEXTS.with(|texts| texts.borrow().len())
}

impl Default for ThreadLocalText {
    fn default() -> Self {
        Self::new()
    }
}
