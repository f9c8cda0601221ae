//! Property-based tests for rust_log_pipeline using proptest

use parking_lot::Mutex;
use proptest::prelude::*;
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::{LineTarget, TextCodec, Utf16Codec, Utf8Codec};
use std::sync::Arc;

fn any_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Error),
        Just(Severity::Warn),
        Just(Severity::Info),
        Just(Severity::Trace),
        Just(Severity::Dump),
    ]
}

#[derive(Default)]
struct Units(Mutex<Vec<String>>);

impl LineTarget for Units {
    fn write_line(&self, text: &str) -> usize {
        self.0.lock().push(text.to_string());
        text.len()
    }
}

// ============================================================================
// Severity Tests
// ============================================================================

proptest! {
    /// Test that Severity string conversions roundtrip correctly
    #[test]
    fn test_severity_str_roundtrip(level in any_severity()) {
        let parsed: Severity = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
        let lower: Severity = level.to_str().to_lowercase().parse().unwrap();
        prop_assert_eq!(level, lower);
    }

    /// Enabling is monotone: a level passing a filter lets every more severe
    /// level through as well
    #[test]
    fn test_enabled_is_downward_closed(
        filter in any_severity(),
        a in any_severity(),
        b in any_severity(),
    ) {
        let scope = Scope::root();
        scope.set_level(filter);
        if a <= b && scope.is_enabled(b) {
            prop_assert!(scope.is_enabled(a));
        }
        prop_assert_eq!(scope.is_enabled(a), a <= filter);
    }
}

// ============================================================================
// Scope Tests
// ============================================================================

proptest! {
    /// A chain of scopes where some nodes set a level right after creation:
    /// every node's effective level is that of its nearest ancestor-or-self
    /// with a level at the time it was created, else Info
    #[test]
    fn test_scope_chain_inherits_nearest_level(
        levels in prop::collection::vec(prop::option::of(any_severity()), 1..12)
    ) {
        let mut chain: Vec<Scope> = Vec::new();
        let mut nearest: Option<Severity> = None;
        for level in &levels {
            let scope = Scope::create(chain.last());
            if let Some(level) = level {
                scope.set_level(*level);
                nearest = Some(*level);
            }
            prop_assert_eq!(scope.effective_level(), nearest.unwrap_or(Severity::Info));
            chain.push(scope);
        }
    }

    /// Changing a node later never affects nodes created before the change
    #[test]
    fn test_scope_snapshot_is_stable(first in any_severity(), second in any_severity()) {
        let root = Scope::root();
        root.set_level(first);
        let early = Scope::create(Some(&root));
        root.set_level(second);
        let late = Scope::create(Some(&root));

        prop_assert_eq!(early.effective_level(), first);
        prop_assert_eq!(late.effective_level(), second);
        prop_assert_eq!(root.effective_level(), second);
    }
}

// ============================================================================
// LogStream Tests
// ============================================================================

proptest! {
    /// Overflow splits text into units of exactly `capacity` characters and
    /// loses nothing
    #[test]
    fn test_stream_units_reassemble(text in "\\PC{0,300}", capacity in 2usize..64) {
        let target = Arc::new(Units::default());
        let mut stream = LogStream::with_capacity(target.clone(), capacity);
        stream.write_text(&text);
        stream.sync();

        let units = target.0.lock().clone();
        prop_assert_eq!(units.concat(), text);
        if let Some((last, full)) = units.split_last() {
            for unit in full {
                prop_assert_eq!(unit.chars().count(), capacity);
            }
            prop_assert!(last.chars().count() <= capacity);
            prop_assert!(!last.is_empty());
        }
    }

    /// Splitting the same text over many writes yields the same units
    #[test]
    fn test_stream_independent_of_write_boundaries(
        parts in prop::collection::vec("[a-zé☃]{0,20}", 0..20),
        capacity in 2usize..32,
    ) {
        let joined: String = parts.concat();

        let piecewise = Arc::new(Units::default());
        let mut stream = LogStream::with_capacity(piecewise.clone(), capacity);
        for part in &parts {
            stream.write_text(part);
        }
        stream.sync();

        let whole = Arc::new(Units::default());
        let mut stream = LogStream::with_capacity(whole.clone(), capacity);
        stream.write_text(&joined);
        stream.sync();

        prop_assert_eq!(piecewise.0.lock().clone(), whole.0.lock().clone());
    }
}

// ============================================================================
// Codec Tests
// ============================================================================

proptest! {
    #[test]
    fn test_codecs_are_total(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        // Never panics, whatever the input
        let _ = Utf8Codec.decode(&bytes);
        let _ = Utf16Codec::little_endian().decode(&bytes);
        let _ = Utf16Codec::big_endian().decode(&bytes);
    }

    #[test]
    fn test_utf16_encoded_len_matches(text in "\\PC{0,100}") {
        let codec = Utf16Codec::big_endian();
        prop_assert_eq!(codec.encode(&text).len(), codec.encoded_len(&text));
        prop_assert_eq!(codec.decode(&codec.encode(&text)), text);
    }
}
