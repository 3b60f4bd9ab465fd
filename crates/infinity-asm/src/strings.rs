// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! [`StringTable`] and [`StringHandle`]: deduplicating, suffix-merging
//! string interning with a single layout phase.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io::{self, Write};
use std::rc::Rc;

use crate::label::{label_diff, Label, LabelAllocator};
use crate::writer::Writer;

struct Inner {
    text: RefCell<String>,
    offset: RefCell<Option<String>>,
    laid_out: Rc<Cell<bool>>,
}

/// A handle to a string registered with a [`StringTable`].
///
/// Before the table is laid out, the handle is open: its text can still be
/// appended to (used to accumulate encoded type signatures across an AST
/// traversal), and [`offset`](StringHandle::offset) cannot be called. After
/// layout, the handle is frozen: its text is fixed and its offset
/// expression is available.
#[derive(Clone)]
pub struct StringHandle(Rc<Inner>);

impl StringHandle {
    /// Appends `more` to this string's text.
    ///
    /// # Panics
    ///
    /// Panics if the owning table has already been laid out: all appends
    /// must happen before layout, never after.
    pub fn append(&self, more: &str) {
        assert!(
            !self.0.laid_out.get(),
            "cannot append to a string after its table has been laid out"
        );
        self.0.text.borrow_mut().push_str(more);
    }

    /// This string's current text.
    pub fn text(&self) -> String {
        self.0.text.borrow().clone()
    }

    /// The byte-offset expression for this string's text, measured from the
    /// owning table's start label.
    ///
    /// # Panics
    ///
    /// Panics if the owning table has not been laid out yet.
    pub fn offset(&self) -> String {
        self.0
            .offset
            .borrow()
            .clone()
            .expect("string handle has no offset until its table is laid out")
    }
}

/// Accumulates requested strings, deduplicates them with suffix merging, and
/// assigns each one a byte offset within a single layout phase.
///
/// Distinct strings are laid out longest-first (ties broken
/// lexicographically, for determinism); a string that is a suffix of an
/// already-placed string shares that string's bytes (and its terminator)
/// rather than being emitted again.
pub struct StringTable {
    laid_out: Rc<Cell<bool>>,
    handles: Vec<StringHandle>,
    entries: Vec<(Label, String)>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    /// Creates an empty, open string table.
    pub fn new() -> Self {
        StringTable {
            laid_out: Rc::new(Cell::new(false)),
            handles: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Whether [`layout`](StringTable::layout) has run yet.
    pub fn is_laid_out(&self) -> bool {
        self.laid_out.get()
    }

    /// Registers a new string handle with the given initial text.
    ///
    /// This always registers a fresh handle, even for text identical to one
    /// already registered — deduplication happens at layout time, not here.
    ///
    /// # Panics
    ///
    /// Panics if the table has already been laid out.
    pub fn new_string(&mut self, text: impl Into<String>) -> StringHandle {
        assert!(
            !self.laid_out.get(),
            "cannot register a new string after the table has been laid out"
        );
        let handle = StringHandle(Rc::new(Inner {
            text: RefCell::new(text.into()),
            offset: RefCell::new(None),
            laid_out: self.laid_out.clone(),
        }));
        self.handles.push(handle.clone());
        handle
    }

    /// Freezes the table, assigning every registered handle an offset.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn layout(&mut self, alloc: &mut LabelAllocator) {
        assert!(!self.laid_out.get(), "string table already laid out");
        self.laid_out.set(true);

        let mut distinct: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for handle in &self.handles {
            let text = handle.text();
            if seen.insert(text.clone()) {
                distinct.push(text);
            }
        }
        // Decreasing length, lexicographic tie-break — both are load-bearing
        // for determinism: a longer string must be placed before any of its
        // suffixes are considered for sharing against it.
        distinct.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut offsets: std::collections::HashMap<String, String> =
            std::collections::HashMap::new();
        for text in &distinct {
            let mut shared = None;
            for (_, entry_text) in &self.entries {
                if entry_text.ends_with(text.as_str()) {
                    let delta = entry_text.len() - text.len();
                    let base = &offsets[entry_text];
                    shared = Some(if delta == 0 {
                        base.clone()
                    } else {
                        format!("{base}+{delta}")
                    });
                    break;
                }
            }
            let offset = match shared {
                Some(offset) => offset,
                None => {
                    let label = alloc.alloc();
                    self.entries.push((label, text.clone()));
                    let start_label = self.entries[0].0.clone();
                    label_diff(&self.entries.last().unwrap().0, &start_label)
                }
            };
            offsets.insert(text.clone(), offset);
        }

        for handle in &self.handles {
            let text = handle.text();
            *handle.0.offset.borrow_mut() = Some(offsets[&text].clone());
        }
    }

    /// The label of the table's first entry, from which every offset in the
    /// table is measured.
    ///
    /// # Panics
    ///
    /// Panics if the table has not been laid out, or was laid out with no
    /// strings registered.
    pub fn start_label(&self) -> &Label {
        &self
            .entries
            .first()
            .expect("string table has no entries to start from")
            .0
    }

    /// Emits every entry: its label followed by a `.string` directive
    /// embedding its text verbatim.
    pub fn emit<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for (label, text) in &self.entries {
            writer.emit_label(label)?;
            writer.emit_string(text)?;
        }
        Ok(())
    }
}
