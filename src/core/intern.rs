//! Name interning
//!
//! Maps type names to compact `Quark` handles. Interned strings live for
//! the rest of the process, so a quark can hand out `&'static str`.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Global name interner shared by every registry
static INTERNER: Lazy<QuarkInterner> = Lazy::new(QuarkInterner::new);

/// Interned string handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quark(u32);

impl Quark {
    /// Intern `name`, returning the existing quark if already present
    pub fn from_str(name: &str) -> Quark {
        INTERNER.intern(name)
    }

    /// Look up `name` without interning it
    pub fn try_from_str(name: &str) -> Option<Quark> {
        INTERNER.get(name)
    }

    pub fn as_str(self) -> &'static str {
        INTERNER.resolve(self).unwrap_or("")
    }
}

impl fmt::Display for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe string interning table
pub struct QuarkInterner {
    /// name → quark
    str_to_id: DashMap<&'static str, Quark>,
    /// quark → name
    id_to_str: DashMap<Quark, &'static str>,
    next_id: AtomicU32,
}

impl QuarkInterner {
    fn new() -> Self {
        Self {
            str_to_id: DashMap::with_capacity(256),
            id_to_str: DashMap::with_capacity(256),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn intern(&self, name: &str) -> Quark {
        // Fast path: already interned
        if let Some(id) = self.str_to_id.get(name) {
            return *id;
        }

        // Slow path: the entry API settles races between threads interning
        // the same name; only the winner allocates an id.
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        *self.str_to_id.entry(leaked).or_insert_with(|| {
            let id = Quark(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.id_to_str.insert(id, leaked);
            id
        })
    }

    pub fn get(&self, name: &str) -> Option<Quark> {
        self.str_to_id.get(name).map(|id| *id)
    }

    pub fn resolve(&self, quark: Quark) -> Option<&'static str> {
        self.id_to_str.get(&quark).map(|s| *s)
    }

    pub fn len(&self) -> usize {
        self.str_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.str_to_id.is_empty()
    }
}
