/*
 * src/fieldmap/mod.rs
 *
 * File for the Field-Map Engine
 *
 * Purpose:
 *   A compile-time registry of monomorphic accessor function pointers
 *   standing in for the dotted-attribute-path reflection the wire protocol
 *   was first designed around.
 *   Each map is an ordered list of (key, accessor, qualifier) entries; a
 *   renderer walks the map for a given record and skips entries whose
 *   qualifier returns false for that record (e.g. distance columns on a
 *   non-geospatial query).
 */

pub mod maps;
pub mod records;
pub mod value;

pub use value::Value;

/// `Get` reads one value unconditionally; `Reserved` is a field the map
/// declares but never sources, always projected as the empty string.
pub enum Accessor<R> {
    Get(fn(&R) -> Value),
    Reserved,
}

impl<R> Accessor<R> {
    pub fn read(&self, record: &R) -> Value {
        match self {
            Accessor::Get(f) => f(record),
            Accessor::Reserved => Value::Str(String::new()),
        }
    }
}

pub type Qualifier<R> = Option<fn(&R) -> bool>;

pub struct FieldMapEntry<R> {
    pub key: &'static str,
    pub accessor: Accessor<R>,
    pub qualifier: Qualifier<R>,
}

impl<R> FieldMapEntry<R> {
    /// `None` means the field is not applicable to this record (its
    /// qualifier rejected it) and should be omitted, not rendered as an
    /// empty string.
    pub fn value_for(&self, record: &R) -> Option<Value> {
        match self.qualifier {
            Some(q) if !q(record) => None,
            _ => Some(self.accessor.read(record)),
        }
    }
}

/// An ordered view over a static entry table. `restrict` narrows the view
/// for `data_field_key=` projections without disturbing declaration order.
pub struct FieldMap<R: 'static> {
    entries: Vec<&'static FieldMapEntry<R>>,
}

impl<R> FieldMap<R> {
    pub fn new(entries: &'static [FieldMapEntry<R>]) -> Self {
        FieldMap { entries: entries.iter().collect() }
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.key).collect()
    }

    /// The keys whose entries carry no qualifier — the header set when
    /// there is no record to evaluate conditional columns against.
    pub fn base_keys(&self) -> Vec<&'static str> {
        self.entries.iter().filter(|e| e.qualifier.is_none()).map(|e| e.key).collect()
    }

    pub fn find(&self, key: &str) -> Option<&FieldMapEntry<R>> {
        self.entries.iter().find(|e| e.key == key).copied()
    }

    /// Keeps only the entries named in `keys`, preserving the map's own
    /// order. Unknown names are ignored; an empty `keys` leaves the map
    /// unrestricted.
    pub fn restrict(mut self, keys: &[String]) -> Self {
        if !keys.is_empty() {
            self.entries.retain(|e| keys.iter().any(|k| k == e.key));
        }
        self
    }

    /// Projects one record into an ordered `(key, display string)` list,
    /// skipping fields whose qualifier rejects the record.
    pub fn project(&self, record: &R) -> Vec<(&'static str, String)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.value_for(record).map(|v| (entry.key, v.display())))
            .collect()
    }
}
