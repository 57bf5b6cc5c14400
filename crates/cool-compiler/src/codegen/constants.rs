//! Deduplicated constant pools for the generated image.
//!
//! Identical literals are emitted once and referenced by a stable small id.
//! Pool order is part of the runtime image: `bool_const0`/`bool_const1` are
//! the two boolean objects, and the default int `0` and empty string are
//! reserved at id 0 of their pools before any class layout runs. Every
//! string constant records the pooled id of its length integer, which the
//! string object layout points at.

use rustc_hash::FxHashMap;

/// One pooled string: its bytes plus the id of its pooled length.
#[derive(Debug, Clone)]
pub struct StringConst {
    pub value: String,
    pub len_id: u32,
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    ints: Vec<i64>,
    int_ids: FxHashMap<i64, u32>,
    strings: Vec<StringConst>,
    string_ids: FxHashMap<String, u32>,
}

impl ConstantPool {
    /// An empty pool with the runtime-reserved defaults at id 0:
    /// `int_const0` = 0 and `str_const0` = "".
    pub fn new() -> Self {
        let mut pool = Self::default();
        pool.int_id(0);
        pool.string_id("");
        pool
    }

    /// Intern an integer, returning its pool id.
    pub fn int_id(&mut self, value: i64) -> u32 {
        if let Some(&id) = self.int_ids.get(&value) {
            return id;
        }
        let id = self.ints.len() as u32;
        self.ints.push(value);
        self.int_ids.insert(value, id);
        id
    }

    /// Intern a string, returning its pool id. The string's length is
    /// interned first so the object layout can reference it.
    pub fn string_id(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(value) {
            return id;
        }
        let len_id = self.int_id(value.len() as i64);
        let id = self.strings.len() as u32;
        self.strings.push(StringConst {
            value: value.to_string(),
            len_id,
        });
        self.string_ids.insert(value.to_string(), id);
        id
    }

    /// The two boolean objects have fixed ids: false = 0, true = 1.
    pub fn bool_id(value: bool) -> u32 {
        value as u32
    }

    pub fn ints(&self) -> &[i64] {
        &self.ints
    }

    pub fn strings(&self) -> &[StringConst] {
        &self.strings
    }
}
