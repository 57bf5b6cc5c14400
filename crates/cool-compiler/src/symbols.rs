//! Symbol model: classes, identifiers, methods, and the type lattice.
//!
//! Classes live in a flat arena keyed by [`ClassId`]; parent links are ids,
//! not owning references, so a malformed program can momentarily describe a
//! cyclic hierarchy without memory-safety consequences. Every parent-chain
//! walk in this module is fuel-capped for that reason: cycles are a logical
//! error caught by the validation pass, not something lookup may hang on.
//!
//! `SELF_TYPE` is the [`Ty::SelfOf`] case of the class-reference type, tied
//! to its owning class. It is a type, never an instantiable class; it
//! converts to the owning class (its "actual" class) or to a
//! context-resolved type depending on the use site.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

// ============================================================================
// Ids and types
// ============================================================================

/// Index of a class symbol in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an identifier symbol (attribute, local, formal, `self`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

/// Index of a method symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u32);

/// A reference to a class type: either a concrete class or the polymorphic
/// self type of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Class(ClassId),
    SelfOf(ClassId),
}

impl Ty {
    /// Whether this is a `SELF_TYPE`.
    #[inline]
    pub fn is_self_type(self) -> bool {
        matches!(self, Ty::SelfOf(_))
    }

    /// The concrete class this type falls back to: itself for a class,
    /// the owning class for a self type.
    #[inline]
    pub fn actual_class(self) -> ClassId {
        match self {
            Ty::Class(c) | Ty::SelfOf(c) => c,
        }
    }
}

bitflags! {
    /// Per-class properties fixed at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u8 {
        /// Pre-registered class (Object, IO, Int, String, Bool).
        const BUILTIN = 1 << 0;
        /// Value-like built-in (Int, String, Bool): illegal as a parent,
        /// restricted under `=` comparison.
        const PRIMITIVE = 1 << 1;
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// How an identifier's storage is addressed in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Object slot, addressed off the instance pointer.
    Attribute,
    /// `let`/`case` slot, addressed off the frame pointer (negative).
    Local,
    /// Method parameter, addressed off the frame pointer (positive).
    Formal,
    /// The implicit instance reference `self`.
    SelfRef,
}

/// An identifier symbol: name, declared type, and storage assignment.
///
/// `ty` is `None` until the binding pass resolves the declared type name
/// (and stays `None` if that resolution failed). `index` is meaningful only
/// within `kind`; attribute indices are stamped when the owning class's
/// attribute table is first computed.
#[derive(Debug, Clone)]
pub struct IdSymbol {
    pub name: String,
    pub ty: Option<Ty>,
    pub kind: StorageKind,
    pub index: u32,
}

/// A method symbol: signature plus dispatch/frame bookkeeping.
#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub name: String,
    pub owner: ClassId,
    /// Declared return type; `None` until bound.
    pub ret: Option<Ty>,
    /// Formal parameter symbols in declaration order.
    pub formals: Vec<SymbolId>,
    /// Slot in the owning hierarchy's virtual-method table, stamped when the
    /// owner's table is first computed.
    pub vtable_slot: Option<u32>,
    /// Number of local slots the body needs (`let`/`case` bindings).
    pub local_slots: u32,
}

/// A class symbol. Attributes and methods live in separate namespaces,
/// each kept in declaration order for layout and vtable construction.
#[derive(Debug, Clone)]
pub struct ClassSymbol {
    pub name: String,
    pub parent: Option<ClassId>,
    pub children: Vec<ClassId>,
    pub depth: u32,
    pub flags: ClassFlags,

    attrs: FxHashMap<String, SymbolId>,
    attr_order: Vec<SymbolId>,
    methods: FxHashMap<String, MethodId>,
    method_order: Vec<MethodId>,

    /// The pre-bound `self` identifier of this class.
    pub self_symbol: SymbolId,

    /// Class tag, assigned by the code generator's DFS.
    pub tag: u32,
    /// One past the largest tag in this class's subtree: the subtree
    /// occupies `[tag, max_subtree_tag)`.
    pub max_subtree_tag: u32,

    /// Local slots needed by attribute initializers (the init routine's
    /// frame), counted like a method's locals.
    pub init_local_slots: u32,

    attr_table: Option<Vec<SymbolId>>,
    vm_table: Option<Vec<MethodId>>,
}

impl ClassSymbol {
    pub fn is_primitive(&self) -> bool {
        self.flags.contains(ClassFlags::PRIMITIVE)
    }

    pub fn is_builtin(&self) -> bool {
        self.flags.contains(ClassFlags::BUILTIN)
    }

    /// Attributes in declaration order (own only, no inherited).
    pub fn own_attributes(&self) -> &[SymbolId] {
        &self.attr_order
    }

    /// Methods in declaration order (own only, no inherited).
    pub fn own_methods(&self) -> &[MethodId] {
        &self.method_order
    }
}

// ============================================================================
// Symbol arena
// ============================================================================

/// The arena of all class, identifier, and method symbols of one
/// compilation, plus the global class namespace.
///
/// Created empty; the compilation context installs the built-in classes
/// before any pass runs. Symbols are never removed, so ids stay valid for
/// the whole compilation.
#[derive(Debug, Default)]
pub struct Symbols {
    classes: Vec<ClassSymbol>,
    ids: Vec<IdSymbol>,
    methods: Vec<MethodSymbol>,
    by_name: FxHashMap<String, ClassId>,
    root: Option<ClassId>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Construction
    // ==========================================================================

    /// Register a class in the global namespace. Fails if the name is taken
    /// (including collisions with built-ins). Also creates the class's
    /// `self` symbol.
    pub fn add_class(&mut self, name: &str, flags: ClassFlags) -> Option<ClassId> {
        if self.by_name.contains_key(name) {
            return None;
        }

        let id = ClassId(self.classes.len() as u32);
        let self_symbol = self.add_id(IdSymbol {
            name: "self".to_string(),
            ty: Some(Ty::SelfOf(id)),
            kind: StorageKind::SelfRef,
            index: 0,
        });

        self.classes.push(ClassSymbol {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            depth: 0,
            flags,
            attrs: FxHashMap::default(),
            attr_order: Vec::new(),
            methods: FxHashMap::default(),
            method_order: Vec::new(),
            self_symbol,
            tag: 0,
            max_subtree_tag: 0,
            init_local_slots: 0,
            attr_table: None,
            vm_table: None,
        });
        self.by_name.insert(name.to_string(), id);

        if self.root.is_none() {
            // The first class registered is the root (Object).
            self.root = Some(id);
        }

        Some(id)
    }

    pub fn add_id(&mut self, sym: IdSymbol) -> SymbolId {
        let id = SymbolId(self.ids.len() as u32);
        self.ids.push(sym);
        id
    }

    /// Declare an attribute on a class. Fails if the class already has an
    /// attribute of that name; inherited collisions are the validation
    /// pass's concern.
    pub fn add_attribute(&mut self, class: ClassId, name: &str) -> Option<SymbolId> {
        if self.class(class).attrs.contains_key(name) {
            return None;
        }
        let sym = self.add_id(IdSymbol {
            name: name.to_string(),
            ty: None,
            kind: StorageKind::Attribute,
            index: 0,
        });
        let c = self.class_mut(class);
        c.attrs.insert(name.to_string(), sym);
        c.attr_order.push(sym);
        Some(sym)
    }

    /// Declare a method on a class. Fails on a same-class name collision.
    pub fn add_method(&mut self, class: ClassId, name: &str) -> Option<MethodId> {
        if self.class(class).methods.contains_key(name) {
            return None;
        }
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(MethodSymbol {
            name: name.to_string(),
            owner: class,
            ret: None,
            formals: Vec::new(),
            vtable_slot: None,
            local_slots: 0,
        });
        let c = self.class_mut(class);
        c.methods.insert(name.to_string(), id);
        c.method_order.push(id);
        Some(id)
    }

    /// Attach a parent link and record the child on the parent side.
    pub fn set_parent(&mut self, child: ClassId, parent: ClassId) {
        self.class_mut(child).parent = Some(parent);
        self.class_mut(parent).children.push(child);
    }

    /// Recompute every class's depth from the root. Parent chains may be
    /// cyclic at this point, so the walk is fuel-capped; affected classes
    /// get an arbitrary bounded depth and are reported by validation.
    pub fn recompute_depths(&mut self) {
        for i in 0..self.classes.len() {
            let mut depth = 0u32;
            let mut cur = self.classes[i].parent;
            let mut fuel = self.classes.len();
            while let Some(p) = cur {
                if fuel == 0 {
                    break;
                }
                fuel -= 1;
                depth += 1;
                cur = self.classes[p.index()].parent;
            }
            self.classes[i].depth = depth;
        }
    }

    // ==========================================================================
    // Access
    // ==========================================================================

    #[inline]
    pub fn class(&self, id: ClassId) -> &ClassSymbol {
        &self.classes[id.index()]
    }

    #[inline]
    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassSymbol {
        &mut self.classes[id.index()]
    }

    #[inline]
    pub fn id(&self, id: SymbolId) -> &IdSymbol {
        &self.ids[id.0 as usize]
    }

    #[inline]
    pub fn id_mut(&mut self, id: SymbolId) -> &mut IdSymbol {
        &mut self.ids[id.0 as usize]
    }

    #[inline]
    pub fn method(&self, id: MethodId) -> &MethodSymbol {
        &self.methods[id.0 as usize]
    }

    #[inline]
    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodSymbol {
        &mut self.methods[id.0 as usize]
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Global class-name lookup.
    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// The root class (Object). Installed first by the context.
    pub fn root(&self) -> ClassId {
        self.root.unwrap_or(ClassId(0))
    }

    /// Display name of a type, as diagnostics quote it.
    pub fn ty_name(&self, ty: Ty) -> &str {
        match ty {
            Ty::SelfOf(_) => "SELF_TYPE",
            Ty::Class(c) => &self.class(c).name,
        }
    }

    /// Resolve a type against an enclosing class: `SELF_TYPE` becomes the
    /// class itself, a concrete class stays put.
    pub fn resolve_self(&self, ty: Ty, enclosing: ClassId) -> ClassId {
        match ty {
            Ty::SelfOf(_) => enclosing,
            Ty::Class(c) => c,
        }
    }

    // ==========================================================================
    // Hierarchy queries
    // ==========================================================================

    /// The class and its ancestors, nearest first, fuel-capped against
    /// cyclic parent chains.
    pub fn ancestry(&self, class: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        let mut cur = Some(class);
        let mut fuel = self.classes.len() + 1;
        std::iter::from_fn(move || {
            if fuel == 0 {
                return None;
            }
            fuel -= 1;
            let c = cur?;
            cur = self.class(c).parent;
            Some(c)
        })
    }

    /// Nominal subclassing: `a` is `b` or inherits from it.
    pub fn is_subclass(&self, a: ClassId, b: ClassId) -> bool {
        self.ancestry(a).any(|c| c == b)
    }

    /// Subtyping over class references: self-type identity first, then
    /// nominal subclassing. No concrete class is a subtype of a self type.
    pub fn is_subtype(&self, a: Ty, b: Ty) -> bool {
        match (a, b) {
            (Ty::SelfOf(c1), Ty::SelfOf(c2)) => c1 == c2,
            (Ty::Class(_), Ty::SelfOf(_)) => false,
            (Ty::SelfOf(a), Ty::Class(b)) | (Ty::Class(a), Ty::Class(b)) => self.is_subclass(a, b),
        }
    }

    /// Least upper bound of two classes: equalize depth, then walk both in
    /// lockstep until they coincide. Falls back to the root if the chains
    /// never meet (possible only in a program with hierarchy errors).
    pub fn least_upper_bound(&self, a: ClassId, b: ClassId) -> ClassId {
        let (mut c1, mut c2) = (a, b);
        let (d1, d2) = (self.class(c1).depth, self.class(c2).depth);
        let mut diff = d1 as i64 - d2 as i64;
        if diff < 0 {
            std::mem::swap(&mut c1, &mut c2);
            diff = -diff;
        }

        while diff > 0 {
            match self.class(c1).parent {
                Some(p) => c1 = p,
                None => break,
            }
            diff -= 1;
        }

        let mut fuel = self.classes.len() + 1;
        while fuel > 0 {
            fuel -= 1;
            if c1 == c2 {
                return c1;
            }
            match (self.class(c1).parent, self.class(c2).parent) {
                (Some(p1), Some(p2)) => {
                    c1 = p1;
                    c2 = p2;
                }
                _ => break,
            }
        }

        self.root()
    }

    /// Least upper bound over class references. Identical references meet
    /// at themselves (so two `SELF_TYPE`s of the same class stay
    /// polymorphic); anything else meets at the actual classes' bound.
    pub fn lub(&self, a: Ty, b: Ty) -> Ty {
        if a == b {
            a
        } else {
            Ty::Class(self.least_upper_bound(a.actual_class(), b.actual_class()))
        }
    }

    // ==========================================================================
    // Member lookup
    // ==========================================================================

    /// Find an attribute by name on a class or any ancestor.
    pub fn lookup_attribute(&self, class: ClassId, name: &str) -> Option<SymbolId> {
        self.ancestry(class)
            .find_map(|c| self.class(c).attrs.get(name).copied())
    }

    /// Find a method by name on a class or any ancestor.
    pub fn lookup_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        self.ancestry(class)
            .find_map(|c| self.class(c).methods.get(name).copied())
    }

    /// Find a method by name starting at the class's *parent* (the method a
    /// definition would override).
    pub fn lookup_inherited_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        let parent = self.class(class).parent?;
        self.lookup_method(parent, name)
    }

    /// Find an attribute by name starting at the class's parent.
    pub fn lookup_inherited_attribute(&self, class: ClassId, name: &str) -> Option<SymbolId> {
        let parent = self.class(class).parent?;
        self.lookup_attribute(parent, name)
    }

    // ==========================================================================
    // Layout tables
    // ==========================================================================

    /// The linearized attribute table of a class: inherited attributes
    /// first, own attributes after, each stamped with its final storage
    /// index. Computed lazily and cached; a class's table must not be
    /// requested before its parent's hierarchy is final.
    pub fn attr_table(&mut self, class: ClassId) -> Vec<SymbolId> {
        if let Some(table) = &self.class(class).attr_table {
            return table.clone();
        }

        let mut table = match self.class(class).parent {
            Some(p) => self.attr_table(p),
            None => Vec::new(),
        };
        table.extend_from_slice(&self.class(class).attr_order.clone());

        for (index, &sym) in table.iter().enumerate() {
            self.id_mut(sym).index = index as u32;
        }

        self.class_mut(class).attr_table = Some(table.clone());
        table
    }

    /// The linearized virtual-method table of a class: inherited slots
    /// first; an override replaces its parent's slot in place, keeping the
    /// index; new methods append. Each method is stamped with its slot.
    pub fn vm_table(&mut self, class: ClassId) -> Vec<MethodId> {
        if let Some(table) = &self.class(class).vm_table {
            return table.clone();
        }

        let mut table = match self.class(class).parent {
            Some(p) => self.vm_table(p),
            None => Vec::new(),
        };

        for &mid in &self.class(class).method_order.clone() {
            let name = self.method(mid).name.clone();
            match table
                .iter()
                .position(|&existing| self.method(existing).name == name)
            {
                Some(slot) => {
                    table[slot] = mid;
                    self.method_mut(mid).vtable_slot = Some(slot as u32);
                }
                None => {
                    table.push(mid);
                    self.method_mut(mid).vtable_slot = Some(table.len() as u32 - 1);
                }
            }
        }

        self.class_mut(class).vm_table = Some(table.clone());
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> (Symbols, ClassId, ClassId, ClassId, ClassId) {
        // Object <- A <- B, Object <- C
        let mut syms = Symbols::new();
        let object = syms.add_class("Object", ClassFlags::BUILTIN).unwrap();
        let a = syms.add_class("A", ClassFlags::empty()).unwrap();
        let b = syms.add_class("B", ClassFlags::empty()).unwrap();
        let c = syms.add_class("C", ClassFlags::empty()).unwrap();
        syms.set_parent(a, object);
        syms.set_parent(b, a);
        syms.set_parent(c, object);
        syms.recompute_depths();
        (syms, object, a, b, c)
    }

    #[test]
    fn duplicate_class_rejected() {
        let mut syms = Symbols::new();
        assert!(syms.add_class("A", ClassFlags::empty()).is_some());
        assert!(syms.add_class("A", ClassFlags::empty()).is_none());
    }

    #[test]
    fn lub_is_symmetric_and_rooted() {
        let (syms, object, a, b, c) = hierarchy();
        assert_eq!(syms.least_upper_bound(b, c), object);
        assert_eq!(syms.least_upper_bound(c, b), object);
        assert_eq!(syms.least_upper_bound(b, a), a);
        assert_eq!(syms.least_upper_bound(a, b), a);
        assert_eq!(syms.least_upper_bound(b, b), b);
        assert_eq!(syms.least_upper_bound(object, c), object);
    }

    #[test]
    fn lub_of_identical_self_types_stays_polymorphic() {
        let (syms, _, a, b, _) = hierarchy();
        assert_eq!(syms.lub(Ty::SelfOf(a), Ty::SelfOf(a)), Ty::SelfOf(a));
        // Different self types meet at their classes' bound.
        assert_eq!(syms.lub(Ty::SelfOf(b), Ty::Class(a)), Ty::Class(a));
    }

    #[test]
    fn subtyping_with_self_types() {
        let (syms, object, a, b, c) = hierarchy();
        assert!(syms.is_subtype(Ty::Class(b), Ty::Class(a)));
        assert!(!syms.is_subtype(Ty::Class(a), Ty::Class(b)));
        assert!(syms.is_subtype(Ty::SelfOf(b), Ty::Class(object)));
        // No concrete class is below a self type.
        assert!(!syms.is_subtype(Ty::Class(b), Ty::SelfOf(b)));
        assert!(syms.is_subtype(Ty::SelfOf(c), Ty::SelfOf(c)));
    }

    #[test]
    fn cyclic_parent_chain_does_not_hang() {
        let mut syms = Symbols::new();
        let a = syms.add_class("A", ClassFlags::empty()).unwrap();
        let b = syms.add_class("B", ClassFlags::empty()).unwrap();
        syms.set_parent(a, b);
        syms.set_parent(b, a);
        syms.recompute_depths();
        assert!(syms.is_subclass(a, b));
        assert!(syms.lookup_method(a, "missing").is_none());
    }

    #[test]
    fn vm_table_override_keeps_slot() {
        let (mut syms, object, a, b, _) = hierarchy();
        syms.add_method(object, "abort").unwrap();
        syms.add_method(object, "type_name").unwrap();
        let a_f = syms.add_method(a, "f").unwrap();
        let b_f = syms.add_method(b, "f").unwrap();
        let b_g = syms.add_method(b, "g").unwrap();

        let a_table = syms.vm_table(a);
        assert_eq!(a_table.len(), 3);
        assert_eq!(a_table[2], a_f);

        let b_table = syms.vm_table(b);
        assert_eq!(b_table.len(), 4);
        // Override replaces the parent's slot in place.
        assert_eq!(b_table[2], b_f);
        assert_eq!(b_table[3], b_g);
        assert_eq!(syms.method(a_f).vtable_slot, Some(2));
        assert_eq!(syms.method(b_f).vtable_slot, Some(2));
        assert_eq!(syms.method(b_g).vtable_slot, Some(3));

        // No duplicate names within one table.
        let names: Vec<_> = b_table.iter().map(|&m| &syms.method(m).name).collect();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn attr_table_inherited_prefix() {
        let (mut syms, _, a, b, _) = hierarchy();
        let ax = syms.add_attribute(a, "x").unwrap();
        let by = syms.add_attribute(b, "y").unwrap();
        let bz = syms.add_attribute(b, "z").unwrap();

        let table = syms.attr_table(b);
        assert_eq!(table, vec![ax, by, bz]);
        assert_eq!(syms.id(ax).index, 0);
        assert_eq!(syms.id(by).index, 1);
        assert_eq!(syms.id(bz).index, 2);
    }

    #[test]
    fn duplicate_member_rejected() {
        let (mut syms, _, a, _, _) = hierarchy();
        assert!(syms.add_attribute(a, "x").is_some());
        assert!(syms.add_attribute(a, "x").is_none());
        assert!(syms.add_method(a, "f").is_some());
        assert!(syms.add_method(a, "f").is_none());
    }
}
