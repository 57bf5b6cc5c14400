//! Code generation pass: class layout and MIPS emission.
//!
//! Runs only on a fully validated, error-free program, in two phases over
//! the class hierarchy:
//!
//! 1. Tag assignment, a DFS from the root: every class and its descendants
//!    occupy the contiguous tag interval `[tag, max_subtree_tag)`, which
//!    makes the dynamic type test behind `case` an O(1) range check.
//! 2. Layout and emission in tag order: name-table and object-table
//!    entries, prototype objects, dispatch tables, and init routines, then
//!    one user routine per program method.
//!
//! All addressing follows the fixed runtime model: 4-byte words, 3-word
//! object headers, attributes off the instance pointer in `$s0`, formals
//! and locals off `$fp`.

pub mod asm;
pub mod constants;

use cool_ast::{ExprId, ExprKind, Feature, Program};

use crate::context::CompilationContext;
use crate::symbols::{ClassId, MethodId, StorageKind, SymbolId, Ty};

use asm::{emit, Asm, EYECATCHER, HEADER_WORDS, WORD_SIZE};
use constants::ConstantPool;

fn attr_offset(index: u32) -> i32 {
    (index as i32 + HEADER_WORDS) * WORD_SIZE
}

fn local_offset(index: u32) -> i32 {
    (-(index as i32) - 1) * WORD_SIZE
}

fn formal_offset(index: u32) -> i32 {
    (index as i32 + HEADER_WORDS) * WORD_SIZE
}

pub struct CodeGenPass<'a> {
    ctx: &'a mut CompilationContext,
    program: &'a Program,
    pool: ConstantPool,
    uniq: u32,
    /// Pool id of the current class's source file name, referenced by
    /// runtime abort messages.
    file_id: u32,

    name_tab: Asm,
    obj_tab: Asm,
    prototypes: Asm,
    disp_tables: Asm,
    init_routines: Asm,
    user_routines: Asm,
}

impl<'a> CodeGenPass<'a> {
    /// Generate the complete assembly image. The context must hold a fully
    /// resolved, error-free program.
    pub fn run(ctx: &'a mut CompilationContext, program: &'a Program) -> String {
        let mut pass = Self {
            ctx,
            program,
            pool: ConstantPool::new(),
            uniq: 0,
            file_id: 0,
            name_tab: Asm::new(),
            obj_tab: Asm::new(),
            prototypes: Asm::new(),
            disp_tables: Asm::new(),
            init_routines: Asm::new(),
            user_routines: Asm::new(),
        };

        let root = pass.ctx.builtins.object;
        pass.assign_tags(root);
        pass.create_class_layout(root);

        for (index, class) in program.classes.iter().enumerate() {
            let Some(class_id) = pass.ctx.class_syms[index] else {
                continue;
            };
            pass.file_id = pass.pool.string_id(program.file_name(class.file));
            pass.emit_class(class_id, class);
        }

        pass.assemble()
    }

    fn next_uniq(&mut self) -> u32 {
        let u = self.uniq;
        self.uniq += 1;
        u
    }

    // ==========================================================================
    // Phase 1: tags
    // ==========================================================================

    /// Depth-first tag assignment. A class takes its parent's running
    /// counter as its tag, its subtree claims the following tags, and the
    /// top of the claimed range is reported back to the parent.
    fn assign_tags(&mut self, class: ClassId) {
        let parent = self.ctx.symbols.class(class).parent;
        let base = parent.map_or(0, |p| self.ctx.symbols.class(p).max_subtree_tag);

        {
            let c = self.ctx.symbols.class_mut(class);
            c.tag = base;
            c.max_subtree_tag = base + 1;
        }

        for child in self.ctx.symbols.class(class).children.clone() {
            self.assign_tags(child);
        }

        if let Some(p) = parent {
            let top = self.ctx.symbols.class(class).max_subtree_tag;
            self.ctx.symbols.class_mut(p).max_subtree_tag = top;
        }
    }

    // ==========================================================================
    // Phase 2: class layout
    // ==========================================================================

    /// Emit per-class tables in tag order (the name and object tables are
    /// indexed by tag, so this DFS order is mandatory).
    fn create_class_layout(&mut self, class: ClassId) {
        let name = self.ctx.symbols.class(class).name.clone();
        let tag = self.ctx.symbols.class(class).tag;

        let name_id = self.pool.string_id(&name);
        self.name_tab.word(format_args!("str_const{name_id}"));

        self.obj_tab.word(format_args!("{name}_protObj"));
        self.obj_tab.word(format_args!("{name}_init"));

        let attr_table = self.ctx.symbols.attr_table(class);
        self.emit_prototype(class, &name, tag, &attr_table);

        let vm_table = self.ctx.symbols.vm_table(class);
        self.disp_tables.label(format!("{name}_dispTab"));
        for method in vm_table {
            let m = self.ctx.symbols.method(method);
            let owner = self.ctx.symbols.class(m.owner).name.clone();
            self.disp_tables
                .word(format_args!("{owner}.{}", self.ctx.symbols.method(method).name));
        }

        // Built-in init routines carry no attribute initializers; user
        // classes get theirs when their class body is emitted.
        if self.ctx.symbols.class(class).is_builtin() {
            let parent = self.ctx.symbols.class(class).parent;
            let mut body = Asm::new();
            if let Some(p) = parent {
                let parent_name = self.ctx.symbols.class(p).name.clone();
                emit!(body, "jal\t{parent_name}_init");
            }
            body.ins("move\t$a0 $s0");
            self.emit_routine_into(
                Section::Init,
                &format!("{name}_init"),
                0,
                0,
                body,
            );
        }

        for child in self.ctx.symbols.class(class).children.clone() {
            self.create_class_layout(child);
        }
    }

    fn emit_prototype(&mut self, class: ClassId, name: &str, tag: u32, attrs: &[SymbolId]) {
        let builtins = self.ctx.builtins;
        let out = &mut self.prototypes;

        out.word(EYECATCHER);
        out.label(format!("{name}_protObj"));
        out.word(tag);

        if class == builtins.int || class == builtins.bool_ {
            // One raw value word.
            out.word(HEADER_WORDS + 1);
            out.word(format_args!("{name}_dispTab"));
            out.word(0);
            return;
        }
        if class == builtins.string {
            // Length slot plus the (empty) content word.
            out.word(HEADER_WORDS + 2);
            out.word(format_args!("{name}_dispTab"));
            out.word("int_const0");
            out.string_data("");
            return;
        }

        out.word(HEADER_WORDS + attrs.len() as i32);
        out.word(format_args!("{name}_dispTab"));
        for &attr in attrs {
            let default = self
                .ctx
                .symbols
                .id(attr)
                .ty
                .map(Ty::actual_class)
                .and_then(|c| {
                    if c == builtins.int {
                        Some("int_const0")
                    } else if c == builtins.string {
                        Some("str_const0")
                    } else if c == builtins.bool_ {
                        Some("bool_const0")
                    } else {
                        None
                    }
                });
            match default {
                Some(constant) => self.prototypes.word(constant),
                None => self.prototypes.word(0),
            }
        }
    }

    // ==========================================================================
    // Routines
    // ==========================================================================

    fn emit_class(&mut self, class_id: ClassId, class: &cool_ast::ClassDef) {
        let name = self.ctx.symbols.class(class_id).name.clone();
        let parent = self.ctx.symbols.class(class_id).parent;

        let mut init_body = Asm::new();
        if let Some(p) = parent {
            let parent_name = self.ctx.symbols.class(p).name.clone();
            emit!(init_body, "jal\t{parent_name}_init");
        }

        for feature in &class.features {
            match feature {
                Feature::Attribute(attr) => {
                    // Only explicit initializers run here; defaults come
                    // from the prototype.
                    let Some(init) = attr.init else {
                        continue;
                    };
                    let Some(sym) = self.ctx.def_id_symbol(attr.def) else {
                        continue;
                    };
                    self.emit_expr(init, &mut init_body);
                    let offset = attr_offset(self.ctx.symbols.id(sym).index);
                    emit!(init_body, "sw\t$a0 {offset}($s0)");
                }
                Feature::Method(method) => {
                    let Some(method_id) = self.ctx.def_method(method.def) else {
                        continue;
                    };
                    self.emit_method(&name, method_id, method);
                }
            }
        }

        init_body.ins("move\t$a0 $s0");
        let init_locals = self.ctx.symbols.class(class_id).init_local_slots;
        self.emit_routine_into(Section::Init, &format!("{name}_init"), init_locals, 0, init_body);
    }

    fn emit_method(&mut self, class_name: &str, method_id: MethodId, method: &cool_ast::MethodDef) {
        let mut body = Asm::new();
        self.emit_expr(method.body, &mut body);

        let locals = self.ctx.symbols.method(method_id).local_slots;
        let formals = method.formals.len() as u32;
        self.emit_routine_into(
            Section::User,
            &format!("{class_name}.{}", method.name.name),
            locals,
            formals,
            body,
        );
    }

    /// Wrap a routine body in the standard frame: save `$fp`/`$s0`/`$ra`,
    /// point `$fp` at the saved `$ra`, adopt the receiver, reserve local
    /// slots; on exit, release locals, restore, and pop the frame plus the
    /// caller-pushed formals.
    fn emit_routine_into(
        &mut self,
        section: Section,
        label: &str,
        locals: u32,
        formals: u32,
        body: Asm,
    ) {
        let out = match section {
            Section::Init => &mut self.init_routines,
            Section::User => &mut self.user_routines,
        };
        let local_bytes = locals as i32 * WORD_SIZE;
        let fixup = (formals as i32 + HEADER_WORDS) * WORD_SIZE;

        out.label(label);
        out.ins("addiu\t$sp $sp -12");
        out.ins("sw\t$fp 12($sp)");
        out.ins("sw\t$s0 8($sp)");
        out.ins("sw\t$ra 4($sp)");
        out.ins("addiu\t$fp $sp 4");
        out.ins("move\t$s0 $a0");
        if local_bytes > 0 {
            emit!(out, "addiu\t$sp $sp -{local_bytes}");
        }
        out.append(&body);
        if local_bytes > 0 {
            emit!(out, "addiu\t$sp $sp {local_bytes}");
        }
        out.ins("lw\t$fp 12($sp)");
        out.ins("lw\t$s0 8($sp)");
        out.ins("lw\t$ra 4($sp)");
        emit!(out, "addiu\t$sp $sp {fixup}");
        out.ins("jr\t$ra");
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    /// Emit code leaving the expression's value in `$a0`.
    fn emit_expr(&mut self, expr: ExprId, out: &mut Asm) {
        let program = self.program;
        match &program.expr(expr).kind {
            ExprKind::Int(value) => {
                let id = self.pool.int_id(*value);
                emit!(out, "la\t$a0 int_const{id}");
            }
            ExprKind::Str(value) => {
                let id = self.pool.string_id(value);
                emit!(out, "la\t$a0 str_const{id}");
            }
            ExprKind::Bool(value) => {
                let id = ConstantPool::bool_id(*value);
                emit!(out, "la\t$a0 bool_const{id}");
            }

            ExprKind::Id(_) => {
                if let Some(&sym) = self.ctx.expr_symbols.get(&expr) {
                    self.emit_load(sym, out);
                }
            }

            ExprKind::Assign { value, .. } => {
                self.emit_expr(*value, out);
                if let Some(&sym) = self.ctx.expr_symbols.get(&expr) {
                    self.emit_store(sym, out);
                }
            }

            ExprKind::New(type_name) => {
                if type_name.is_self_type() {
                    self.emit_new_self_type(out);
                } else {
                    emit!(out, "la\t$a0 {}_protObj", type_name.name);
                    out.ins("jal\tObject.copy");
                    emit!(out, "jal\t{}_init", type_name.name);
                }
            }

            ExprKind::IsVoid(e) => {
                self.emit_expr(*e, out);
                let u = self.next_uniq();
                out.ins("move\t$t1 $a0");
                out.ins("la\t$a0 bool_const1");
                emit!(out, "beqz\t$t1 isvoid_true{u}");
                out.ins("la\t$a0 bool_const0");
                out.label(format!("isvoid_true{u}"));
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let u = self.next_uniq();
                self.emit_expr(*cond, out);
                out.ins("lw\t$t1 12($a0)");
                emit!(out, "beqz\t$t1 if_else{u}");
                self.emit_expr(*then_branch, out);
                emit!(out, "b\tif_end{u}");
                out.label(format!("if_else{u}"));
                self.emit_expr(*else_branch, out);
                out.label(format!("if_end{u}"));
            }

            ExprKind::While { cond, body } => {
                let u = self.next_uniq();
                out.label(format!("while_cond{u}"));
                self.emit_expr(*cond, out);
                out.ins("lw\t$t1 12($a0)");
                emit!(out, "beqz\t$t1 while_end{u}");
                self.emit_expr(*body, out);
                emit!(out, "b\twhile_cond{u}");
                out.label(format!("while_end{u}"));
                out.ins("move\t$a0 $zero");
            }

            ExprKind::Block(exprs) => {
                for &e in exprs {
                    self.emit_expr(e, out);
                }
            }

            ExprKind::Let { bindings, body } => {
                for binding in bindings {
                    let Some(sym) = self.ctx.def_id_symbol(binding.def) else {
                        continue;
                    };
                    match binding.init {
                        Some(init) => self.emit_expr(init, out),
                        None => {
                            let ty = self.ctx.symbols.id(sym).ty;
                            self.emit_default(ty, out);
                        }
                    }
                    self.emit_store(sym, out);
                }
                self.emit_expr(*body, out);
            }

            ExprKind::Case { scrutinee, arms } => self.emit_case(expr, *scrutinee, arms, out),

            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(*op, *lhs, *rhs, out),

            ExprKind::Not(e) => {
                self.emit_expr(*e, out);
                let u = self.next_uniq();
                out.ins("lw\t$t1 12($a0)");
                out.ins("la\t$a0 bool_const1");
                emit!(out, "beqz\t$t1 not_true{u}");
                out.ins("la\t$a0 bool_const0");
                out.label(format!("not_true{u}"));
            }

            ExprKind::Negate(e) => {
                self.emit_expr(*e, out);
                out.ins("jal\tObject.copy");
                out.ins("lw\t$t1 12($a0)");
                out.ins("neg\t$t1 $t1");
                out.ins("sw\t$t1 12($a0)");
            }

            ExprKind::Dispatch {
                receiver,
                static_type,
                method,
                args,
            } => self.emit_dispatch(expr, *receiver, static_type.as_ref(), args, out),
        }
    }

    fn emit_load(&self, sym: SymbolId, out: &mut Asm) {
        let id = self.ctx.symbols.id(sym);
        match id.kind {
            StorageKind::SelfRef => out.ins("move\t$a0 $s0"),
            StorageKind::Attribute => emit!(out, "lw\t$a0 {}($s0)", attr_offset(id.index)),
            StorageKind::Local => emit!(out, "lw\t$a0 {}($fp)", local_offset(id.index)),
            StorageKind::Formal => emit!(out, "lw\t$a0 {}($fp)", formal_offset(id.index)),
        }
    }

    fn emit_store(&self, sym: SymbolId, out: &mut Asm) {
        let id = self.ctx.symbols.id(sym);
        match id.kind {
            StorageKind::SelfRef => {}
            StorageKind::Attribute => emit!(out, "sw\t$a0 {}($s0)", attr_offset(id.index)),
            StorageKind::Local => emit!(out, "sw\t$a0 {}($fp)", local_offset(id.index)),
            StorageKind::Formal => emit!(out, "sw\t$a0 {}($fp)", formal_offset(id.index)),
        }
    }

    /// Default value for an uninitialized binding: the cached zero/empty
    /// constant for primitive types, the void reference otherwise.
    fn emit_default(&mut self, ty: Option<Ty>, out: &mut Asm) {
        let builtins = self.ctx.builtins;
        let class = ty.map(Ty::actual_class);
        if class == Some(builtins.int) {
            out.ins("la\t$a0 int_const0");
        } else if class == Some(builtins.string) {
            out.ins("la\t$a0 str_const0");
        } else if class == Some(builtins.bool_) {
            out.ins("la\t$a0 bool_const0");
        } else {
            out.ins("li\t$a0 0");
        }
    }

    fn emit_new_self_type(&mut self, out: &mut Asm) {
        // Index the class object table by the receiver's tag; each class
        // contributes two words (prototype, init routine).
        out.ins("la\t$t1 class_objTab");
        out.ins("lw\t$t2 0($s0)");
        out.ins("sll\t$t2 $t2 3");
        out.ins("addu\t$t1 $t1 $t2");
        out.ins("sw\t$t1 0($sp)");
        out.ins("addiu\t$sp $sp -4");
        out.ins("lw\t$a0 0($t1)");
        out.ins("jal\tObject.copy");
        out.ins("lw\t$t1 4($sp)");
        out.ins("addiu\t$sp $sp 4");
        out.ins("lw\t$t1 4($t1)");
        out.ins("jalr\t$t1");
    }

    fn emit_binary(&mut self, op: cool_ast::BinaryOp, lhs: ExprId, rhs: ExprId, out: &mut Asm) {
        use cool_ast::BinaryOp;

        self.emit_expr(lhs, out);
        out.ins("sw\t$a0 0($sp)");
        out.ins("addiu\t$sp $sp -4");
        self.emit_expr(rhs, out);

        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                // Copy the right operand as the result object, then fold
                // the left value into its value slot.
                let ins = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    BinaryOp::Mul => "mul",
                    _ => "div",
                };
                out.ins("jal\tObject.copy");
                out.ins("lw\t$t1 4($sp)");
                out.ins("addiu\t$sp $sp 4");
                out.ins("lw\t$t1 12($t1)");
                out.ins("lw\t$t2 12($a0)");
                emit!(out, "{ins}\t$t1 $t1 $t2");
                out.ins("sw\t$t1 12($a0)");
            }
            BinaryOp::Lt | BinaryOp::Le => {
                let branch = if op == BinaryOp::Lt { "blt" } else { "ble" };
                let u = self.next_uniq();
                out.ins("lw\t$t1 4($sp)");
                out.ins("addiu\t$sp $sp 4");
                out.ins("lw\t$t1 12($t1)");
                out.ins("lw\t$t2 12($a0)");
                out.ins("la\t$a0 bool_const1");
                emit!(out, "{branch}\t$t1 $t2 compare_true{u}");
                out.ins("la\t$a0 bool_const0");
                out.label(format!("compare_true{u}"));
            }
            BinaryOp::Eq => {
                let u = self.next_uniq();
                out.ins("lw\t$t1 4($sp)");
                out.ins("addiu\t$sp $sp 4");
                out.ins("move\t$t2 $a0");
                out.ins("la\t$a0 bool_const1");
                emit!(out, "beq\t$t1 $t2 eq_true{u}");
                out.ins("la\t$a1 bool_const0");
                out.ins("jal\tequality_test");
                out.label(format!("eq_true{u}"));
            }
        }
    }

    fn emit_dispatch(
        &mut self,
        expr: ExprId,
        receiver: Option<ExprId>,
        static_type: Option<&cool_ast::TypeName>,
        args: &[ExprId],
        out: &mut Asm,
    ) {
        // Arguments go on the stack right-to-left; the callee pops them.
        for &arg in args.iter().rev() {
            self.emit_expr(arg, out);
            out.ins("sw\t$a0 0($sp)");
            out.ins("addiu\t$sp $sp -4");
        }

        match receiver {
            Some(r) => self.emit_expr(r, out),
            None => out.ins("move\t$a0 $s0"),
        }

        let u = self.next_uniq();
        let line = self.program.expr(expr).span.line;
        emit!(out, "bnez\t$a0 dispatch{u}");
        emit!(out, "la\t$a0 str_const{}", self.file_id);
        emit!(out, "li\t$t1 {line}");
        out.ins("jal\t_dispatch_abort");
        out.label(format!("dispatch{u}"));

        match static_type {
            Some(qualifier) => emit!(out, "la\t$t1 {}_dispTab", qualifier.name),
            None => out.ins("lw\t$t1 8($a0)"),
        }

        let slot = self
            .ctx
            .expr_methods
            .get(&expr)
            .and_then(|&m| self.ctx.symbols.method(m).vtable_slot)
            .unwrap_or(0);
        emit!(out, "lw\t$t1 {}($t1)", slot as i32 * WORD_SIZE);
        out.ins("jalr\t$t1");
    }

    fn emit_case(
        &mut self,
        expr: ExprId,
        scrutinee: ExprId,
        arms: &[cool_ast::CaseArm],
        out: &mut Asm,
    ) {
        self.emit_expr(scrutinee, out);

        let u = self.next_uniq();
        let line = self.program.expr(expr).span.line;
        emit!(out, "bnez\t$a0 case{u}");
        emit!(out, "la\t$a0 str_const{}", self.file_id);
        emit!(out, "li\t$t1 {line}");
        out.ins("jal\t_case_abort2");
        out.label(format!("case{u}"));

        // All arms share the one reserved slot; the matched arm's variable
        // reads the scrutinee from there.
        if let Some(sym) = arms.first().and_then(|arm| self.ctx.def_id_symbol(arm.def)) {
            let offset = local_offset(self.ctx.symbols.id(sym).index);
            emit!(out, "sw\t$a0 {offset}($fp)");
        }
        out.ins("lw\t$t1 0($a0)");

        // Most specific arm first: descending tag order, each arm an O(1)
        // range test against its class's subtree interval.
        let mut ordered: Vec<&cool_ast::CaseArm> = arms.iter().collect();
        ordered.sort_by_key(|arm| {
            let tag = self
                .ctx
                .def_id_symbol(arm.def)
                .and_then(|sym| self.ctx.symbols.id(sym).ty)
                .map_or(0, |ty| self.ctx.symbols.class(ty.actual_class()).tag);
            std::cmp::Reverse(tag)
        });

        for arm in ordered {
            let Some((tag, max_tag)) = self
                .ctx
                .def_id_symbol(arm.def)
                .and_then(|sym| self.ctx.symbols.id(sym).ty)
                .map(|ty| {
                    let c = self.ctx.symbols.class(ty.actual_class());
                    (c.tag, c.max_subtree_tag)
                })
            else {
                continue;
            };

            let skip = self.next_uniq();
            emit!(out, "blt\t$t1 {tag} case_next{skip}");
            emit!(out, "bge\t$t1 {max_tag} case_next{skip}");
            self.emit_expr(arm.body, out);
            emit!(out, "b\tcase_end{u}");
            out.label(format!("case_next{skip}"));
        }

        out.ins("jal\t_case_abort");
        out.label(format!("case_end{u}"));
    }

    // ==========================================================================
    // Final image
    // ==========================================================================

    fn assemble(mut self) -> String {
        let symbols = &self.ctx.symbols;
        let int_tag = symbols.class(self.ctx.builtins.int).tag;
        let bool_tag = symbols.class(self.ctx.builtins.bool_).tag;
        let string_tag = symbols.class(self.ctx.builtins.string).tag;

        let mut out = Asm::new();
        out.ins(".data");
        out.ins(".align\t2");
        out.globl("class_nameTab");
        out.globl("Main_protObj");
        out.globl("Int_protObj");
        out.globl("String_protObj");
        out.globl("bool_const0");
        out.globl("bool_const1");
        out.globl("_int_tag");
        out.globl("_bool_tag");
        out.globl("_string_tag");
        out.label("_int_tag");
        out.word(int_tag);
        out.label("_bool_tag");
        out.word(bool_tag);
        out.label("_string_tag");
        out.word(string_tag);

        for value in [false, true] {
            out.word(EYECATCHER);
            out.label(format!("bool_const{}", ConstantPool::bool_id(value)));
            out.word(bool_tag);
            out.word(HEADER_WORDS + 1);
            out.word("Bool_dispTab");
            out.word(value as i32);
        }

        for (id, value) in self.pool.ints().iter().enumerate() {
            out.word(EYECATCHER);
            out.label(format!("int_const{id}"));
            out.word(int_tag);
            out.word(HEADER_WORDS + 1);
            out.word("Int_dispTab");
            out.word(value);
        }

        for (id, constant) in self.pool.strings().iter().enumerate() {
            let content_words = (constant.value.len() as i32 + WORD_SIZE) / WORD_SIZE;
            out.word(EYECATCHER);
            out.label(format!("str_const{id}"));
            out.word(string_tag);
            out.word(HEADER_WORDS + 1 + content_words);
            out.word("String_dispTab");
            out.word(format_args!("int_const{}", constant.len_id));
            out.string_data(&constant.value);
        }

        out.label("class_nameTab");
        out.append(&self.name_tab);
        out.label("class_objTab");
        out.append(&self.obj_tab);
        out.append(&self.prototypes);
        out.append(&self.disp_tables);

        out.globl("heap_start");
        out.label("heap_start");
        out.word(0);

        out.ins(".text");
        out.globl("Main_init");
        out.globl("Int_init");
        out.globl("String_init");
        out.globl("Bool_init");
        out.globl("Main.main");
        out.append(&self.init_routines);
        out.append(&self.user_routines);

        out.finish()
    }
}

enum Section {
    Init,
    User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{BindingPass, DefinitionPass, ResolutionPass, ValidationPass};
    use cool_ast::{AstBuilder, ClassDef, Ident, Span, TypeName};

    fn sp() -> Span {
        Span::default()
    }

    fn analyze(program: &Program) -> CompilationContext {
        let mut ctx = CompilationContext::new(program);
        DefinitionPass::run(&mut ctx, program);
        BindingPass::run(&mut ctx, program);
        ValidationPass::run(&mut ctx, program);
        ResolutionPass::run(&mut ctx, program);
        assert!(ctx.diagnostics.is_empty(), "{}", ctx.diagnostics.render());
        ctx
    }

    fn main_program() -> Program {
        // class Main { main(): Int { 42 } };
        let mut b = AstBuilder::new();
        let file = b.add_file("main.cl");
        let body = b.add_expr(ExprKind::Int(42), sp());
        let main = b.method(
            Ident::new("main", sp()),
            vec![],
            TypeName::new("Int", sp()),
            body,
        );
        b.add_class(ClassDef {
            name: TypeName::new("Main", sp()),
            parent: None,
            features: vec![main],
            file,
            span: sp(),
        });
        b.finish()
    }

    #[test]
    fn tag_ranges_are_properly_nested() {
        // Object <- A <- B, Object <- C (plus built-ins)
        let mut b = AstBuilder::new();
        let file = b.add_file("t.cl");
        for (name, parent) in [("A", None), ("B", Some("A")), ("C", None)] {
            b.add_class(ClassDef {
                name: TypeName::new(name, sp()),
                parent: parent.map(|p| TypeName::new(p, sp())),
                features: vec![],
                file,
                span: sp(),
            });
        }
        let program = b.finish();
        let mut ctx = analyze(&program);
        CodeGenPass::run(&mut ctx, &program);

        let object = ctx.builtins.object;
        let classes: Vec<ClassId> = (0..3).map(|i| ctx.class_syms[i].unwrap()).collect();
        let (a, c) = (classes[0], classes[2]);
        let b_ = classes[1];

        let tag = |c: ClassId| ctx.symbols.class(c).tag;
        let max = |c: ClassId| ctx.symbols.class(c).max_subtree_tag;

        assert_eq!(tag(object), 0);
        // Descendant intervals nest inside their ancestors'.
        assert!(tag(a) <= tag(b_) && max(b_) <= max(a));
        assert!(tag(object) <= tag(a) && max(a) <= max(object));
        // Sibling intervals never overlap.
        assert!(max(a) <= tag(c) || max(c) <= tag(a));
        // B is inside A's range, C is not.
        assert!(tag(b_) >= tag(a) && tag(b_) < max(a));
        assert!(!(tag(c) >= tag(a) && tag(c) < max(a)));
    }

    #[test]
    fn clean_program_produces_image_sections() {
        let program = main_program();
        let mut ctx = analyze(&program);
        let image = CodeGenPass::run(&mut ctx, &program);

        for expected in [
            "_int_tag",
            "bool_const0:",
            "bool_const1:",
            "int_const0:",
            "str_const0:",
            "class_nameTab:",
            "class_objTab:",
            "Main_protObj:",
            "Main_dispTab:",
            "Main_init:",
            "Main.main:",
            "Object_init:",
            "heap_start:",
        ] {
            assert!(image.contains(expected), "missing {expected}");
        }
    }

    #[test]
    fn int_literal_is_pooled_once() {
        let program = main_program();
        let mut ctx = analyze(&program);
        let image = CodeGenPass::run(&mut ctx, &program);

        let count = image.matches("\t.word\t42").count();
        assert_eq!(count, 1);
        assert!(image.contains("la\t$a0 int_const"));
    }

    #[test]
    fn dispatch_indexes_vtable_by_slot() {
        // class Main { main(): String { (new Object).type_name() } };
        let mut b = AstBuilder::new();
        let file = b.add_file("main.cl");
        let receiver = b.add_expr(ExprKind::New(TypeName::new("Object", sp())), sp());
        let call = b.add_expr(
            ExprKind::Dispatch {
                receiver: Some(receiver),
                static_type: None,
                method: Ident::new("type_name", sp()),
                args: vec![],
            },
            Span::new(7, 3, 1),
        );
        let main = b.method(
            Ident::new("main", sp()),
            vec![],
            TypeName::new("String", sp()),
            call,
        );
        b.add_class(ClassDef {
            name: TypeName::new("Main", sp()),
            parent: None,
            features: vec![main],
            file,
            span: sp(),
        });
        let program = b.finish();
        let mut ctx = analyze(&program);
        let image = CodeGenPass::run(&mut ctx, &program);

        // type_name sits in Object's second vtable slot.
        let m = ctx.symbols.lookup_method(ctx.builtins.object, "type_name").unwrap();
        let slot = ctx.symbols.method(m).vtable_slot.unwrap();
        assert!(image.contains(&format!("lw\t$t1 {}($t1)", slot * 4)));
        assert!(image.contains("jal\t_dispatch_abort"));
        assert!(image.contains("li\t$t1 7"));
    }

    #[test]
    fn attribute_defaults_use_cached_constants() {
        // class Main { s: String; o: Object; main(): Int { 0 } };
        let mut b = AstBuilder::new();
        let file = b.add_file("main.cl");
        let s = b.attribute(Ident::new("s", sp()), TypeName::new("String", sp()), None);
        let o = b.attribute(Ident::new("o", sp()), TypeName::new("Object", sp()), None);
        let body = b.add_expr(ExprKind::Int(0), sp());
        let main = b.method(
            Ident::new("main", sp()),
            vec![],
            TypeName::new("Int", sp()),
            body,
        );
        b.add_class(ClassDef {
            name: TypeName::new("Main", sp()),
            parent: None,
            features: vec![s, o, main],
            file,
            span: sp(),
        });
        let program = b.finish();
        let mut ctx = analyze(&program);
        let image = CodeGenPass::run(&mut ctx, &program);

        let proto_at = image.find("Main_protObj:").unwrap();
        let proto = &image[proto_at..proto_at + 200];
        assert!(proto.contains("str_const0"));
        // Non-primitive slots default to the void reference.
        assert!(proto.contains("\t.word\t0"));
    }
}
