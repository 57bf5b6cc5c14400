//! End-to-end code generation tests: clean programs compile to a MIPS
//! image and the emitted text is checked for the runtime contract (object
//! layout, dispatch protocol, constant pooling).

mod harness;

use coolc::ast::{BinaryOp, ExprKind, Ident, Span, TypeName};
use harness::{compile_err, compile_ok, sp, TestProgram};

#[test]
fn image_contains_runtime_tables_and_entry_points() {
    let mut p = TestProgram::new("main.cl");
    p.default_main();
    let image = compile_ok(&p.finish());

    for expected in [
        "\t.data",
        "\t.globl\tclass_nameTab",
        "\t.globl\tMain_protObj",
        "_int_tag:",
        "_bool_tag:",
        "_string_tag:",
        "bool_const0:",
        "bool_const1:",
        "class_nameTab:",
        "class_objTab:",
        "Object_protObj:",
        "IO_dispTab:",
        "String_protObj:",
        "heap_start:",
        "\t.text",
        "\t.globl\tMain.main",
        "Object_init:",
        "Main_init:",
        "Main.main:",
    ] {
        assert!(image.contains(expected), "missing {expected}\n{image}");
    }
}

#[test]
fn semantic_errors_suppress_emission() {
    let mut p = TestProgram::new("bad.cl");
    p.class("Main", Some("Nowhere"), vec![]);
    let rendered = compile_err(&p.finish());

    assert!(rendered.contains("undefined parent"));
}

#[test]
fn string_constants_are_interned_with_their_lengths() {
    let mut p = TestProgram::new("hello.cl");
    let s1 = p.string("hello");
    let s2 = p.string("hello");
    let block = p.expr(ExprKind::Block(vec![s1, s2]));
    let main = p.method("main", &[], "String", block);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert_eq!(image.matches("\t.ascii\t\"hello\"").count(), 1);
    // The content constant references a pooled Int holding its length.
    assert!(image.contains("\t.word\t5"));
}

#[test]
fn reserved_constants_come_first() {
    let mut p = TestProgram::new("main.cl");
    p.default_main();
    let image = compile_ok(&p.finish());

    // int_const0 is the zero default, str_const0 the empty string; both
    // exist even in a program that never mentions them.
    let int0 = image.find("int_const0:").expect("int_const0");
    let int0_block: Vec<&str> = image[int0..].lines().take(5).collect();
    assert!(int0_block.contains(&"\t.word\t0"));

    // The empty string carries no .ascii directive, just the terminator.
    let str0 = image.find("str_const0:").expect("str_const0");
    let str0_block: Vec<&str> = image[str0..].lines().take(7).collect();
    assert!(str0_block.contains(&"\t.word\tint_const0"));
    assert!(!str0_block.iter().any(|l| l.contains(".ascii")));
    assert!(str0_block.contains(&"\t.byte\t0"));
}

#[test]
fn arithmetic_copies_the_result_object() {
    let mut p = TestProgram::new("arith.cl");
    let lhs = p.int(1);
    let rhs = p.int(2);
    let sum = p.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        lhs,
        rhs,
    });
    let main = p.method("main", &[], "Int", sum);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("\tjal\tObject.copy"));
    assert!(image.contains("\tadd\t$t1 $t1 $t2"));
    assert!(image.contains("\tsw\t$t1 12($a0)"));
}

#[test]
fn dispatch_guards_against_void_receivers() {
    let mut p = TestProgram::new("disp.cl");
    let receiver = p.new_of("Object");
    let call = p.expr_at(
        ExprKind::Dispatch {
            receiver: Some(receiver),
            static_type: None,
            method: Ident::new("type_name", sp()),
            args: vec![],
        },
        11,
        3,
    );
    let main = p.method("main", &[], "String", call);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("\tjal\t_dispatch_abort"));
    assert!(image.contains("\tli\t$t1 11"));
    assert!(image.contains("\t.ascii\t\"disp.cl\""));
    assert!(image.contains("\tjalr\t$t1"));
}

#[test]
fn static_dispatch_bypasses_the_receiver_vtable() {
    let mut p = TestProgram::new("sdisp.cl");
    p.class("A", None, vec![]);
    p.class("B", Some("A"), vec![]);
    let receiver = p.new_of("B");
    let call = p.static_dispatch(receiver, "A", "type_name", vec![]);
    let main = p.method("main", &[], "String", call);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("\tla\t$t1 A_dispTab"));
}

#[test]
fn init_routines_chain_to_the_parent() {
    let mut p = TestProgram::new("init.cl");
    let init = p.int(7);
    let attr = p.attribute("x", "Int", Some(init));
    p.class("A", None, vec![attr]);
    p.class("B", Some("A"), vec![]);
    p.default_main();
    let image = compile_ok(&p.finish());

    let b_init = image.find("B_init:").expect("B_init");
    let b_body = &image[b_init..b_init + 300];
    assert!(b_body.contains("\tjal\tA_init"));

    // A's initializer stores into the first attribute slot past the header.
    let a_init = image.find("A_init:").expect("A_init");
    let a_body = &image[a_init..b_init.max(a_init + 300)];
    assert!(a_body.contains("\tjal\tObject_init"));
    assert!(a_body.contains("\tsw\t$a0 12($s0)"));
}

#[test]
fn prototypes_default_primitive_attributes_to_pooled_constants() {
    let mut p = TestProgram::new("proto.cl");
    let i = p.attribute("i", "Int", None);
    let s = p.attribute("s", "String", None);
    let b = p.attribute("b", "Bool", None);
    let o = p.attribute("o", "Object", None);
    p.class("A", None, vec![i, s, b, o]);
    p.default_main();
    let image = compile_ok(&p.finish());

    let proto = image.find("A_protObj:").expect("A_protObj");
    let words = &image[proto..proto + 400];
    assert!(words.contains("\t.word\tint_const0"));
    assert!(words.contains("\t.word\tstr_const0"));
    assert!(words.contains("\t.word\tbool_const0"));
    // Object slot and size word: 3 header words + 4 attributes.
    assert!(words.contains("\t.word\t7"));
}

#[test]
fn overriding_keeps_the_vtable_slot() {
    let mut p = TestProgram::new("vtab.cl");
    let body_a = p.int(1);
    let f_a = p.method("f", &[], "Int", body_a);
    let body_g = p.int(2);
    let g_a = p.method("g", &[], "Int", body_g);
    p.class("A", None, vec![f_a, g_a]);

    let body_b = p.int(3);
    let f_b = p.method("f", &[], "Int", body_b);
    p.class("B", Some("A"), vec![f_b]);
    p.default_main();
    let image = compile_ok(&p.finish());

    let a_tab = image.find("A_dispTab:").expect("A_dispTab");
    let b_tab = image.find("B_dispTab:").expect("B_dispTab");
    let a_words: Vec<&str> = image[a_tab..].lines().skip(1).take(6).collect();
    let b_words: Vec<&str> = image[b_tab..].lines().skip(1).take(6).collect();

    let a_f = a_words.iter().position(|l| l.ends_with("A.f"));
    let b_f = b_words.iter().position(|l| l.ends_with("B.f"));
    assert_eq!(a_f, b_f, "override must reuse the inherited slot");
    assert!(b_words.iter().any(|l| l.ends_with("A.g")));
}

#[test]
fn case_arms_test_tag_ranges_most_specific_first() {
    let mut p = TestProgram::new("case.cl");
    p.class("A", None, vec![]);
    p.class("B", Some("A"), vec![]);

    let scrutinee = p.new_of("B");
    let arm_a = p.int(1);
    let arm_b = p.int(2);
    let case = p.case_of(scrutinee, vec![("a", "A", arm_a), ("b", "B", arm_b)]);
    let main = p.method("main", &[], "Int", case);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("\tjal\t_case_abort\n"));
    assert!(image.contains("\tjal\t_case_abort2"));
    assert!(image.contains("\tlw\t$t1 0($a0)"));

    // B's range check must come before A's: B has the deeper (larger) tag.
    let first_blt = image.find("\tblt\t$t1 ").expect("range tests");
    let tail = &image[first_blt..];
    let first: u32 = tail
        .split_whitespace()
        .nth(2)
        .and_then(|t| t.parse().ok())
        .expect("tag literal");
    let second_blt = tail[1..].find("\tblt\t$t1 ").expect("second range test") + 1;
    let second: u32 = tail[second_blt..]
        .split_whitespace()
        .nth(2)
        .and_then(|t| t.parse().ok())
        .expect("tag literal");
    assert!(first > second, "expected descending tags, got {first} then {second}");
}

#[test]
fn let_without_initializer_uses_the_type_default() {
    let mut p = TestProgram::new("let.cl");
    let body = p.id("x");
    let let_expr = p.let_in("x", "Int", None, body);
    let main = p.method("main", &[], "Int", let_expr);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("\tla\t$a0 int_const0"));
    // The binding occupies the first local slot below the frame pointer.
    assert!(image.contains("\tsw\t$a0 -4($fp)"));
    assert!(image.contains("\tlw\t$a0 -4($fp)"));
    // The frame reserves one word for it.
    let main_at = image.find("Main.main:").expect("Main.main");
    assert!(image[main_at..].contains("\taddiu\t$sp $sp -4"));
}

#[test]
fn formals_are_addressed_above_the_frame() {
    let mut p = TestProgram::new("formals.cl");
    let body = p.id("b");
    let f = p.method("f", &[("a", "Int"), ("b", "Int")], "Int", body);
    p.class("A", None, vec![f]);
    p.default_main();
    let image = compile_ok(&p.finish());

    let f_at = image.find("A.f:").expect("A.f");
    let f_body = &image[f_at..(f_at + 500).min(image.len())];
    // Second formal: (1 + 3 header slots) * 4 bytes off $fp. The routine
    // epilogue pops the frame plus both formals.
    assert!(f_body.contains("\tlw\t$a0 16($fp)"));
    assert!(f_body.contains("\taddiu\t$sp $sp 20"));
}

#[test]
fn while_loops_yield_void() {
    let mut p = TestProgram::new("loop.cl");
    let cond = p.expr(ExprKind::Bool(false));
    let body = p.int(0);
    let w = p.expr(ExprKind::While { cond, body });
    let main = p.method("main", &[], "Object", w);
    p.class("Main", None, vec![main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("while_cond0:"));
    assert!(image.contains("\tmove\t$a0 $zero"));
}

#[test]
fn new_self_type_indexes_the_class_object_table() {
    let mut p = TestProgram::new("st.cl");
    let body = p.expr(ExprKind::New(TypeName::new("SELF_TYPE", Span::default())));
    let make = p.method("make", &[], "SELF_TYPE", body);
    let call = p.dispatch(None, "make", vec![]);
    let as_obj = p.expr(ExprKind::Block(vec![call]));
    let main = p.method("main", &[], "Object", as_obj);
    p.class("Main", None, vec![make, main]);
    let image = compile_ok(&p.finish());

    assert!(image.contains("\tla\t$t1 class_objTab"));
    assert!(image.contains("\tsll\t$t2 $t2 3"));
}

#[test]
fn class_name_table_follows_tag_order() {
    let mut p = TestProgram::new("tags.cl");
    p.class("A", None, vec![]);
    p.class("B", Some("A"), vec![]);
    p.default_main();
    let image = compile_ok(&p.finish());

    // Object holds tag 0, so its name constant is the first table entry
    // and every class contributes exactly one entry.
    let tab = image.find("class_nameTab:").expect("name table");
    let entries: Vec<&str> = image[tab..]
        .lines()
        .skip(1)
        .take_while(|l| l.starts_with("\t.word\tstr_const"))
        .collect();
    assert_eq!(entries.len(), 8, "5 built-ins plus A, B, Main");

    let object_name = image
        .find("\t.ascii\t\"Object\"")
        .expect("Object name constant");
    let preceding = image[..object_name].rfind("str_const").expect("label");
    let label = &image[preceding..image[preceding..].find(':').unwrap() + preceding];
    assert_eq!(entries[0], format!("\t.word\t{label}"));
}
