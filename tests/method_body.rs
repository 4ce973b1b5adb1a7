use ilbody::cil::opcodes::*;
use ilbody::cil::{
    Boundary, Error, ExceptionHandler, HandlerKind, InstructionId, MethodBody, Operand,
    VariableSlot,
};
use ilbody::listing::{parse_listing, SimpleEncoder};
use ilbody::metadata::{MethodAttributes, MethodData, TypeData, TypeGraph, TypeGraphArenas};
use ilbody::util::Offset;

fn offsets(body: &MethodBody<'_>) -> Vec<Offset> {
    body.instructions()
        .iter()
        .map(|(_, insn)| insn.offset())
        .collect()
}

#[test]
fn edit_then_recompute() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let core = graph.insert_core_types();
    let counter = graph.add_type(TypeData::new("Acme", "Counter", Some(core.object)));
    let method = graph.add_method(MethodData::new(
        Some(counter),
        "Tick",
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
    ));
    let mut body = MethodBody::new(method);

    // A, B, C with sizes 1, 2, 1
    let (a, b, c) = {
        let mut editor = body.editor();
        let a = editor.emit(NOP, Operand::None).unwrap();
        let b = editor.emit(LDC_I4_S, Operand::Int8(3)).unwrap();
        let c = editor.emit(RET, Operand::None).unwrap();
        (a, b, c)
    };
    body.compute_offsets();
    assert_eq!(offsets(&body), vec![Offset(0), Offset(1), Offset(3)]);

    body.editor().remove(b).unwrap();
    body.compute_offsets();
    assert_eq!(offsets(&body), vec![Offset(0), Offset(1)]);
    let instructions = body.instructions();
    assert_eq!(instructions[a].next(), Some(c));
    assert_eq!(instructions[c].previous(), Some(a));
    assert_eq!(instructions[c].index(), 1);
    assert_eq!(body.code_size(), 2);

    // A branch to A shows up in the branch references until it is removed
    let d = body.editor().create(BR_S, Operand::Target(a)).unwrap();
    body.editor().insert_before(c, d).unwrap();
    assert_eq!(
        body.instructions().branch_references().collect::<Vec<_>>(),
        vec![d]
    );
    body.editor().remove(d).unwrap();
    assert_eq!(body.instructions().branch_references().count(), 0);

    let this = body.this_parameter().unwrap();
    assert!(std::ptr::eq(this.parameter_type, counter));
    assert!(std::ptr::eq(this, body.this_parameter().unwrap()));
}

#[test]
fn bulk_loading_a_decoded_body() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let method = graph.add_method(MethodData::new(None, "Decoded", MethodAttributes::STATIC));
    let mut body = MethodBody::new(method);

    {
        let mut loading = body.instructions_mut().bulk_load();
        let targets: Vec<InstructionId> = (0..4)
            .map(|_| loading.create(NOP, Operand::None).unwrap())
            .collect();
        let table = loading
            .create(SWITCH, Operand::Switch(targets.clone()))
            .unwrap();
        loading.append(table).unwrap();
        for target in targets {
            loading.append(target).unwrap();
        }
        assert_eq!(loading.recompute(), None);
    }
    assert_eq!(body.compute_offsets(), Some(Offset(25)));
    assert_eq!(offsets(&body)[1], Offset(21));
    assert!(matches!(body.this_parameter(), Err(Error::NoDeclaringType)));
}

#[test]
fn variables_renumber_eagerly() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let core = graph.insert_core_types();
    let method = graph.add_method(MethodData::new(None, "Locals", MethodAttributes::STATIC));
    let mut body = MethodBody::new(method);

    let variables = body.variables_mut();
    let x = variables.create(core.int32);
    let y = variables.create(core.string);
    let z = variables.create(core.double);
    variables.append(y).unwrap();
    variables.append(z).unwrap();
    variables.insert(0, x).unwrap();
    variables.remove(0).unwrap();

    assert_eq!(body.variables()[y].index(), Some(0));
    assert_eq!(body.variables()[z].index(), Some(1));
    assert_eq!(body.variables()[x].raw_index(), VariableSlot::DETACHED_INDEX);
    assert!(body.has_variables());
}

#[test]
fn removing_handler_boundaries() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let core = graph.insert_core_types();
    let method = graph.add_method(MethodData::new(None, "Guarded", MethodAttributes::STATIC));
    let mut body = MethodBody::new(method);

    let (start, handler, done) = {
        let mut editor = body.editor();
        let done = editor.create(RET, Operand::None).unwrap();
        let start = editor.emit(NOP, Operand::None).unwrap();
        editor.emit(LEAVE_S, Operand::Target(done)).unwrap();
        let handler = editor.emit(POP, Operand::None).unwrap();
        editor.emit(LEAVE_S, Operand::Target(done)).unwrap();
        editor.append(done).unwrap();
        (start, handler, done)
    };
    body.add_exception_handler(ExceptionHandler::new(
        HandlerKind::Catch(core.exception),
        start,
        Some(handler),
        handler,
        Some(done),
    ));

    body.editor().remove(handler).unwrap();
    assert_eq!(
        body.dangling_handler_boundaries(),
        vec![
            (0, Boundary::TryEnd, handler),
            (0, Boundary::HandlerStart, handler)
        ]
    );
    assert!(matches!(
        body.compute_header(&mut SimpleEncoder::new()),
        Err(Error::DanglingReference(id)) if id == handler
    ));
}

#[test]
fn listing_to_bytes() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let method = graph.add_method(MethodData::new(None, "Max", MethodAttributes::STATIC));
    let source = "
        ldarg.0
        ldarg.1
        bgt.s first
        ldarg.1
        ret
    first:
        ldarg.0
        ret
    ";
    assert!(parse_listing(source, &graph, method).is_err());

    let source = "
                ldarg.0
                ldarg.1
                bgt.s first
                ldarg.1
                ret
        first:  ldarg.0
                ret
    ";
    let mut listing = parse_listing(source, &graph, method).unwrap();
    listing
        .body
        .compute_header(&mut SimpleEncoder::new())
        .unwrap();
    assert_eq!(
        listing.body.method_code(),
        &[0x02, 0x03, 0x30, 0x02, 0x03, 0x2a, 0x02, 0x2a]
    );
    assert_eq!(listing.body.max_stack_size, 0);
}
