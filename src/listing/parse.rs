use super::{Listing, ListingError};
use crate::cil::opcodes::NOP;
use crate::cil::{
    ExceptionHandler, HandlerKind, InstructionId, MethodBody, OpCode, Operand, OperandType,
    VariableId,
};
use crate::metadata::{MetadataToken, MethodId, TypeData, TypeGraph, TypeId};
use std::collections::HashMap;
use std::str::FromStr;

enum Line<'s> {
    Locals(Vec<&'s str>),
    Try(TryLine<'s>),
    Instruction {
        label: Option<&'s str>,
        mnemonic: &'s str,
        operand: &'s str,
    },
}

struct TryLine<'s> {
    try_start: &'s str,
    try_end: &'s str,
    kind: &'s str,
    argument: Option<&'s str>,
    handler_start: &'s str,
    handler_end: &'s str,
}

/// Read a listing into a fresh body for `method`
///
/// Types named in the listing are looked up in (or added to) `graph`. Instructions are appended
/// under a bulk load, so offsets are computed once, at the end.
pub fn parse_listing<'g>(
    source: &str,
    graph: &'g TypeGraph<'g>,
    method: MethodId<'g>,
) -> Result<Listing<'g>, ListingError> {
    let mut lines = vec![];
    for (number, text) in source.lines().enumerate() {
        let text = strip_comment(text).trim();
        if !text.is_empty() {
            lines.push((number + 1, split_line(number + 1, text)?));
        }
    }

    graph.insert_core_types();
    let mut body = MethodBody::new(method);

    let mut locals: Vec<VariableId> = vec![];
    for (_, line) in &lines {
        if let Line::Locals(types) = line {
            for type_name in types {
                let variable_type = resolve_type(graph, type_name);
                let variables = body.variables_mut();
                let id = variables.create(variable_type);
                variables.append(id)?;
                locals.push(id);
            }
        }
    }

    // Allocate every instruction first, so that branches can refer forward
    let mut labels: Vec<(String, InstructionId)> = vec![];
    let mut pending = vec![];
    for (number, line) in &lines {
        if let Line::Instruction {
            label,
            mnemonic,
            operand,
        } = line
        {
            let id = body.instructions_mut().create(NOP, Operand::None)?;
            if let Some(label) = label {
                if labels.iter().any(|(existing, _)| existing.as_str() == *label) {
                    return Err(ListingError::DuplicateLabel {
                        line: *number,
                        label: label.to_string(),
                    });
                }
                labels.push((label.to_string(), id));
            }
            pending.push((*number, id, *mnemonic, *operand));
        }
    }
    let label_ids: HashMap<&str, InstructionId> = labels
        .iter()
        .map(|(label, id)| (label.as_str(), *id))
        .collect();

    {
        let mut loading = body.instructions_mut().bulk_load();
        for (number, id, mnemonic, operand) in pending {
            let opcode = OpCode::from_name(&mnemonic.to_ascii_lowercase()).ok_or_else(|| {
                ListingError::syntax(number, format!("unknown instruction '{}'", mnemonic))
            })?;
            let operand = parse_operand(number, opcode, operand, &label_ids, &locals)?;
            loading.rewrite(id, opcode, operand)?;
            loading.append(id)?;
        }
    }

    for (number, line) in &lines {
        if let Line::Try(handler) = line {
            let handler = build_handler(*number, handler, graph, &label_ids)?;
            body.add_exception_handler(handler);
        }
    }

    body.compute_offsets();
    log::debug!(
        "Parsed {} instructions ({} bytes), {} locals, {} handlers",
        body.instructions().len(),
        body.code_size(),
        locals.len(),
        body.exception_handlers().len()
    );

    Ok(Listing { body, labels })
}

/// Drop a trailing `//` comment, unless the `//` is inside a string literal
fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (at, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '/' if !in_string && text[at..].starts_with("//") => return &text[..at],
            _ => (),
        }
    }
    text
}

fn split_line(number: usize, text: &str) -> Result<Line<'_>, ListingError> {
    if let Some(rest) = text.strip_prefix(".locals") {
        let types = rest
            .split(',')
            .map(str::trim)
            .filter(|type_name| !type_name.is_empty())
            .collect();
        return Ok(Line::Locals(types));
    }
    if let Some(rest) = text.strip_prefix(".try") {
        return split_try(number, rest).map(Line::Try);
    }
    if text.starts_with('.') {
        return Err(ListingError::syntax(number, "unknown directive"));
    }

    let (label, rest) = match text.split_once(':') {
        Some((label, rest)) if is_label(label.trim()) => (Some(label.trim()), rest.trim()),
        _ => (None, text),
    };
    let (mnemonic, operand) = match rest.split_once(char::is_whitespace) {
        Some((mnemonic, operand)) => (mnemonic, operand.trim()),
        None => (rest, ""),
    };
    if mnemonic.is_empty() {
        return Err(ListingError::syntax(number, "label without an instruction"));
    }

    Ok(Line::Instruction {
        label,
        mnemonic,
        operand,
    })
}

fn split_try(number: usize, text: &str) -> Result<TryLine<'_>, ListingError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    match words.as_slice() {
        [
            try_start,
            "to",
            try_end,
            kind @ ("catch" | "filter"),
            argument,
            "handler",
            handler_start,
            "to",
            handler_end,
        ] => Ok(TryLine {
            try_start: *try_start,
            try_end: *try_end,
            kind: *kind,
            argument: Some(*argument),
            handler_start: *handler_start,
            handler_end: *handler_end,
        }),
        [
            try_start,
            "to",
            try_end,
            kind @ ("finally" | "fault"),
            "handler",
            handler_start,
            "to",
            handler_end,
        ] => Ok(TryLine {
            try_start: *try_start,
            try_end: *try_end,
            kind: *kind,
            argument: None,
            handler_start: *handler_start,
            handler_end: *handler_end,
        }),
        _ => Err(ListingError::syntax(
            number,
            "expected '.try <start> to <end> <kind> handler <start> to <end>'",
        )),
    }
}

fn is_label(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Find or add a type by IL alias or full name
fn resolve_type<'g>(graph: &'g TypeGraph<'g>, name: &str) -> TypeId<'g> {
    let full_name = match name {
        "bool" => "System.Boolean",
        "int32" => "System.Int32",
        "int64" => "System.Int64",
        "float64" => "System.Double",
        "string" => "System.String",
        "object" => "System.Object",
        other => other,
    };
    if let Some(existing) = graph.lookup_type(full_name) {
        return existing;
    }
    let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
    let base_type = graph.lookup_type("System.Object");
    graph.add_type(TypeData::new(namespace, name, base_type))
}

fn lookup_label(
    labels: &HashMap<&str, InstructionId>,
    name: &str,
) -> Result<InstructionId, ListingError> {
    labels
        .get(name)
        .copied()
        .ok_or_else(|| ListingError::UnknownLabel(name.to_owned()))
}

fn parse_number<T: FromStr>(number: usize, text: &str) -> Result<T, ListingError> {
    text.parse()
        .map_err(|_| ListingError::syntax(number, format!("invalid number '{}'", text)))
}

fn parse_operand(
    number: usize,
    opcode: OpCode,
    text: &str,
    labels: &HashMap<&str, InstructionId>,
    locals: &[VariableId],
) -> Result<Operand, ListingError> {
    let operand = match opcode.operand_type {
        OperandType::InlineNone => {
            if !text.is_empty() {
                return Err(ListingError::syntax(
                    number,
                    format!("'{}' takes no operand", opcode),
                ));
            }
            Operand::None
        }
        OperandType::InlineBrTarget | OperandType::ShortInlineBrTarget => {
            Operand::Target(lookup_label(labels, text)?)
        }
        OperandType::InlineSwitch => {
            let targets = text
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split(',')
                .map(str::trim)
                .filter(|target| !target.is_empty())
                .map(|target| lookup_label(labels, target))
                .collect::<Result<Vec<_>, _>>()?;
            Operand::Switch(targets)
        }
        OperandType::ShortInlineI => Operand::Int8(parse_number(number, text)?),
        OperandType::InlineI => Operand::Int32(parse_number(number, text)?),
        OperandType::InlineI8 => Operand::Int64(parse_number(number, text)?),
        OperandType::ShortInlineR => Operand::Float32(parse_number(number, text)?),
        OperandType::InlineR => Operand::Float64(parse_number(number, text)?),
        OperandType::InlineString => {
            let string = text
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .ok_or_else(|| ListingError::syntax(number, "expected a quoted string"))?;
            Operand::String(string.replace("\\\"", "\""))
        }
        OperandType::InlineField
        | OperandType::InlineMethod
        | OperandType::InlineType
        | OperandType::InlineTok
        | OperandType::InlineSig => {
            let token = match text.strip_prefix("0x") {
                Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| {
                    ListingError::syntax(number, format!("invalid token '{}'", text))
                })?,
                None => parse_number(number, text)?,
            };
            Operand::Token(MetadataToken(token))
        }
        OperandType::InlineVar | OperandType::ShortInlineVar => {
            let index: usize = parse_number(number, text.trim_start_matches("V_"))?;
            let local = locals.get(index).copied().ok_or_else(|| {
                ListingError::syntax(number, format!("there is no local {}", index))
            })?;
            Operand::Variable(local)
        }
        OperandType::InlineArg | OperandType::ShortInlineArg => {
            Operand::Argument(parse_number(number, text)?)
        }
    };
    Ok(operand)
}

fn build_handler<'g>(
    number: usize,
    handler: &TryLine<'_>,
    graph: &'g TypeGraph<'g>,
    labels: &HashMap<&str, InstructionId>,
) -> Result<ExceptionHandler<'g>, ListingError> {
    let region_end = |name: &str| -> Result<Option<InstructionId>, ListingError> {
        if name == "end" {
            Ok(None)
        } else {
            lookup_label(labels, name).map(Some)
        }
    };

    let kind = match (handler.kind, handler.argument) {
        ("catch", Some(catch_type)) => HandlerKind::Catch(resolve_type(graph, catch_type)),
        ("filter", Some(filter_start)) => HandlerKind::Filter(lookup_label(labels, filter_start)?),
        ("finally", None) => HandlerKind::Finally,
        ("fault", None) => HandlerKind::Fault,
        _ => return Err(ListingError::syntax(number, "unknown handler kind")),
    };

    Ok(ExceptionHandler::new(
        kind,
        lookup_label(labels, handler.try_start)?,
        region_end(handler.try_end)?,
        lookup_label(labels, handler.handler_start)?,
        region_end(handler.handler_end)?,
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::opcodes::*;
    use crate::cil::Boundary;
    use crate::metadata::{MethodAttributes, MethodData, TypeGraphArenas};
    use crate::util::Offset;

    const COUNTDOWN: &str = "
        .locals int32
        // count down from ten
                ldc.i4.s 10
                stloc.s V_0
        loop:   ldloc.s V_0
                brfalse.s done
                ldloc.s V_0
                ldc.i4.1
                sub
                stloc.s V_0
                br.s loop
        done:   ret
    ";

    #[test]
    fn countdown() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Countdown", MethodAttributes::STATIC));

        let listing = parse_listing(COUNTDOWN, &graph, method).unwrap();
        let instructions = listing.body.instructions();
        assert_eq!(instructions.len(), 10);
        assert_eq!(listing.body.code_size(), 17);
        assert!(!instructions.is_recompute_suppressed());

        let looping = listing.label("loop").unwrap();
        let done = listing.label("done").unwrap();
        assert_eq!(instructions[looping].offset(), Offset(4));
        assert_eq!(instructions[done].offset(), Offset(16));
        assert_eq!(instructions[done].index(), 9);
        assert_eq!(listing.label_of(done), Some("done"));

        let branches: Vec<_> = instructions.branch_references().collect();
        assert_eq!(branches.len(), 2);
        assert_eq!(instructions[branches[0]].operand(), &Operand::Target(done));
        assert_eq!(instructions[branches[1]].opcode(), BR_S);

        let local = listing.body.variables().get(0).unwrap();
        assert_eq!(listing.body.variables()[local].variable_type.name, "Int32");
    }

    #[test]
    fn handlers_and_switches() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Dispatch", MethodAttributes::STATIC));
        let source = "
            .try start to handler catch Acme.Oops handler handler to done
            .try start to handler finally handler handler to end
            start:   ldarg.0
                     switch (a, b, done)
            a:       leave.s done
            b:       leave.s done
            handler: pop
                     leave.s done
            done:    ret
        ";

        let listing = parse_listing(source, &graph, method).unwrap();
        let handlers = listing.body.exception_handlers();
        assert_eq!(handlers.len(), 2);
        let oops = handlers[0].catch_type().unwrap();
        assert_eq!(oops.full_name(), "Acme.Oops");
        assert_eq!(graph.lookup_type("Acme.Oops"), Some(oops));
        assert_eq!(handlers[1].kind, HandlerKind::Finally);
        assert_eq!(handlers[1].handler_end, None);

        let start = listing.label("start").unwrap();
        let switch = listing.body.instructions()[start].next().unwrap();
        assert_eq!(listing.body.instructions()[switch].size(), 17);
        assert_eq!(listing.body.instructions().branch_references().count(), 4);
        assert!(listing.body.dangling_handler_boundaries().is_empty());
    }

    #[test]
    fn removing_a_label_can_leave_references_dangling() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Countdown", MethodAttributes::STATIC));

        let mut listing = parse_listing(COUNTDOWN, &graph, method).unwrap();
        let done = listing.remove("done").unwrap();
        assert_eq!(listing.body.code_size(), 16);
        let dangling = listing.body.instructions().dangling_targets();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].1, done);
        assert!(matches!(
            listing.remove("nowhere"),
            Err(ListingError::UnknownLabel(_))
        ));
    }

    #[test]
    fn handler_boundaries_follow_removal() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Guarded", MethodAttributes::STATIC));
        let source = "
            .try start to handler fault handler handler to end
            start:   nop
            handler: endfinally
        ";
        let mut listing = parse_listing(source, &graph, method).unwrap();
        let start = listing.remove("start").unwrap();
        assert_eq!(
            listing.body.dangling_handler_boundaries(),
            vec![(0, Boundary::TryStart, start)]
        );
    }

    #[test]
    fn syntax_errors() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Broken", MethodAttributes::STATIC));

        let cases = [
            ("frob 1", 1),
            ("nop\nldc.i4 lots", 2),
            ("ret 1", 1),
            (".frame 2", 1),
            ("ldstr unquoted", 1),
            ("stloc.s V_3", 1),
            (".try a to b catch handler c", 1),
        ];
        for (source, line) in cases {
            match parse_listing(source, &graph, method) {
                Err(ListingError::Syntax { line: at, .. }) => assert_eq!(at, line, "{}", source),
                _ => panic!("expected a syntax error for {:?}", source),
            }
        }

        assert!(matches!(
            parse_listing("a: nop\na: ret", &graph, method),
            Err(ListingError::DuplicateLabel { line: 2, .. })
        ));
        assert!(matches!(
            parse_listing("br.s nowhere", &graph, method),
            Err(ListingError::UnknownLabel(_))
        ));
    }

    #[test]
    fn operands() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Operands", MethodAttributes::STATIC));
        let source = "
            ldstr \"say \\\"hi\\\"\"
            ldstr \"http://example.com\" // a URL
            ldstr \"\\\"//\" // quote then slashes
            call 0x0a000012
            ldc.r8 2.5
            ldc.i8 -9
            starg.s 1
        ";
        let listing = parse_listing(source, &graph, method).unwrap();
        let operands: Vec<Operand> = listing
            .body
            .instructions()
            .iter()
            .map(|(_, insn)| insn.operand().clone())
            .collect();
        assert_eq!(
            operands,
            vec![
                Operand::String(String::from("say \"hi\"")),
                Operand::String(String::from("http://example.com")),
                Operand::String(String::from("\"//")),
                Operand::Token(MetadataToken(0x0a00_0012)),
                Operand::Float64(2.5),
                Operand::Int64(-9),
                Operand::Argument(1),
            ]
        );
    }
}
