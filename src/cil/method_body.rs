use crate::cil::{
    Boundary, Editor, Error, ExceptionHandler, InstructionId, InstructionSequence, Scope,
    VariableSlots,
};
use crate::metadata::{MetadataToken, MethodId, ParameterAttributes, ParameterData};
use crate::util::Offset;
use std::cell::OnceCell;

/// Output of a [`BodyEncoder`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedBody {
    /// Instruction stream
    pub method_code: Vec<u8>,

    /// Exception handling section
    pub exception_code: Vec<u8>,

    /// Local variable signature blob
    pub local_vars_code: Vec<u8>,

    /// Method signature blob
    pub method_signature: Vec<u8>,

    /// Maximum evaluation stack depth, if the encoder computed one
    pub max_stack_size: Option<u16>,

    /// Size of the instruction stream, in bytes
    pub code_size: usize,
}

/// Turns a method body into bytes
///
/// Encoders are free to adjust the body before encoding (eg. widening short branches that do not
/// reach), as long as they recompute offsets afterwards.
pub trait BodyEncoder<'g> {
    fn encode(&mut self, body: &mut MethodBody<'g>) -> Result<EncodedBody, Error>;
}

/// Code of a method along with everything needed to encode it
pub struct MethodBody<'g> {
    method: MethodId<'g>,
    this_parameter: OnceCell<ParameterData<'g>>,

    /// Keep `max_stack_size` as it is when computing the header
    pub preserve_max_stack_size: bool,

    /// Maximum evaluation stack depth
    pub max_stack_size: u16,

    /// Zero-initialize locals on entry
    pub init_locals: bool,

    /// `StandAloneSig` token of the local variable signature
    pub local_var_token: MetadataToken,

    /// Debug scope of the local variables
    pub scope: Option<Scope>,

    code_size: usize,
    instructions: InstructionSequence,
    variables: VariableSlots<'g>,
    exception_handlers: Vec<ExceptionHandler<'g>>,

    method_code: Vec<u8>,
    exception_code: Vec<u8>,
    local_vars_code: Vec<u8>,
    method_signature: Vec<u8>,
}

impl<'g> MethodBody<'g> {
    /// Empty body for a method
    pub fn new(method: MethodId<'g>) -> MethodBody<'g> {
        MethodBody {
            method,
            this_parameter: OnceCell::new(),
            preserve_max_stack_size: false,
            max_stack_size: 0,
            init_locals: false,
            local_var_token: MetadataToken::ZERO,
            scope: None,
            code_size: 0,
            instructions: InstructionSequence::new(),
            variables: VariableSlots::new(),
            exception_handlers: vec![],
            method_code: vec![],
            exception_code: vec![],
            local_vars_code: vec![],
            method_signature: vec![],
        }
    }

    /// Method owning this body
    pub fn method(&self) -> MethodId<'g> {
        self.method
    }

    /// Code size as of the last call to `compute_offsets` or `compute_header`
    pub fn code_size(&self) -> usize {
        self.code_size
    }

    pub fn instructions(&self) -> &InstructionSequence {
        &self.instructions
    }

    pub fn instructions_mut(&mut self) -> &mut InstructionSequence {
        &mut self.instructions
    }

    /// Handle-oriented editor over the instructions
    pub fn editor(&mut self) -> Editor<'_> {
        Editor::new(&mut self.instructions)
    }

    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn variables(&self) -> &VariableSlots<'g> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableSlots<'g> {
        &mut self.variables
    }

    pub fn has_exception_handlers(&self) -> bool {
        !self.exception_handlers.is_empty()
    }

    pub fn exception_handlers(&self) -> &[ExceptionHandler<'g>] {
        &self.exception_handlers
    }

    pub fn exception_handlers_mut(&mut self) -> &mut Vec<ExceptionHandler<'g>> {
        &mut self.exception_handlers
    }

    pub fn add_exception_handler(&mut self, handler: ExceptionHandler<'g>) {
        self.exception_handlers.push(handler);
    }

    /// Handler boundaries that are not in the instruction sequence, as
    /// `(handler position, boundary, instruction)`
    pub fn dangling_handler_boundaries(&self) -> Vec<(usize, Boundary, InstructionId)> {
        self.exception_handlers
            .iter()
            .enumerate()
            .flat_map(|(position, handler)| {
                handler
                    .dangling_boundaries(&self.instructions)
                    .into_iter()
                    .map(move |(boundary, id)| (position, boundary, id))
            })
            .collect()
    }

    /// Implicit first argument of an instance method
    ///
    /// The parameter is created on first request and then reused. It is typed after the
    /// declaring type of the method, and passed by reference when that is a value type.
    pub fn this_parameter(&self) -> Result<&ParameterData<'g>, Error> {
        let declaring_type = self.method.declaring_type.ok_or(Error::NoDeclaringType)?;
        Ok(self.this_parameter.get_or_init(|| ParameterData {
            name: String::from("this"),
            sequence: 0,
            attributes: ParameterAttributes::empty(),
            parameter_type: declaring_type,
            is_by_ref: declaring_type.is_value_type,
        }))
    }

    /// Recompute instruction offsets and record the resulting code size
    ///
    /// Returns `None` (and leaves the code size alone) while recomputes are suppressed.
    pub fn compute_offsets(&mut self) -> Option<Offset> {
        let code_size = self.instructions.recompute()?;
        self.code_size = code_size.0;
        Some(code_size)
    }

    /// Encode the body, keeping the encoded sections around
    pub fn compute_header<E: BodyEncoder<'g>>(&mut self, encoder: &mut E) -> Result<(), Error> {
        let encoded = encoder.encode(self)?;
        log::debug!(
            "encoded {:?}: {} bytes of code, {} bytes of handlers",
            self.method,
            encoded.code_size,
            encoded.exception_code.len()
        );

        self.code_size = encoded.code_size;
        if !self.preserve_max_stack_size {
            if let Some(max_stack_size) = encoded.max_stack_size {
                self.max_stack_size = max_stack_size;
            }
        }
        self.method_code = encoded.method_code;
        self.exception_code = encoded.exception_code;
        self.local_vars_code = encoded.local_vars_code;
        self.method_signature = encoded.method_signature;
        Ok(())
    }

    pub fn method_code(&self) -> &[u8] {
        &self.method_code
    }

    pub fn exception_code(&self) -> &[u8] {
        &self.exception_code
    }

    pub fn local_vars_code(&self) -> &[u8] {
        &self.local_vars_code
    }

    pub fn method_signature(&self) -> &[u8] {
        &self.method_signature
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::opcodes::*;
    use crate::cil::{HandlerKind, Operand};
    use crate::metadata::{MethodAttributes, MethodData, TypeData, TypeGraph, TypeGraphArenas};

    /// Encoder that only reports sizes
    struct SizingEncoder {
        max_stack_size: Option<u16>,
    }

    impl<'g> BodyEncoder<'g> for SizingEncoder {
        fn encode(&mut self, body: &mut MethodBody<'g>) -> Result<EncodedBody, Error> {
            let code_size = body.compute_offsets().map_or(0, |size| size.0);
            Ok(EncodedBody {
                method_code: vec![0; code_size],
                max_stack_size: self.max_stack_size,
                code_size,
                ..EncodedBody::default()
            })
        }
    }

    #[test]
    fn fresh_body_defaults() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(
            Some(core.string),
            "Trim",
            MethodAttributes::PUBLIC,
        ));

        let body = MethodBody::new(method);
        assert!(std::ptr::eq(body.method(), method));
        assert_eq!(body.max_stack_size, 0);
        assert_eq!(body.code_size(), 0);
        assert!(!body.preserve_max_stack_size);
        assert!(!body.init_locals);
        assert!(body.local_var_token.is_zero());
        assert!(!body.has_variables());
        assert!(!body.has_exception_handlers());
        assert!(body.instructions().is_empty());
        assert!(body.scope.is_none());
    }

    #[test]
    fn this_parameter_is_created_once() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(
            Some(core.string),
            "Trim",
            MethodAttributes::PUBLIC,
        ));

        let body = MethodBody::new(method);
        let first = body.this_parameter().unwrap();
        let second = body.this_parameter().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.sequence, 0);
        assert_eq!(first.attributes, ParameterAttributes::empty());
        assert!(std::ptr::eq(first.parameter_type, core.string));
        assert!(!first.is_by_ref);
    }

    #[test]
    fn this_parameter_of_value_type_is_by_ref() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(
            Some(core.int32),
            "CompareTo",
            MethodAttributes::PUBLIC,
        ));

        let body = MethodBody::new(method);
        assert!(body.this_parameter().unwrap().is_by_ref);
    }

    #[test]
    fn this_parameter_needs_declaring_type() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Floating", MethodAttributes::STATIC));

        let body = MethodBody::new(method);
        assert!(matches!(body.this_parameter(), Err(Error::NoDeclaringType)));
    }

    #[test]
    fn header_follows_encoder() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let program = graph.add_type(TypeData::new("", "Program", None));
        let method = graph.add_method(MethodData::new(
            Some(program),
            "Main",
            MethodAttributes::STATIC,
        ));

        let mut body = MethodBody::new(method);
        {
            let mut editor = body.editor();
            editor.emit(LDC_I4, Operand::Int32(42)).unwrap();
            editor.emit(POP, Operand::None).unwrap();
            editor.emit(RET, Operand::None).unwrap();
        }
        assert_eq!(body.compute_offsets(), Some(Offset(7)));
        assert_eq!(body.code_size(), 7);

        body.compute_header(&mut SizingEncoder {
            max_stack_size: Some(1),
        })
        .unwrap();
        assert_eq!(body.max_stack_size, 1);
        assert_eq!(body.method_code().len(), 7);

        body.max_stack_size = 8;
        body.preserve_max_stack_size = true;
        body.compute_header(&mut SizingEncoder {
            max_stack_size: Some(1),
        })
        .unwrap();
        assert_eq!(body.max_stack_size, 8);

        body.preserve_max_stack_size = false;
        body.compute_header(&mut SizingEncoder {
            max_stack_size: None,
        })
        .unwrap();
        assert_eq!(body.max_stack_size, 8);
    }

    #[test]
    fn suppressed_offsets_leave_code_size() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let method = graph.add_method(MethodData::new(None, "Main", MethodAttributes::STATIC));

        let mut body = MethodBody::new(method);
        body.editor().emit(RET, Operand::None).unwrap();
        body.instructions_mut().set_recompute_suppressed(true);
        assert_eq!(body.compute_offsets(), None);
        assert_eq!(body.code_size(), 0);
    }

    #[test]
    fn handler_boundaries_can_dangle() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(None, "Guarded", MethodAttributes::STATIC));

        let mut body = MethodBody::new(method);
        let (start, leave, handler, end) = {
            let mut editor = body.editor();
            let start = editor.emit(NOP, Operand::None).unwrap();
            let end = editor.create(RET, Operand::None).unwrap();
            let leave = editor.emit(LEAVE_S, Operand::Target(end)).unwrap();
            let handler = editor.emit(POP, Operand::None).unwrap();
            editor.emit(LEAVE_S, Operand::Target(end)).unwrap();
            editor.append(end).unwrap();
            (start, leave, handler, end)
        };
        body.add_exception_handler(ExceptionHandler::new(
            HandlerKind::Catch(core.exception),
            start,
            Some(handler),
            handler,
            Some(end),
        ));
        assert!(body.has_exception_handlers());
        assert!(body.dangling_handler_boundaries().is_empty());

        body.editor().remove(start).unwrap();
        assert_eq!(
            body.dangling_handler_boundaries(),
            vec![(0, Boundary::TryStart, start)]
        );
        assert!(body.instructions().contains(leave));
    }
}
