use crate::cil::{InstructionId, VariableId};

/// Lexical scope of local variables, as recorded in debug information
///
/// Scopes nest. The end is exclusive, and missing when the scope runs to the end of the body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub start: Option<InstructionId>,
    pub end: Option<InstructionId>,
    pub variables: Vec<VariableId>,
    pub scopes: Vec<Scope>,
}

impl Scope {
    pub fn new(start: Option<InstructionId>, end: Option<InstructionId>) -> Scope {
        Scope {
            start,
            end,
            variables: vec![],
            scopes: vec![],
        }
    }

    /// Visit this scope and every nested scope, outermost first
    pub fn walk(&self) -> Vec<&Scope> {
        let mut scopes = vec![self];
        let mut next = 0;
        while next < scopes.len() {
            let scope: &Scope = scopes[next];
            scopes.extend(scope.scopes.iter());
            next += 1;
        }
        scopes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn walk_is_breadth_first() {
        let mut inner = Scope::new(Some(InstructionId(1)), Some(InstructionId(2)));
        inner.variables.push(VariableId(1));
        let mut outer = Scope::new(Some(InstructionId(0)), None);
        outer.variables.push(VariableId(0));
        outer.scopes.push(inner.clone());
        outer.scopes.push(Scope::default());

        let walked = outer.walk();
        assert_eq!(walked.len(), 3);
        assert_eq!(walked[1], &inner);
        assert_eq!(walked[2].start, None);
    }
}
