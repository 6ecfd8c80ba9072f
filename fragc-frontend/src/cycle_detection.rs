//! Static recursion detection
//!
//! GPUs have no call stack, so any recursion must be rejected before a
//! single op is emitted. The detector runs a depth-first walk over the
//! syntax tree following every call, property access, constructor call and
//! member initializer. A pre-walk indexes the tree by semantic identity so
//! the walker can jump from a call site to the callee's body.

use crate::ast::{
    AccessedMember, ClassNode, ConstructorNode, Expression, ExpressionKind, FunctionNode, IoMode, MemberAccess,
    MemberVariableNode, Statement, StatementKind, SyntaxTree,
};
use fragc_common::{ErrorReporter, FunctionId, PropertyId, SourceLocation, TranslationError, TypeId, TypeSpec};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Identity of a node the walk can enter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    /// Functions, constructors, accessors and pre-constructors
    Function(FunctionId),
    /// Member variables (their initializers)
    Property(PropertyId),
}

/// One entry of the call-stack trace, linked to its caller
struct CallFrame<'a> {
    location: &'a SourceLocation,
    parent: Option<&'a CallFrame<'a>>,
}

impl CallFrame<'_> {
    /// Outermost frame first
    fn trace(&self) -> Vec<SourceLocation> {
        let mut trace = vec![self.location.clone()];
        let mut parent = self.parent;
        while let Some(frame) = parent {
            trace.push(frame.location.clone());
            parent = frame.parent;
        }
        trace.reverse();
        trace
    }
}

pub struct CycleDetector<'t> {
    classes: HashMap<TypeId, &'t ClassNode>,
    functions: HashMap<FunctionId, &'t FunctionNode>,
    constructors: HashMap<FunctionId, (&'t ConstructorNode, &'t ClassNode)>,
    variables: HashMap<PropertyId, &'t MemberVariableNode>,
    all_visited: HashSet<SymbolKey>,
    current_stack: HashSet<SymbolKey>,
    expansions: Vec<SymbolKey>,
}

impl<'t> CycleDetector<'t> {
    /// Indexes the tree by semantic identity
    pub fn new(tree: &'t SyntaxTree) -> Self {
        let mut detector = Self {
            classes: HashMap::new(),
            functions: HashMap::new(),
            constructors: HashMap::new(),
            variables: HashMap::new(),
            all_visited: HashSet::new(),
            current_stack: HashSet::new(),
            expansions: Vec::new(),
        };

        for class in &tree.classes {
            detector.classes.insert(class.type_id, class);
            for constructor in &class.constructors {
                detector.constructors.insert(constructor.function, (constructor, class));
            }
            for function in &class.functions {
                detector.functions.insert(function.function, function);
            }
            for variable in &class.variables {
                detector.variables.insert(variable.property, variable);
                for accessor in variable.get.iter().chain(variable.set.iter()) {
                    detector.functions.insert(accessor.function, accessor);
                }
            }
        }
        detector
    }

    /// Symbols whose bodies were walked, in walk order. A symbol appears at
    /// most once.
    pub fn expansions(&self) -> &[SymbolKey] {
        &self.expansions
    }

    /// Walks every class. Stops at the first cycle found.
    pub fn run(&mut self, tree: &'t SyntaxTree) -> Result<(), TranslationError> {
        for class in &tree.classes {
            self.walk_class(class)?;
        }
        Ok(())
    }

    fn walk_class(&mut self, class: &'t ClassNode) -> Result<(), TranslationError> {
        self.walk_pre_constructor(class, None)?;
        for constructor in &class.constructors {
            self.walk_constructor(constructor, class, None)?;
        }
        for function in &class.functions {
            self.walk_function(function, None)?;
        }
        for variable in &class.variables {
            for accessor in variable.get.iter().chain(variable.set.iter()) {
                self.walk_function(accessor, None)?;
            }
        }
        Ok(())
    }

    /// Returns false when `key` was already fully walked
    fn begin(&mut self, key: SymbolKey, frame: &CallFrame<'_>) -> Result<bool, TranslationError> {
        if self.current_stack.contains(&key) {
            let call_stack = frame.trace();
            debug!("cycle detected through {:?}, {} frames", key, call_stack.len());
            return Err(TranslationError::RecursionDetected {
                location: call_stack.first().cloned().unwrap_or_default(),
                call_stack,
            });
        }
        if self.all_visited.contains(&key) {
            return Ok(false);
        }
        self.all_visited.insert(key);
        self.current_stack.insert(key);
        self.expansions.push(key);
        Ok(true)
    }

    fn end(&mut self, key: SymbolKey) {
        self.current_stack.remove(&key);
    }

    fn walk_function(&mut self, function: &'t FunctionNode, parent: Option<&CallFrame<'_>>) -> Result<(), TranslationError> {
        let frame = CallFrame {
            location: &function.location,
            parent,
        };
        let key = SymbolKey::Function(function.function);
        if self.begin(key, &frame)? {
            self.walk_statements(&function.statements, &frame)?;
            self.end(key);
        }
        Ok(())
    }

    fn walk_constructor(
        &mut self,
        constructor: &'t ConstructorNode,
        class: &'t ClassNode,
        parent: Option<&CallFrame<'_>>,
    ) -> Result<(), TranslationError> {
        let frame = CallFrame {
            location: &constructor.location,
            parent,
        };
        let key = SymbolKey::Function(constructor.function);
        if self.begin(key, &frame)? {
            self.walk_pre_constructor(class, Some(&frame))?;
            self.walk_statements(&constructor.statements, &frame)?;
            self.end(key);
        }
        Ok(())
    }

    /// Walks the member initializers of `class`. A class without a
    /// pre-constructor id gets one synthesized, so its initializers are
    /// still walked, keyed by property alone.
    fn walk_pre_constructor(&mut self, class: &'t ClassNode, parent: Option<&CallFrame<'_>>) -> Result<(), TranslationError> {
        let frame = CallFrame {
            location: &class.location,
            parent,
        };
        let Some(pre_constructor) = class.pre_constructor else {
            return self.walk_initializers(class, &frame);
        };
        let key = SymbolKey::Function(pre_constructor);
        if self.begin(key, &frame)? {
            self.walk_initializers(class, &frame)?;
            self.end(key);
        }
        Ok(())
    }

    fn walk_initializers(&mut self, class: &'t ClassNode, frame: &CallFrame<'_>) -> Result<(), TranslationError> {
        for variable in &class.variables {
            self.walk_variable(variable, frame)?;
        }
        Ok(())
    }

    fn walk_variable(&mut self, variable: &'t MemberVariableNode, parent: &CallFrame<'_>) -> Result<(), TranslationError> {
        let frame = CallFrame {
            location: &variable.location,
            parent: Some(parent),
        };
        let key = SymbolKey::Property(variable.property);
        if self.begin(key, &frame)? {
            match (&variable.initial_value, &variable.ty) {
                (Some(initial_value), _) => self.walk_expression(initial_value, &frame)?,
                (None, TypeSpec::Class(id)) if variable.is_field() => {
                    if let Some(class) = self.classes.get(id).copied() {
                        self.walk_pre_constructor(class, Some(&frame))?;
                    }
                }
                (None, _) => {}
            }
            self.end(key);
        }
        Ok(())
    }

    fn walk_statements(&mut self, statements: &'t [Statement], frame: &CallFrame<'_>) -> Result<(), TranslationError> {
        for statement in statements {
            self.walk_statement(statement, frame)?;
        }
        Ok(())
    }

    fn walk_statement(&mut self, statement: &'t Statement, frame: &CallFrame<'_>) -> Result<(), TranslationError> {
        match &statement.kind {
            StatementKind::Expression(expression) => self.walk_expression(expression, frame),
            StatementKind::LocalVariable { initial_value, .. } => match initial_value {
                Some(value) => self.walk_expression(value, frame),
                None => Ok(()),
            },
            StatementKind::Assign { target, value, .. } => {
                self.walk_expression(value, frame)?;
                self.walk_expression(target, frame)
            }
            StatementKind::Return(value) => match value {
                Some(value) => self.walk_expression(value, frame),
                None => Ok(()),
            },
            StatementKind::If { parts } => {
                for part in parts {
                    if let Some(condition) = &part.condition {
                        self.walk_expression(condition, frame)?;
                    }
                    self.walk_statements(&part.body, frame)?;
                }
                Ok(())
            }
            StatementKind::While { condition, body } => {
                self.walk_expression(condition, frame)?;
                self.walk_statements(body, frame)
            }
            StatementKind::For {
                initializer,
                condition,
                iterator,
                body,
            } => {
                if let Some(initializer) = initializer {
                    self.walk_statement(initializer, frame)?;
                }
                if let Some(condition) = condition {
                    self.walk_expression(condition, frame)?;
                }
                if let Some(iterator) = iterator {
                    self.walk_statement(iterator, frame)?;
                }
                self.walk_statements(body, frame)
            }
            StatementKind::Break | StatementKind::Continue => Ok(()),
        }
    }

    fn walk_expression(&mut self, expression: &'t Expression, frame: &CallFrame<'_>) -> Result<(), TranslationError> {
        match &expression.kind {
            ExpressionKind::Literal(_) | ExpressionKind::Local(_) | ExpressionKind::This => Ok(()),
            ExpressionKind::Binary { left, right, .. } => {
                self.walk_expression(left, frame)?;
                self.walk_expression(right, frame)
            }
            ExpressionKind::Unary { operand, .. } | ExpressionKind::Cast { operand } => {
                self.walk_expression(operand, frame)
            }
            ExpressionKind::MemberAccess(access) => self.walk_member_access(access, &expression.location, frame),
            ExpressionKind::Call { access, arguments } => {
                for argument in arguments {
                    self.walk_expression(argument, frame)?;
                }
                self.walk_member_access(access, &expression.location, frame)
            }
            ExpressionKind::Construct { constructor, arguments } => {
                for argument in arguments {
                    self.walk_expression(argument, frame)?;
                }
                let call = CallFrame {
                    location: &expression.location,
                    parent: Some(frame),
                };
                if let Some((constructor, class)) = constructor.and_then(|id| self.constructors.get(&id).copied()) {
                    return self.walk_constructor(constructor, class, Some(&call));
                }
                if let TypeSpec::Class(type_id) = &expression.ty {
                    if let Some(class) = self.classes.get(type_id).copied() {
                        return self.walk_pre_constructor(class, Some(&call));
                    }
                }
                Ok(())
            }
        }
    }

    fn walk_member_access(
        &mut self,
        access: &'t MemberAccess,
        location: &'t SourceLocation,
        frame: &CallFrame<'_>,
    ) -> Result<(), TranslationError> {
        if let Some(target) = &access.target {
            self.walk_expression(target, frame)?;
        }
        let call = CallFrame {
            location,
            parent: Some(frame),
        };

        match &access.accessed {
            AccessedMember::Function(id) => self.walk_function_id(*id, &call),
            AccessedMember::GetterSetter { get, set } => self.walk_accessors(*get, *set, access.io, &call),
            AccessedMember::Property(id) => {
                let Some(variable) = self.variables.get(id).copied() else {
                    return Ok(());
                };
                if variable.is_field() {
                    self.walk_variable(variable, &call)
                } else {
                    let get = variable.get.as_ref().map(|f| f.function);
                    let set = variable.set.as_ref().map(|f| f.function);
                    self.walk_accessors(get, set, access.io, &call)
                }
            }
            AccessedMember::Intrinsic { .. } => Ok(()),
        }
    }

    fn walk_accessors(
        &mut self,
        get: Option<FunctionId>,
        set: Option<FunctionId>,
        io: IoMode,
        call: &CallFrame<'_>,
    ) -> Result<(), TranslationError> {
        if matches!(io, IoMode::Read | IoMode::ReadWrite) {
            if let Some(get) = get {
                self.walk_function_id(get, call)?;
            }
        }
        if matches!(io, IoMode::Write | IoMode::ReadWrite) {
            if let Some(set) = set {
                self.walk_function_id(set, call)?;
            }
        }
        Ok(())
    }

    /// Functions defined in other libraries are already known to be acyclic
    fn walk_function_id(&mut self, id: FunctionId, call: &CallFrame<'_>) -> Result<(), TranslationError> {
        match self.functions.get(&id).copied() {
            Some(function) => self.walk_function(function, Some(call)),
            None => Ok(()),
        }
    }
}

/// Runs the detector over `tree`, reporting the first cycle found.
/// Returns true if the tree contains recursion.
pub fn detect_cycles(tree: &SyntaxTree, errors: &mut ErrorReporter) -> bool {
    let mut detector = CycleDetector::new(tree);
    match detector.run(tree) {
        Ok(()) => false,
        Err(err) => {
            errors.report_translation_error(&err);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassNode, Expression, FunctionNode, IdGenerator, MemberVariableNode, Statement};
    use fragc_common::{Literal, RECURSION_SHORT_MESSAGE};
    use pretty_assertions::assert_eq;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("cycles.frag", line, 1)
    }

    fn call(function: FunctionId, name: &str, line: u32) -> Statement {
        Statement::expression(Expression::call(None, name, function, Vec::new(), TypeSpec::Void).at(loc(line)))
    }

    fn run(tree: &SyntaxTree) -> (ErrorReporter, Vec<SymbolKey>) {
        let mut errors = ErrorReporter::new();
        let mut detector = CycleDetector::new(tree);
        if let Err(err) = detector.run(tree) {
            errors.report_translation_error(&err);
        }
        (errors, detector.expansions().to_vec())
    }

    #[test]
    fn test_self_recursion() {
        let mut ids = IdGenerator::new();
        let a = ids.function_id();
        let class = ClassNode {
            functions: vec![FunctionNode::new(a, "A", TypeSpec::Void)
                .at(loc(1))
                .with_statements(vec![call(a, "A", 2)])],
            ..ClassNode::new(ids.type_id(), "Foo")
        };
        let tree = SyntaxTree::new(vec![class]);

        let (errors, _) = run(&tree);
        assert_eq!(errors.error_count(), 1);
        let diagnostic = &errors.diagnostics()[0];
        assert_eq!(diagnostic.short_message, RECURSION_SHORT_MESSAGE);
        assert!(diagnostic.call_stack.len() >= 2);
        assert_eq!(diagnostic.call_stack, vec![loc(1), loc(2), loc(1)]);
        assert_eq!(diagnostic.location, loc(1));
    }

    #[test]
    fn test_mutual_recursion() {
        let mut ids = IdGenerator::new();
        let a = ids.function_id();
        let b = ids.function_id();
        let class = ClassNode {
            functions: vec![
                FunctionNode::new(a, "A", TypeSpec::Void)
                    .at(loc(1))
                    .with_statements(vec![call(b, "B", 2)]),
                FunctionNode::new(b, "B", TypeSpec::Void)
                    .at(loc(5))
                    .with_statements(vec![call(a, "A", 6)]),
            ],
            ..ClassNode::new(ids.type_id(), "Foo")
        };
        let tree = SyntaxTree::new(vec![class]);

        let (errors, _) = run(&tree);
        assert_eq!(errors.error_count(), 1);
        assert_eq!(errors.diagnostics()[0].call_stack, vec![loc(1), loc(2), loc(5), loc(6), loc(1)]);
    }

    #[test]
    fn test_only_first_cycle_is_reported() {
        let mut ids = IdGenerator::new();
        let a = ids.function_id();
        let b = ids.function_id();
        let class = ClassNode {
            functions: vec![
                FunctionNode::new(a, "A", TypeSpec::Void).with_statements(vec![call(a, "A", 2)]),
                FunctionNode::new(b, "B", TypeSpec::Void).with_statements(vec![call(b, "B", 4)]),
            ],
            ..ClassNode::new(ids.type_id(), "Foo")
        };
        let tree = SyntaxTree::new(vec![class]);

        let mut errors = ErrorReporter::with_multiple_errors(true);
        assert!(detect_cycles(&tree, &mut errors));
        assert_eq!(errors.error_count(), 1);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut ids = IdGenerator::new();
        let (a, b, c) = (ids.function_id(), ids.function_id(), ids.function_id());
        let class = ClassNode {
            functions: vec![
                FunctionNode::new(a, "A", TypeSpec::Void).with_statements(vec![call(c, "C", 2)]),
                FunctionNode::new(b, "B", TypeSpec::Void).with_statements(vec![call(c, "C", 4)]),
                FunctionNode::new(c, "C", TypeSpec::Void),
            ],
            ..ClassNode::new(ids.type_id(), "Diamond")
        };
        let tree = SyntaxTree::new(vec![class]);

        let (errors, expansions) = run(&tree);
        assert!(!errors.has_errors());
        let c_visits = expansions.iter().filter(|key| **key == SymbolKey::Function(c)).count();
        assert_eq!(c_visits, 1);
        assert_eq!(
            expansions,
            vec![SymbolKey::Function(a), SymbolKey::Function(c), SymbolKey::Function(b)]
        );
    }

    #[test]
    fn test_recursion_through_constructor_and_initializer() {
        // class Node { var Child: Node = new Node(); }
        let mut ids = IdGenerator::new();
        let node = ids.type_id();
        let pre_constructor = ids.function_id();
        let child = ids.property_id();
        let class = ClassNode {
            pre_constructor: Some(pre_constructor),
            variables: vec![MemberVariableNode::new(child, "Child", TypeSpec::Class(node))
                .at(loc(2))
                .with_initial_value(Expression::construct(TypeSpec::Class(node), None, Vec::new()).at(loc(2)))],
            ..ClassNode::new(node, "Node").at(loc(1))
        };
        let tree = SyntaxTree::new(vec![class]);

        let (errors, _) = run(&tree);
        assert_eq!(errors.error_count(), 1);
        assert!(errors.diagnostics()[0].call_stack.len() >= 2);
    }

    #[test]
    fn test_recursion_through_getter() {
        let mut ids = IdGenerator::new();
        let owner = ids.type_id();
        let property = ids.property_id();
        let getter = ids.function_id();
        let read_self = Expression::property(Expression::this(TypeSpec::Class(owner)), "Value", property, TypeSpec::REAL);
        let mut variable = MemberVariableNode::new(property, "Value", TypeSpec::REAL);
        variable.get = Some(
            FunctionNode::new(getter, "GetValue", TypeSpec::REAL)
                .with_statements(vec![Statement::ret(Some(read_self))]),
        );
        let class = ClassNode {
            variables: vec![variable],
            ..ClassNode::new(owner, "Loop")
        };
        let tree = SyntaxTree::new(vec![class]);

        let (errors, _) = run(&tree);
        assert_eq!(errors.error_count(), 1);
    }

    #[test]
    fn test_initializers_without_calls_are_fine() {
        let mut ids = IdGenerator::new();
        let owner = ids.type_id();
        let class = ClassNode {
            pre_constructor: Some(ids.function_id()),
            variables: vec![
                MemberVariableNode::new(ids.property_id(), "A", TypeSpec::REAL)
                    .with_initial_value(Expression::literal(Literal::Real(1.0))),
                MemberVariableNode::new(ids.property_id(), "B", TypeSpec::INTEGER),
            ],
            ..ClassNode::new(owner, "Plain")
        };
        let tree = SyntaxTree::new(vec![class]);
        let (errors, expansions) = run(&tree);
        assert!(!errors.has_errors());
        assert_eq!(expansions.len(), 3);
    }
}
