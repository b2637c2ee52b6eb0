//! Constant evaluation
//!
//! The injection engine consumes constant evaluation as a service: it hands
//! over a reflection or fragment expression and receives a typed constant.
//! `Interpreter` is the reference evaluator: literals, arithmetic, reads of
//! initialized variables, constexpr calls, object construction and
//! reflections.

use crate::ast::{
    BinaryOp, CtorInit, DeclId, DeclKind, Expr, InitTarget, PrimitiveType, Program, Stmt, Type,
    TypeContext, TypeId,
};
use crate::error::EvalError;
use crate::value::{ConstValue, TypedValue};
use rustc_hash::FxHashMap;

/// Reduces expressions to constants
pub trait ConstEvaluator {
    /// Evaluate `expr` to a typed constant
    fn evaluate(&mut self, program: &Program, expr: &Expr) -> Result<TypedValue, EvalError>;
}

/// Tree-walking constant evaluator
#[derive(Debug)]
pub struct Interpreter {
    max_depth: u32,
    depth: u32,
    /// Parameter and local bindings of the calls in progress
    frames: Vec<FxHashMap<DeclId, ConstValue>>,
}

impl Interpreter {
    /// An evaluator that refuses to nest deeper than `max_depth`
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            depth: 0,
            frames: Vec::new(),
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        if self.depth >= self.max_depth {
            return Err(EvalError::DepthExceeded {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn lookup_binding(&self, decl: DeclId) -> Option<&ConstValue> {
        self.frames.iter().rev().find_map(|f| f.get(&decl))
    }

    fn bind(&mut self, decl: DeclId, value: ConstValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(decl, value);
        }
    }

    fn eval(&mut self, program: &Program, expr: &Expr) -> Result<ConstValue, EvalError> {
        match expr {
            Expr::IntLit(v) => Ok(ConstValue::Int(*v)),
            Expr::BoolLit(b) => Ok(ConstValue::Bool(*b)),
            Expr::StrLit(s) => Ok(ConstValue::Str(s.clone())),
            Expr::DeclRef { decl, .. } => self.eval_decl_ref(program, *decl),
            Expr::ValueRead(inner) => self.eval(program, inner),
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(program, lhs)?;
                let r = self.eval(program, rhs)?;
                eval_binary(*op, &l, &r)
            }
            Expr::Member { base, field, .. } => {
                let object = self.eval(program, base)?;
                let index = program
                    .owner(*field)
                    .and_then(|class| program.fields(class).iter().position(|f| f == field));
                index
                    .and_then(|i| object.field(i).cloned())
                    .ok_or_else(|| EvalError::NotConstant {
                        name: program.name_of(*field).to_string(),
                    })
            }
            Expr::Call { callee, args, .. } => {
                let function = callee.referenced_decl().ok_or_else(|| EvalError::InvalidOperand {
                    op: "call".to_string(),
                })?;
                let args = args
                    .iter()
                    .map(|a| self.eval(program, a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.eval_call(program, function, args)
            }
            Expr::Reflect { decl, .. } => Ok(ConstValue::Reflection(*decl)),
            Expr::Modify { operand, mods, .. } => {
                let base = self.eval(program, operand)?;
                Ok(ConstValue::aggregate(vec![base], vec![mods.to_value()]))
            }
            Expr::Construct { ty, ctor, args, .. } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(program, a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.eval_construct(program, *ty, *ctor, args)
            }
            Expr::Fragment { init, .. } => self.eval(program, init),
            Expr::Constant { value, .. } => Ok(value.clone()),
            Expr::Opaque(_) => Err(EvalError::Opaque),
        }
    }

    fn eval_decl_ref(&mut self, program: &Program, decl: DeclId) -> Result<ConstValue, EvalError> {
        if let Some(value) = self.lookup_binding(decl) {
            return Ok(value.clone());
        }
        let d = program.decl(decl);
        if d.flags.placeholder {
            return Err(EvalError::Opaque);
        }
        let not_constant = || EvalError::NotConstant {
            name: program.name_of(decl).to_string(),
        };
        match &d.kind {
            DeclKind::Var(v) | DeclKind::Param(v) => {
                let init = v.init.as_ref().ok_or_else(not_constant)?;
                self.enter()?;
                let value = self.eval(program, init);
                self.leave();
                value
            }
            _ => Err(not_constant()),
        }
    }

    fn eval_call(
        &mut self,
        program: &Program,
        function: DeclId,
        args: Vec<ConstValue>,
    ) -> Result<ConstValue, EvalError> {
        let f = program
            .decl(function)
            .kind
            .function()
            .ok_or_else(|| EvalError::NotConstant {
                name: program.name_of(function).to_string(),
            })?;
        let body = f.body.as_ref().ok_or_else(|| EvalError::NotConstant {
            name: program.name_of(function).to_string(),
        })?;

        self.enter()?;
        self.frames
            .push(f.params.iter().copied().zip(args).collect());
        let result = self.exec_block(program, body);
        self.frames.pop();
        self.leave();

        Ok(result?.unwrap_or(ConstValue::Void))
    }

    fn exec_block(&mut self, program: &Program, stmts: &[Stmt]) -> Result<Option<ConstValue>, EvalError> {
        for stmt in stmts {
            if let Some(value) = self.exec(program, stmt)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn exec(&mut self, program: &Program, stmt: &Stmt) -> Result<Option<ConstValue>, EvalError> {
        match stmt {
            Stmt::Decl(d) => {
                if let DeclKind::Var(v) = &program.decl(*d).kind {
                    let value = match &v.init {
                        Some(init) => self.eval(program, init)?,
                        None => ConstValue::Void,
                    };
                    self.bind(*d, value);
                }
                Ok(None)
            }
            Stmt::Expr(e) => {
                self.eval(program, e)?;
                Ok(None)
            }
            Stmt::Return(e) => match e {
                Some(e) => self.eval(program, e).map(Some),
                None => Ok(Some(ConstValue::Void)),
            },
            Stmt::Block(stmts) => self.exec_block(program, stmts),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let taken = self.eval(program, cond)?.as_bool().ok_or_else(|| {
                    EvalError::InvalidOperand {
                        op: "if".to_string(),
                    }
                })?;
                if taken {
                    self.exec(program, then_branch)
                } else if let Some(e) = else_branch {
                    self.exec(program, e)
                } else {
                    Ok(None)
                }
            }
            Stmt::Inject(_) => Err(EvalError::NotConstant {
                name: "injection".to_string(),
            }),
        }
    }

    fn eval_construct(
        &mut self,
        program: &Program,
        ty: TypeId,
        ctor: DeclId,
        args: Vec<ConstValue>,
    ) -> Result<ConstValue, EvalError> {
        let class = program.class_of_type(ty).ok_or_else(|| EvalError::InvalidOperand {
            op: "construct".to_string(),
        })?;
        let (params, inits) = match &program.decl(ctor).kind {
            DeclKind::Constructor(m, inits) => (m.func.params.clone(), inits.clone()),
            _ => {
                return Err(EvalError::NotConstant {
                    name: program.name_of(ctor).to_string(),
                })
            }
        };

        self.enter()?;
        self.frames.push(params.into_iter().zip(args).collect());
        let result = self.construct_members(program, class, &inits);
        self.frames.pop();
        self.leave();
        result
    }

    fn construct_members(
        &mut self,
        program: &Program,
        class: DeclId,
        inits: &[CtorInit],
    ) -> Result<ConstValue, EvalError> {
        let bases = program
            .class_data(class)
            .map(|c| c.bases.clone())
            .unwrap_or_default();
        let bases = bases
            .into_iter()
            .map(|b| self.default_value(program, b))
            .collect::<Result<Vec<_>, _>>()?;

        let mut fields = Vec::new();
        for field in program.fields(class) {
            let init = inits.iter().find_map(|i| match &i.target {
                InitTarget::Field(f) if *f == field => Some(i.args.first()),
                _ => None,
            });
            let value = match init {
                Some(Some(arg)) => self.eval(program, arg)?,
                Some(None) => {
                    let ty = program.decl(field).value_type().unwrap_or(TypeContext::VOID);
                    self.default_value(program, ty)?
                }
                None => self.field_default(program, field)?,
            };
            fields.push(value);
        }
        Ok(ConstValue::aggregate(bases, fields))
    }

    fn field_default(&mut self, program: &Program, field: DeclId) -> Result<ConstValue, EvalError> {
        match &program.decl(field).kind {
            DeclKind::Field(f) => match &f.init {
                Some(init) => self.eval(program, init),
                None => self.default_value(program, f.ty),
            },
            _ => Ok(ConstValue::Void),
        }
    }

    /// The value of a default-initialized object of type `ty`
    fn default_value(&mut self, program: &Program, ty: TypeId) -> Result<ConstValue, EvalError> {
        let ty = program.types.canonical(ty);
        match program.types.get(ty) {
            Some(Type::Primitive(p)) => Ok(match p {
                PrimitiveType::Void => ConstValue::Void,
                PrimitiveType::Bool => ConstValue::Bool(false),
                PrimitiveType::Int => ConstValue::Int(0),
                PrimitiveType::Str => ConstValue::Str(String::new()),
            }),
            Some(Type::Record(class)) => {
                let class = *class;
                if let Some(decl) = program.class_data(class).and_then(|c| c.reflectee) {
                    return Ok(ConstValue::Reflection(decl));
                }
                self.enter()?;
                let value = self.construct_members(program, class, &[]);
                self.leave();
                value
            }
            _ => Err(EvalError::Dependent),
        }
    }
}

impl ConstEvaluator for Interpreter {
    fn evaluate(&mut self, program: &Program, expr: &Expr) -> Result<TypedValue, EvalError> {
        if expr.is_dependent(&program.types) {
            return Err(EvalError::Dependent);
        }
        self.depth = 0;
        self.frames.clear();
        let value = self.eval(program, expr)?;
        Ok(TypedValue::new(expr.ty(), value))
    }
}

fn eval_binary(op: BinaryOp, l: &ConstValue, r: &ConstValue) -> Result<ConstValue, EvalError> {
    let invalid = || EvalError::InvalidOperand {
        op: op.as_str().to_string(),
    };
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let (a, b) = (l.as_bool().ok_or_else(invalid)?, r.as_bool().ok_or_else(invalid)?);
            Ok(ConstValue::Bool(if op == BinaryOp::And { a && b } else { a || b }))
        }
        BinaryOp::Eq => Ok(ConstValue::Bool(l == r)),
        BinaryOp::Ne => Ok(ConstValue::Bool(l != r)),
        _ => {
            let (a, b) = (l.as_int().ok_or_else(invalid)?, r.as_int().ok_or_else(invalid)?);
            match op {
                BinaryOp::Add => Ok(ConstValue::Int(a.wrapping_add(b))),
                BinaryOp::Sub => Ok(ConstValue::Int(a.wrapping_sub(b))),
                BinaryOp::Mul => Ok(ConstValue::Int(a.wrapping_mul(b))),
                BinaryOp::Div if b == 0 => Err(EvalError::DivisionByZero),
                BinaryOp::Div => Ok(ConstValue::Int(a / b)),
                BinaryOp::Lt => Ok(ConstValue::Bool(a < b)),
                _ => Err(invalid()),
            }
        }
    }
}
