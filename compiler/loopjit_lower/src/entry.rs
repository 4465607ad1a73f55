//! Entry-function typing.
//!
//! The captured function has untyped parameters and locals. Once lowered
//! for one argument-type list, every parameter takes the C type of its
//! argument, every local is declared at its first assignment with the type
//! of the assigned value, and the return type is the common type of all
//! valued `return`s (`void` when there are none).

use loopjit_ir::{ArgType, BinaryOp, CType, ElemType, FunctionDef, Literal, MacroDef, Node, Param, Symbol};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::LowerError;

/// Give `func` concrete parameter, local and return types.
pub fn type_entry(
    func: FunctionDef,
    args: &[ArgType],
    lifted: &[MacroDef],
    generated: &[FunctionDef],
) -> Result<FunctionDef, LowerError> {
    if func.params.len() != args.len() {
        return Err(LowerError::ParamCount {
            function: func.name,
            expected: func.params.len(),
            found: args.len(),
        });
    }

    let params: Vec<Param> = func
        .params
        .into_iter()
        .zip(args)
        .map(|(param, arg)| Param::typed(param.name, arg.c_type()))
        .collect();

    let mut typer = Typer {
        function: &func.name,
        locals: params
            .iter()
            .filter_map(|param| Some((param.name.clone(), param.ty?)))
            .collect(),
        source_locals: params.iter().map(|param| param.name.clone()).collect(),
        lifted,
        generated,
        ret: None,
        void_return: false,
    };
    let body = typer.stmts(func.body)?;
    let ret = match (typer.ret, typer.void_return) {
        (None, _) => CType::Void,
        (Some(ty), false) => ty,
        (Some(ty), true) => {
            return Err(LowerError::ReturnMismatch {
                function: func.name,
                first: ty,
                second: CType::Void,
            })
        }
    };

    tracing::debug!(function = %func.name, ret = %ret, "typed entry function");
    Ok(FunctionDef {
        name: func.name,
        params,
        ret: Some(ret),
        body,
    })
}

struct Typer<'a> {
    function: &'a str,
    locals: FxHashMap<String, CType>,
    /// Parameters and locals named in the source, as opposed to declared by
    /// a lowering pass.
    source_locals: FxHashSet<String>,
    lifted: &'a [MacroDef],
    generated: &'a [FunctionDef],
    ret: Option<CType>,
    void_return: bool,
}

impl Typer<'_> {
    fn stmts(&mut self, stmts: Vec<Node>) -> Result<Vec<Node>, LowerError> {
        stmts.into_iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&mut self, stmt: Node) -> Result<Node, LowerError> {
        match stmt {
            Node::Assign { target, value } => {
                let found = self.expr(&value)?;
                let target = self.assign_target(*target, found)?;
                Ok(Node::Assign {
                    target: Box::new(target),
                    value,
                })
            }
            Node::Return(Some(value)) => {
                let found = self.expr(&value)?;
                self.ret = Some(match self.ret {
                    None => found,
                    Some(first) => unify(first, found).ok_or_else(|| LowerError::ReturnMismatch {
                        function: self.function.to_owned(),
                        first,
                        second: found,
                    })?,
                });
                Ok(Node::Return(Some(value)))
            }
            Node::Return(None) => {
                self.void_return = true;
                Ok(Node::Return(None))
            }
            Node::For(mut lp) => {
                self.arithmetic("for", self.expr(&lp.start)?)?;
                self.arithmetic("for", self.expr(&lp.end)?)?;
                self.locals.insert(lp.var.clone(), CType::Index);
                lp.body = self.stmts(lp.body)?;
                Ok(Node::For(lp))
            }
            Node::Block(stmts) => Ok(Node::Block(self.stmts(stmts)?)),
            expr => {
                self.expr(&expr)?;
                Ok(expr)
            }
        }
    }

    fn assign_target(&mut self, target: Node, found: CType) -> Result<Node, LowerError> {
        match target {
            Node::Symbol(Symbol { name, ty: Some(declared) }) => {
                self.check_assign(&name, declared, found)?;
                self.locals.insert(name.clone(), declared);
                Ok(Node::decl(name, declared))
            }
            Node::Symbol(Symbol { name, ty: None }) => match self.locals.get(&name) {
                Some(&declared) => {
                    if self.source_locals.contains(&name) {
                        self.check_local(&name, declared, found)?;
                    } else {
                        self.check_assign(&name, declared, found)?;
                    }
                    Ok(Node::sym(name))
                }
                None => {
                    self.locals.insert(name.clone(), found);
                    self.source_locals.insert(name.clone());
                    Ok(Node::decl(name, found))
                }
            },
            index @ Node::Index { .. } => {
                let slot = self.expr(&index)?;
                self.check_assign("[]", slot, found)?;
                Ok(index)
            }
            other => Err(LowerError::Invariant {
                message: format!("cannot assign to a {} node", other.kind_name()),
            }),
        }
    }

    fn check_assign(&self, name: &str, declared: CType, found: CType) -> Result<(), LowerError> {
        if unify(declared, found).is_some() {
            Ok(())
        } else {
            Err(LowerError::AssignMismatch {
                name: name.to_owned(),
                declared,
                found,
            })
        }
    }

    /// A local keeps the type of its first assignment; later values must be
    /// of the same kind (integer or floating point).
    fn check_local(&self, name: &str, declared: CType, found: CType) -> Result<(), LowerError> {
        self.check_assign(name, declared, found)?;
        if is_float(declared) == is_float(found) {
            Ok(())
        } else {
            Err(LowerError::AssignMismatch {
                name: name.to_owned(),
                declared,
                found,
            })
        }
    }

    fn arithmetic(&self, op: &'static str, ty: CType) -> Result<CType, LowerError> {
        match ty {
            CType::Index | CType::Scalar(_) => Ok(ty),
            CType::Pointer(_) | CType::Void => Err(LowerError::InvalidOperand { op, ty }),
        }
    }

    fn expr(&self, node: &Node) -> Result<CType, LowerError> {
        match node {
            Node::Literal(Literal::Int(_)) => Ok(CType::Scalar(ElemType::I64)),
            Node::Literal(Literal::Float(_)) => Ok(CType::Scalar(ElemType::F64)),
            Node::Symbol(sym) => self
                .locals
                .get(&sym.name)
                .copied()
                .ok_or_else(|| LowerError::UnknownSymbol {
                    name: sym.name.clone(),
                }),
            Node::Index { base, index } => {
                self.arithmetic("[]", self.expr(index)?)?;
                match self.expr(base)? {
                    CType::Pointer(elem) => Ok(CType::Scalar(elem)),
                    ty => Err(LowerError::InvalidOperand { op: "[]", ty }),
                }
            }
            Node::Unary { operand, .. } => self.arithmetic("-", self.expr(operand)?),
            Node::Binary { op, lhs, rhs } => {
                let lhs = self.arithmetic(op.as_symbol(), self.expr(lhs)?)?;
                let rhs = self.arithmetic(op.as_symbol(), self.expr(rhs)?)?;
                let ty = promote(lhs, rhs);
                if *op == BinaryOp::Rem && is_float(ty) {
                    return Err(LowerError::InvalidOperand { op: "%", ty });
                }
                Ok(ty)
            }
            Node::Call { callee, args } => {
                let Some(name) = callee.as_symbol() else {
                    return Err(LowerError::Invariant {
                        message: format!("call through a {} node", callee.kind_name()),
                    });
                };
                let arg_types = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(func) = self.generated.iter().find(|func| func.name == name) {
                    return Ok(func.ret.unwrap_or(CType::Void));
                }
                if self.lifted.iter().any(|unit| unit.name == name) {
                    // A macro expansion has the promoted type of its operands.
                    let mut ty = CType::Index;
                    for arg in arg_types {
                        ty = promote(ty, self.arithmetic("()", arg)?);
                    }
                    return Ok(ty);
                }
                Err(LowerError::UnknownSymbol {
                    name: name.to_owned(),
                })
            }
            other => Err(LowerError::Invariant {
                message: format!("unexpected {} node in expression", other.kind_name()),
            }),
        }
    }
}

/// C usual arithmetic conversion over the supported element types.
fn promote(lhs: CType, rhs: CType) -> CType {
    fn rank(ty: CType) -> u8 {
        match ty.elem() {
            Some(ElemType::I32) => 0,
            Some(ElemType::I64) | None => 1,
            Some(ElemType::F32) => 2,
            Some(ElemType::F64) => 3,
        }
    }
    match (lhs, rhs) {
        (CType::Index, CType::Index) => CType::Index,
        (CType::Index, other) | (other, CType::Index) => {
            if rank(other) >= rank(CType::Index) {
                other
            } else {
                CType::Scalar(ElemType::I64)
            }
        }
        _ if rank(lhs) >= rank(rhs) => lhs,
        _ => rhs,
    }
}

fn is_float(ty: CType) -> bool {
    ty.elem().is_some_and(ElemType::is_float)
}

/// Common type of two values that may be stored in the same slot.
fn unify(first: CType, second: CType) -> Option<CType> {
    match (first, second) {
        _ if first == second => Some(first),
        (CType::Pointer(_), _) | (_, CType::Pointer(_)) | (CType::Void, _) | (_, CType::Void) => {
            None
        }
        _ => Some(promote(first, second)),
    }
}
