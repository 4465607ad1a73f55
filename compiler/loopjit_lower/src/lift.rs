//! Lambda lifting.
//!
//! Every [`Node::Lambda`] becomes a named macro unit ([`MacroDef`],
//! emitted as `#define LAMBDA_<n>(params) (body)`) and is replaced in the
//! tree by a plain symbol naming that unit. Lifting is post-order, so a
//! literal nested inside another is lifted, and named, first.
//!
//! A C macro cannot see the locals of the function it is expanded in under
//! their source meaning, so a lambda body may only reference its own
//! parameters and other lifted units.

use loopjit_ir::{fold_children, fold_nodes, walk_node, Folder, Lambda, MacroDef, Node, Visitor};

use crate::error::LowerError;
use crate::names::NameGen;

/// Lift every lambda in `nodes`, returning the rewritten statements and the
/// lifted units in lifting order.
pub fn lift(nodes: Vec<Node>, names: &mut NameGen) -> Result<(Vec<Node>, Vec<MacroDef>), LowerError> {
    let mut lifter = LambdaLifter::new(names);
    let nodes = fold_nodes(&mut lifter, nodes)?;
    Ok((nodes, lifter.into_units()))
}

/// Folder that replaces lambdas with references to lifted units.
pub struct LambdaLifter<'a> {
    names: &'a mut NameGen,
    units: Vec<MacroDef>,
}

impl<'a> LambdaLifter<'a> {
    pub fn new(names: &'a mut NameGen) -> Self {
        LambdaLifter {
            names,
            units: Vec::new(),
        }
    }

    pub fn units(&self) -> &[MacroDef] {
        &self.units
    }

    pub fn into_units(self) -> Vec<MacroDef> {
        self.units
    }

    fn lift_lambda(&mut self, lambda: Lambda) -> Result<Node, LowerError> {
        let name = self.names.lambda();

        for (i, param) in lambda.params.iter().enumerate() {
            if lambda.params[..i].contains(param) {
                return Err(LowerError::DuplicateParam {
                    lambda: name,
                    name: param.clone(),
                });
            }
        }

        let mut scan = FreeVars {
            lambda: &name,
            params: &lambda.params,
            units: &self.units,
            error: None,
        };
        scan.visit_node(&lambda.body);
        if let Some(err) = scan.error {
            return Err(err);
        }

        tracing::trace!(lambda = %name, params = lambda.params.len(), "lifted lambda");
        self.units.push(MacroDef {
            name: name.clone(),
            params: lambda.params,
            body: lambda.body,
        });
        Ok(Node::sym(name))
    }
}

impl Folder for LambdaLifter<'_> {
    type Error = LowerError;

    fn fold_node(&mut self, node: Node) -> Result<Node, LowerError> {
        match fold_children(self, node)? {
            Node::Lambda(lambda) => self.lift_lambda(lambda),
            other => Ok(other),
        }
    }
}

/// Finds the first symbol in a lambda body that is neither a parameter nor
/// a lifted unit.
struct FreeVars<'a> {
    lambda: &'a str,
    params: &'a [String],
    units: &'a [MacroDef],
    error: Option<LowerError>,
}

impl FreeVars<'_> {
    fn is_unit(&self, name: &str) -> bool {
        self.units.iter().any(|unit| unit.name == name)
    }
}

impl Visitor for FreeVars<'_> {
    fn visit_node(&mut self, node: &Node) {
        if self.error.is_some() {
            return;
        }
        if let Some(callee) = node.callee_name() {
            if !self.is_unit(callee) {
                self.error = Some(LowerError::UnknownCallee {
                    lambda: self.lambda.to_owned(),
                    name: callee.to_owned(),
                });
                return;
            }
            if let Node::Call { args, .. } = node {
                for arg in args {
                    self.visit_node(arg);
                }
            }
            return;
        }
        match node {
            Node::Symbol(sym) => {
                if !self.params.contains(&sym.name) && !self.is_unit(&sym.name) {
                    self.error = Some(LowerError::CapturedVariable {
                        lambda: self.lambda.to_owned(),
                        name: sym.name.clone(),
                    });
                }
            }
            _ => walk_node(self, node),
        }
    }
}
