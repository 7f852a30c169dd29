//! Expression nodes.
//!
//! Expressions are binary trees over operand nodes. They are never evaluated
//! numerically; they exist to be serialized into generated sources, with
//! parenthesization driven by operator precedence.

use serde::{Deserialize, Serialize};

use crate::node::NodeKind;
use crate::world::{NodeId, World};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }

    /// True when the right operand of this operator needs parentheses at
    /// equal precedence (subtraction and division associate left).
    fn rhs_sensitive(self) -> bool {
        matches!(self, BinOp::Sub | BinOp::Div)
    }
}

impl World {
    /// Create an expression node over two operands. Expressions are typed as
    /// integers; width math never has a physical representation of its own.
    pub fn expression(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let ty = self.integer();
        let name = format!("{}{}{}", self.node(lhs).name, op.symbol(), self.node(rhs).name);
        self.new_node(&name, ty, NodeKind::Expression { op, lhs, rhs })
    }

    /// `lhs + rhs`
    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.expression(BinOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.expression(BinOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.expression(BinOp::Mul, lhs, rhs)
    }

    /// `lhs / rhs`
    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.expression(BinOp::Div, lhs, rhs)
    }

    /// Serialize an expression tree with precedence-driven parentheses.
    pub fn expr_to_string(&self, node: NodeId) -> String {
        match self.node(node).kind {
            NodeKind::Expression { op, lhs, rhs } => {
                let l = self.operand_to_string(lhs, op.precedence(), false);
                let r = self.operand_to_string(rhs, op.precedence(), op.rhs_sensitive());
                format!("{l} {} {r}", op.symbol())
            }
            _ => self.node_to_string(node),
        }
    }

    fn operand_to_string(&self, node: NodeId, parent_prec: u8, at_equal: bool) -> String {
        match self.node(node).kind {
            NodeKind::Expression { op, .. } => {
                let text = self.expr_to_string(node);
                let prec = op.precedence();
                if prec < parent_prec || (at_equal && prec == parent_prec) {
                    format!("({text})")
                } else {
                    text
                }
            }
            _ => self.node_to_string(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_parenthesization() {
        let mut w = World::new();
        let a = w.int_parameter("a", 0);
        let b = w.int_parameter("b", 0);
        let c = w.lit_int(2);
        let sum = w.add(a, b);
        let prod = w.mul(sum, c);
        assert_eq!(w.expr_to_string(prod), "(a + b) * 2");

        let prod2 = w.mul(a, b);
        let sum2 = w.add(prod2, c);
        assert_eq!(w.expr_to_string(sum2), "a * b + 2");
    }

    #[test]
    fn subtraction_keeps_rhs_parens() {
        let mut w = World::new();
        let a = w.int_parameter("a", 0);
        let b = w.int_parameter("b", 0);
        let c = w.lit_int(1);
        let inner = w.sub(b, c);
        let outer = w.sub(a, inner);
        assert_eq!(w.expr_to_string(outer), "a - (b - 1)");
    }
}
