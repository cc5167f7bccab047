use serde::Serialize;
use strum_macros::{Display, EnumString, VariantNames};

use randotrack_game::{Folded, Requirement};

use crate::evaluate::Evaluator;

/// Color class for one token of a requirement explanation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Display, EnumString, VariantNames)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ItemColor {
    AvailableItem,
    InconsequentialItem,
    PlainText,
    UnavailableItem,
}

/// Color class for a general location's count summary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Display, EnumString, VariantNames)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LocationColor {
    AvailableLocation,
    CheckedLocation,
    NonProgressLocation,
    UnavailableLocation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequirementToken {
    pub color: ItemColor,
    pub text: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

// A truth-annotated mirror of a requirement expression, with each
// compound's children already sorted for display.
#[derive(Clone, Debug)]
struct EvaluatedExpr {
    op: Op,
    items: Vec<EvaluatedNode>,
    value: bool,
}

#[derive(Clone, Debug)]
enum EvaluatedNode {
    Atom { text: String, value: bool },
    Expr(EvaluatedExpr),
}

impl EvaluatedNode {
    fn value(&self) -> bool {
        match self {
            EvaluatedNode::Atom { value, .. } => *value,
            EvaluatedNode::Expr(expr) => expr.value,
        }
    }
}

/// Renders a requirement expression as display-ready token lists: one list
/// per top-level clause of an AND expression, or a single list for an OR.
/// Within each compound, satisfied children sort first when the compound is
/// satisfied and missing children sort first when it is not, so the front of
/// the explanation shows what you have or what's blocking you.
pub fn format_requirements(
    evaluator: &Evaluator,
    requirement: &Requirement,
) -> Vec<Vec<RequirementToken>> {
    let evaluated = evaluated_requirements(evaluator, requirement);
    match evaluated.op {
        Op::And => evaluated
            .items
            .iter()
            .map(|item| {
                let mut tokens = vec![];
                push_readable_node(item, evaluated.value, &mut tokens);
                tokens
            })
            .collect(),
        Op::Or => {
            let mut tokens = vec![];
            push_readable_expr(&evaluated, false, &mut tokens);
            vec![tokens]
        }
    }
}

fn evaluated_requirements(evaluator: &Evaluator, requirement: &Requirement) -> EvaluatedExpr {
    let and_reducer = |acc: EvaluatedExpr, folded: Folded<EvaluatedExpr>| {
        append_child(evaluator, acc, folded, |a, b| a && b)
    };
    let or_reducer = |acc: EvaluatedExpr, folded: Folded<EvaluatedExpr>| {
        append_child(evaluator, acc, folded, |a, b| a || b)
    };
    let evaluated = requirement.reduce(
        EvaluatedExpr {
            op: Op::And,
            items: vec![],
            value: true,
        },
        &and_reducer,
        EvaluatedExpr {
            op: Op::Or,
            items: vec![],
            value: false,
        },
        &or_reducer,
    );
    sort_evaluated(evaluated)
}

fn append_child(
    evaluator: &Evaluator,
    mut acc: EvaluatedExpr,
    folded: Folded<EvaluatedExpr>,
    combine: fn(bool, bool) -> bool,
) -> EvaluatedExpr {
    let node = match folded {
        Folded::Reduced(expr) => EvaluatedNode::Expr(sort_evaluated(expr)),
        Folded::Atom(atom) => EvaluatedNode::Atom {
            text: atom.pretty_name(),
            value: evaluator.is_requirement_met(atom),
        },
    };
    acc.value = combine(acc.value, node.value());
    acc.items.push(node);
    acc
}

// If the expression is true we put the items we have first; if it is false
// we put the items we're missing first. The sort is stable, so ties keep
// their source order.
fn sort_evaluated(mut expr: EvaluatedExpr) -> EvaluatedExpr {
    let expr_value = expr.value;
    expr.items.sort_by_key(|item| {
        if expr_value {
            usize::from(!item.value())
        } else {
            usize::from(item.value())
        }
    });
    expr
}

fn push_readable_node(
    node: &EvaluatedNode,
    inconsequential: bool,
    out: &mut Vec<RequirementToken>,
) {
    match node {
        EvaluatedNode::Atom { text, value } => {
            let color = if *value {
                ItemColor::AvailableItem
            } else if inconsequential {
                ItemColor::InconsequentialItem
            } else {
                ItemColor::UnavailableItem
            };
            out.push(RequirementToken {
                color,
                text: text.clone(),
            });
        }
        EvaluatedNode::Expr(expr) => push_readable_expr(expr, inconsequential, out),
    }
}

fn push_readable_expr(expr: &EvaluatedExpr, inconsequential: bool, out: &mut Vec<RequirementToken>) {
    // A child can't change the outcome once its parent is known-true, or
    // once the parent itself was already inconsequential:
    let child_inconsequential = inconsequential || expr.value;
    for (index, item) in expr.items.iter().enumerate() {
        match item {
            EvaluatedNode::Expr(nested) => {
                out.push(plain_text("("));
                push_readable_expr(nested, child_inconsequential, out);
                out.push(plain_text(")"));
            }
            atom => push_readable_node(atom, child_inconsequential, out),
        }
        if index + 1 < expr.items.len() {
            out.push(plain_text(match expr.op {
                Op::And => "and",
                Op::Or => "or",
            }));
        }
    }
}

fn plain_text(text: &str) -> RequirementToken {
    RequirementToken {
        color: ItemColor::PlainText,
        text: text.to_string(),
    }
}
